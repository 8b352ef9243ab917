/*
    Bearing TMA, bearing-only target motion analysis
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::linalg::{Unit, Vector2};
use crate::od::filter::ParticleFilter;
use crate::od::msr::{Bearing, BearingObservation};
use crate::od::{MismatchedIntrudersSnafu, TrackingError};
use log::info;
use rand::Rng;
use rand_pcg::Pcg64Mcg;
use rayon::prelude::*;
use snafu::ensure;

mod conf;
pub use conf::TrackerConfig;

/// Tracks several intruders at once, with one independent particle filter per intruder.
///
/// The association of the bearings to the intruders is done upstream: the i-th observation of each step belongs to the
/// i-th tracked intruder. The filters share no state, so they are updated in parallel.
#[derive(Clone, Debug)]
pub struct TrackingProcess<R: Rng + Send = Pcg64Mcg> {
    pub cfg: TrackerConfig,
    filters: Vec<ParticleFilter<R>>,
}

impl<R: Rng + Send> TrackingProcess<R> {
    /// Initializes a tracking process without any intruder.
    pub fn new(cfg: TrackerConfig) -> Self {
        Self {
            cfg,
            filters: Vec::new(),
        }
    }

    /// Starts tracking a new intruder from its seed bearings, and returns its index.
    ///
    /// Refer to `ParticleFilter::new` for the arguments and the errors.
    pub fn add_intruder(
        &mut self,
        bearings: &[Bearing],
        observers: &[Vector2<f64>],
        tau: f64,
        ec: Unit<Vector2<f64>>,
        rng: R,
    ) -> Result<usize, TrackingError> {
        let filter = ParticleFilter::new(&self.cfg, bearings, observers, tau, ec, rng)?;
        self.filters.push(filter);
        info!("tracking intruder #{}", self.filters.len());
        Ok(self.filters.len() - 1)
    }

    /// Processes one step of observations, exactly one per tracked intruder and in the same order.
    pub fn update(&mut self, observations: &[BearingObservation]) -> Result<(), TrackingError> {
        ensure!(
            observations.len() == self.filters.len(),
            MismatchedIntrudersSnafu {
                observations: observations.len(),
                intruders: self.filters.len()
            }
        );

        self.filters
            .par_iter_mut()
            .zip(observations.par_iter())
            .map(|(filter, obs)| filter.update(obs.bearing, obs.observer, obs.tau))
            .collect::<Result<Vec<()>, _>>()?;

        Ok(())
    }

    /// Particle positions of every intruder, extrapolated `delta_t` seconds after the most recent step.
    pub fn get_future_positions(&self, delta_t: f64) -> Vec<Vec<Vector2<f64>>> {
        self.filters
            .iter()
            .map(|filter| filter.get_future_positions(delta_t))
            .collect()
    }

    /// Mean particle position of every intruder.
    pub fn mean_positions(&self) -> Vec<Vector2<f64>> {
        self.filters.iter().map(|filter| filter.mean_position()).collect()
    }

    pub fn filters(&self) -> &[ParticleFilter<R>] {
        &self.filters
    }

    pub fn filter(&self, intruder: usize) -> Option<&ParticleFilter<R>> {
        self.filters.get(intruder)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
