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

use super::resampling::{effective_sample_size, systematic_resample};
use crate::linalg::{Matrix2, Unit, Vector2};
use crate::od::blse::{BatchSmoother, SmootherSolution};
use crate::od::initializer::TrajectoryInitializer;
use crate::od::msr::Bearing;
use crate::od::noise::Stochastics;
use crate::od::process::TrackerConfig;
use crate::od::{
    ConfigSnafu, InitializationExhaustedSnafu, InsufficientObservationsSnafu,
    MismatchedHistorySnafu, TrackingError,
};
use crate::utils::mean_and_covariance;
use log::{debug, info, warn};
use rand::Rng;
use rand_pcg::Pcg64Mcg;
use rayon::prelude::*;
use snafu::{ensure, ResultExt};
use std::fmt;

/// A constant velocity trajectory hypothesis of the intruder.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Particle {
    /// Position at the time of the first bearing
    pub initial_position: Vector2<f64>,
    /// Constant velocity
    pub velocity: Vector2<f64>,
    /// Position at the time of the most recent bearing
    pub position: Vector2<f64>,
    /// Importance weight computed at the most recent update
    pub weight: f64,
}

impl Particle {
    /// Linear extrapolation of this particle `dt` seconds after the most recent bearing.
    pub fn position_at(&self, dt: f64) -> Vector2<f64> {
        self.position + self.velocity * dt
    }
}

impl fmt::Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p = [{:.3}, {:.3}] m\tv = [{:.3}, {:.3}] m/s\tw = {:.3e}",
            self.position.x, self.position.y, self.velocity.x, self.velocity.y, self.weight
        )
    }
}

/// Regularized particle filter estimating the trajectory of a single intruder from bearings only.
///
/// Each particle is a constant velocity hypothesis. At every update, the particles are propagated by one step, weighted
/// against the new bearing, and resampled systematically. Resampled particles are not copied: each one is regenerated
/// from a perturbed copy of its source's initial range and bearing through the closed-form initializer, and then
/// re-linearized against the whole bearing history by the batch smoother.
///
/// All the random draws come from the generator owned by the filter, in a fixed order, while the deterministic
/// per-particle work runs in parallel. Hence, two filters seeded identically produce identical particles.
#[derive(Clone, Debug)]
pub struct ParticleFilter<R: Rng = Pcg64Mcg> {
    cfg: TrackerConfig,
    initializer: TrajectoryInitializer,
    smoother: BatchSmoother,
    /// Unit direction of the observer motion
    ec: Unit<Vector2<f64>>,
    observers: Vec<Vector2<f64>>,
    bearings: Vec<Bearing>,
    /// Alignment times, relative to the first bearing
    taus: Vec<f64>,
    particles: Vec<Particle>,
    /// Time of the most recent bearing since the first one, in seconds
    elapsed: f64,
    rng: R,
}

impl<R: Rng> ParticleFilter<R> {
    /// Initializes the filter from the seed bearings of an intruder, by rejection sampling.
    ///
    /// # Arguments
    /// + `cfg`: tracker configuration, validated here
    /// + `bearings`: seed bearings, one per step, the earliest first (at least two)
    /// + `observers`: observer positions when each seed bearing was taken
    /// + `tau`: alignment time, relative to the most recent seed bearing
    /// + `ec`: unit direction of the observer motion
    /// + `rng`: random number generator owned by the filter
    ///
    /// Each draw perturbs every seed bearing and the alignment time, and draws a uniform range along the first bearing
    /// between `r_min` and `r_max`. The resulting hypothesis is accepted only if its speed is at most `v_max` (a speed
    /// of NaN is never accepted).
    ///
    /// # Errors
    /// + `Config` if the configuration is invalid
    /// + `InsufficientObservations` if fewer than two seed bearings are provided
    /// + `MismatchedHistory` if the number of observer positions differs from the number of seed bearings
    /// + `InitializationExhausted` if `max_init_draws` draws did not provide enough particles
    pub fn new(
        cfg: &TrackerConfig,
        bearings: &[Bearing],
        observers: &[Vector2<f64>],
        tau: f64,
        ec: Unit<Vector2<f64>>,
        mut rng: R,
    ) -> Result<Self, TrackingError> {
        cfg.validate().context(ConfigSnafu)?;
        let k = bearings.len();
        ensure!(
            k >= 2,
            InsufficientObservationsSnafu {
                count: k,
                need: 2_usize,
                action: "particle filter initialization"
            }
        );
        ensure!(
            observers.len() == k,
            MismatchedHistorySnafu {
                bearings: k,
                observers: observers.len()
            }
        );

        let initializer = cfg.initializer();
        let elapsed = (k - 1) as f64 * cfg.step_s;
        let tau_abs = tau + elapsed;
        let num_particles = cfg.num_particles;
        let weight = 1.0 / num_particles as f64;

        let mut particles = Vec::with_capacity(num_particles);
        let mut draws = 0;
        while particles.len() < num_particles {
            ensure!(
                draws < cfg.max_init_draws,
                InitializationExhaustedSnafu {
                    draws,
                    accepted: particles.len(),
                    needed: num_particles
                }
            );
            draws += 1;

            let seeds = bearings
                .iter()
                .map(|bearing| bearing.perturbed(&cfg.init_bearing_noise, &mut rng))
                .collect::<Vec<Bearing>>();
            let tau_draw = tau_abs + cfg.init_tau_noise.sample(&mut rng);
            let range = rng.gen_range(cfg.r_min..cfg.r_max);

            // A draw the initializer cannot solve is rejected like a draw that is too fast.
            let hypothesis = match initializer.solve(range, &seeds, &ec, tau_draw, observers) {
                Ok(hypothesis) => hypothesis,
                Err(err) => {
                    debug!("draw #{draws} rejected: {err}");
                    continue;
                }
            };
            if hypothesis.velocity.norm() <= cfg.v_max {
                particles.push(Particle {
                    initial_position: hypothesis.position,
                    velocity: hypothesis.velocity,
                    position: hypothesis.position_at(elapsed),
                    weight,
                });
            }
        }

        info!(
            "initialized {num_particles} particles after {draws} draws ({:.1} % accepted)",
            100.0 * num_particles as f64 / draws as f64
        );

        Ok(Self {
            smoother: cfg.smoother(),
            cfg: cfg.clone(),
            initializer,
            ec,
            observers: observers.to_vec(),
            bearings: bearings.to_vec(),
            taus: vec![tau_abs],
            particles,
            elapsed,
            rng,
        })
    }

    /// Processes a new bearing of the intruder, taken one step after the previous one.
    ///
    /// The particles are propagated by one step and weighted against the bearing with a Gaussian likelihood of the
    /// residual between the bearing and the line of sight from the observer to each particle. The weights are then
    /// normalized, and kept as is after the resampling. Every resampled particle is regenerated (cf. the type
    /// documentation), so the number of particles never changes.
    ///
    /// # Arguments
    /// + `bearing`: the new bearing
    /// + `observer`: the observer position when this bearing was taken
    /// + `tau`: alignment time, relative to this bearing
    pub fn update(
        &mut self,
        bearing: Bearing,
        observer: Vector2<f64>,
        tau: f64,
    ) -> Result<(), TrackingError> {
        let step_s = self.cfg.step_s;
        let precision = 1.0 / self.cfg.likelihood_sigma.powi(2);
        let measured = bearing.into_inner();

        self.observers.push(observer);

        self.particles.par_iter_mut().for_each(|particle| {
            particle.position += particle.velocity * step_s;
            let residual = measured - Bearing::line_of_sight(&particle.position, &observer);
            particle.weight = (-0.5 * precision * residual.norm_squared()).exp();
        });
        self.normalize_weights();

        self.bearings.push(bearing);
        self.elapsed += step_s;
        self.taus.push(tau + self.elapsed);

        debug!(
            "t = {:.3} s: effective sample size {:.1} of {}",
            self.elapsed,
            self.effective_sample_size(),
            self.particles.len()
        );

        self.resample();

        Ok(())
    }

    /// Normalizes the weights to sum to one, falling back to uniform weights if they are all zero or not finite.
    fn normalize_weights(&mut self) {
        let total: f64 = self.particles.iter().map(|p| p.weight).sum();
        if total > 0.0 && total.is_finite() {
            for particle in &mut self.particles {
                particle.weight /= total;
            }
        } else {
            warn!(
                "degenerate particle weights (sum = {total:e}) at t = {:.3} s, using uniform weights",
                self.elapsed
            );
            let uniform = 1.0 / self.particles.len() as f64;
            for particle in &mut self.particles {
                particle.weight = uniform;
            }
        }
    }

    /// Resamples the particles systematically and regenerates every slot from its source.
    ///
    /// A slot whose regeneration fails (or yields a non-finite trajectory) keeps the hypothesis of its source.
    fn resample(&mut self) {
        let num_particles = self.particles.len();
        let offset = self.rng.gen::<f64>() / num_particles as f64;
        let sources = systematic_resample(&self.weights(), offset);

        // The random draws are sequential so that the outcome does not depend on the thread pool.
        let observer_0 = self.observers[0];
        let mut seeds = Vec::with_capacity(num_particles);
        for &src in &sources {
            let relative = self.particles[src].initial_position - observer_0;
            let range = (relative.norm() + self.cfg.resample_range_noise.sample(&mut self.rng))
                .max(self.cfg.r_min);
            let first = Bearing::with_noise(relative, &self.cfg.resample_bearing_noise, &mut self.rng);
            seeds.push((range, first));
        }

        let tau = self.taus.iter().sum::<f64>() / self.taus.len() as f64;
        let elapsed = self.elapsed;
        let initializer = &self.initializer;
        let smoother = &self.smoother;
        let ec = &self.ec;
        let bearings = &self.bearings;
        let observers = &self.observers;

        let outcomes = seeds
            .par_iter()
            .map(|(range, first)| -> Result<SmootherSolution, TrackingError> {
                let mut perturbed = Vec::with_capacity(bearings.len());
                perturbed.push(*first);
                perturbed.extend_from_slice(&bearings[1..]);
                let guess = initializer.solve(*range, &perturbed, ec, tau, observers)?;
                smoother.refine(
                    bearings,
                    guess.position_at(elapsed),
                    guess.velocity,
                    observers,
                )
            })
            .collect::<Vec<_>>();

        let previous = self.particles.clone();
        let mut num_unconverged = 0;
        let mut failures = Vec::new();
        for ((particle, outcome), &src) in self.particles.iter_mut().zip(outcomes).zip(&sources) {
            match outcome {
                Ok(sol) if sol.is_finite() => {
                    if !sol.converged {
                        num_unconverged += 1;
                    }
                    particle.initial_position = sol.initial_position;
                    particle.velocity = sol.velocity;
                    particle.position = sol.position;
                }
                outcome => {
                    failures.push(outcome.err());
                    let source = &previous[src];
                    particle.initial_position = source.initial_position;
                    particle.velocity = source.velocity;
                    particle.position = source.position;
                }
            }
        }

        if num_unconverged > 0 {
            debug!("{num_unconverged} of {num_particles} regenerated particles did not converge");
        }
        if let Some(first) = failures.first() {
            match first {
                Some(err) => warn!(
                    "{} of {num_particles} particles kept their source hypothesis at t = {:.3} s, e.g. {err}",
                    failures.len(),
                    self.elapsed
                ),
                None => warn!(
                    "{} of {num_particles} particles kept their source hypothesis at t = {:.3} s (non-finite trajectory)",
                    failures.len(),
                    self.elapsed
                ),
            }
        }
    }

    /// Current positions of the particles.
    pub fn get_particle_positions(&self) -> Vec<Vector2<f64>> {
        self.particles.iter().map(|p| p.position).collect()
    }

    /// Positions of the particles extrapolated `delta_t` seconds after the most recent bearing, at constant velocity.
    pub fn get_future_positions(&self, delta_t: f64) -> Vec<Vector2<f64>> {
        self.particles.iter().map(|p| p.position_at(delta_t)).collect()
    }

    /// Splits the extrapolated positions of the particles into those the observer could reach within `delta_t` seconds
    /// from `observer_position` at its maximum speed, and the others.
    pub fn partition_reachable(
        &self,
        delta_t: f64,
        observer_position: Vector2<f64>,
    ) -> (Vec<Vector2<f64>>, Vec<Vector2<f64>>) {
        // Offset to avoid a division by zero at the current time
        let horizon = delta_t + 1e-4;
        self.get_future_positions(delta_t)
            .into_iter()
            .partition(|p| (p - observer_position).norm() / horizon <= self.cfg.observer_max_speed)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn weights(&self) -> Vec<f64> {
        self.particles.iter().map(|p| p.weight).collect()
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    /// Mean of the particle positions. Particles are equally likely after the resampling, so this is not weighted.
    pub fn mean_position(&self) -> Vector2<f64> {
        mean_and_covariance(&self.get_particle_positions()).0
    }

    /// Sample covariance of the particle positions.
    pub fn position_covariance(&self) -> Matrix2<f64> {
        mean_and_covariance(&self.get_particle_positions()).1
    }

    /// Effective sample size of the weights of the most recent update.
    pub fn effective_sample_size(&self) -> f64 {
        effective_sample_size(&self.weights())
    }

    /// Time of the most recent bearing since the first one, in seconds.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn bearings(&self) -> &[Bearing] {
        &self.bearings
    }

    pub fn observers(&self) -> &[Vector2<f64>] {
        &self.observers
    }

    /// Alignment times, relative to the first bearing.
    pub fn alignment_times(&self) -> &[f64] {
        &self.taus
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.cfg
    }
}
