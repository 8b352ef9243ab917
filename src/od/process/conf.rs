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

use crate::io::{ConfigError, ConfigRepr, InvalidConfigSnafu};
use crate::od::blse::{BatchSmoother, SmootherConf};
use crate::od::initializer::TrajectoryInitializer;
use crate::od::noise::WhiteNoise;
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;
use typed_builder::TypedBuilder;

/// Configuration of a bearing-only tracker. This is immutable once a filter is built from it.
///
/// Every field has a default, so a YAML configuration only needs to list the fields it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
#[serde(default)]
pub struct TrackerConfig {
    /// Number of particles of each filter, constant for the lifetime of the filter
    #[builder(default = 1000)]
    pub num_particles: usize,
    /// Minimum detection range, in meters, strictly positive
    #[builder(default = 10.0)]
    pub r_min: f64,
    /// Maximum detection range, in meters
    #[builder(default = 1000.0)]
    pub r_max: f64,
    /// Maximum speed of an intruder hypothesis at initialization, in meters per second
    #[builder(default = 90.0)]
    pub v_max: f64,
    /// Maximum speed of the observer, used to tell which predicted positions it could reach
    #[builder(default = 23.0)]
    pub observer_max_speed: f64,
    /// Fixed step between two consecutive bearings, in seconds
    #[builder(default = 0.2)]
    pub step_s: f64,
    /// Noise on the seed bearings when drawing the initial hypotheses
    #[builder(default = WhiteNoise::constant_white_noise(1e-3))]
    pub init_bearing_noise: WhiteNoise,
    /// Noise on the alignment time when drawing the initial hypotheses, in seconds
    #[builder(default = WhiteNoise::constant_white_noise(0.5))]
    pub init_tau_noise: WhiteNoise,
    /// Noise on the initial range of a resampled particle, in meters
    #[builder(default = WhiteNoise::constant_white_noise(5.0))]
    pub resample_range_noise: WhiteNoise,
    /// Noise on the initial bearing of a resampled particle
    #[builder(default = WhiteNoise::constant_white_noise(1e-3))]
    pub resample_bearing_noise: WhiteNoise,
    /// Standard deviation of each bearing component in the importance weights
    #[builder(default = 0.05)]
    pub likelihood_sigma: f64,
    /// Maximum number of draws allowed to accept all of the initial hypotheses
    #[builder(default = 1_000_000)]
    pub max_init_draws: usize,
    /// Batch smoother settings
    #[builder(default)]
    pub smoother: SmootherConf,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ConfigRepr for TrackerConfig {}

impl TrackerConfig {
    /// Checks that this configuration can build a filter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            self.num_particles > 0,
            InvalidConfigSnafu {
                reason: "at least one particle is required"
            }
        );
        ensure!(
            self.r_min.is_finite() && self.r_max.is_finite() && 0.0 < self.r_min && self.r_min < self.r_max,
            InvalidConfigSnafu {
                reason: format!(
                    "range bounds must satisfy 0 < r_min < r_max, got [{}, {}]",
                    self.r_min, self.r_max
                )
            }
        );
        ensure!(
            self.v_max > 0.0,
            InvalidConfigSnafu {
                reason: format!("v_max must be strictly positive: {}", self.v_max)
            }
        );
        ensure!(
            self.observer_max_speed >= 0.0,
            InvalidConfigSnafu {
                reason: format!(
                    "observer max speed must be positive: {}",
                    self.observer_max_speed
                )
            }
        );
        ensure!(
            self.step_s.is_finite() && self.step_s > 0.0,
            InvalidConfigSnafu {
                reason: format!("step must be strictly positive: {}", self.step_s)
            }
        );
        for (name, noise) in [
            ("init_bearing_noise", &self.init_bearing_noise),
            ("init_tau_noise", &self.init_tau_noise),
            ("resample_range_noise", &self.resample_range_noise),
            ("resample_bearing_noise", &self.resample_bearing_noise),
        ] {
            ensure!(
                noise.is_valid(),
                InvalidConfigSnafu {
                    reason: format!("{name} is not a valid normal distribution: {noise:?}")
                }
            );
        }
        ensure!(
            self.likelihood_sigma.is_finite() && self.likelihood_sigma > 0.0,
            InvalidConfigSnafu {
                reason: format!(
                    "likelihood sigma must be strictly positive: {}",
                    self.likelihood_sigma
                )
            }
        );
        ensure!(
            self.max_init_draws >= self.num_particles,
            InvalidConfigSnafu {
                reason: format!(
                    "cannot accept {} particles in {} draws",
                    self.num_particles, self.max_init_draws
                )
            }
        );
        self.smoother.validate()
    }

    /// Initializer running at the step of this configuration.
    pub fn initializer(&self) -> TrajectoryInitializer {
        TrajectoryInitializer::new(self.step_s)
    }

    /// Batch smoother running at the step of this configuration.
    pub fn smoother(&self) -> BatchSmoother {
        BatchSmoother::new(self.step_s, self.smoother.clone())
    }
}

impl fmt::Display for TrackerConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} particles, range in [{}, {}] m, speed below {} m/s, step of {} s, smoother tolerance {:.2e} within {} iterations",
            self.num_particles,
            self.r_min,
            self.r_max,
            self.v_max,
            self.step_s,
            self.smoother.tolerance,
            self.smoother.max_iterations
        )
    }
}
