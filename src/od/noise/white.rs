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

use std::ops::Mul;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde_derive::{Deserialize, Serialize};

use super::Stochastics;

/// White noise is an uncorrelated random variable.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WhiteNoise {
    /// Mean value of this white noise
    pub mean: f64,
    /// Process noise as a one-sigma of the Normal distribution.
    pub sigma: f64,
}

impl WhiteNoise {
    /// Zero mean white noise of the provided standard deviation.
    pub fn constant_white_noise(sigma: f64) -> Self {
        Self {
            sigma,
            ..Default::default()
        }
    }

    /// Returns true if this noise is a valid Normal distribution (finite mean, finite and non-negative sigma).
    pub fn is_valid(&self) -> bool {
        self.mean.is_finite() && self.sigma.is_finite() && self.sigma >= 0.0
    }
}

impl Stochastics for WhiteNoise {
    fn covariance(&self) -> f64 {
        self.sigma.powi(2)
    }

    /// Samples this white noise. An invalid distribution (see [WhiteNoise::is_valid]) degenerates to its mean.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match Normal::new(self.mean, self.sigma) {
            Ok(distr) => distr.sample(rng),
            Err(_) => self.mean,
        }
    }
}

impl Mul<f64> for WhiteNoise {
    type Output = Self;

    /// Scale the white noise sigmas by a constant.
    fn mul(mut self, rhs: f64) -> Self::Output {
        self.sigma *= rhs;
        self
    }
}
