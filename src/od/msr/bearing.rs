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
use crate::od::noise::{Stochastics, WhiteNoise};
use rand::Rng;
use std::fmt;
use std::ops::Deref;

/// A bearing (line of sight) measurement: the unit direction from the observer to the target, without any range information.
///
/// # Normalization convention
/// A bearing is built from a relative position by first dividing it by its `y` component, which ties the
/// second component to one, then perturbing the `x` component only, and finally normalizing. The noise is hence
/// injected in an image-plane-like space rather than as an isotropic angle noise. A consequence of this convention is
/// that the bearing always points in the `+y` half plane, so the target is assumed ahead of the observer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bearing(Unit<Vector2<f64>>);

impl Bearing {
    /// Builds a bearing from the provided relative position (target minus observer), corrupting it with zero mean
    /// Gaussian noise of standard deviation `noise_std` after the `y` normalization (cf. the type documentation).
    pub fn from_relative<R: Rng + ?Sized>(
        relative: Vector2<f64>,
        noise_std: f64,
        rng: &mut R,
    ) -> Self {
        Self::with_noise(relative, &WhiteNoise::constant_white_noise(noise_std), rng)
    }

    /// Same as `from_relative` with the provided noise model.
    pub fn with_noise<R: Rng + ?Sized>(
        relative: Vector2<f64>,
        noise: &WhiteNoise,
        rng: &mut R,
    ) -> Self {
        let mut plane = relative / relative.y;
        plane.x += noise.sample(rng);
        Self(Unit::new_normalize(plane))
    }

    /// Builds a noiseless bearing from the provided relative position, following the same normalization convention.
    pub fn exact(relative: Vector2<f64>) -> Self {
        Self(Unit::new_normalize(relative / relative.y))
    }

    /// Returns a perturbed copy of this bearing, following the normalization convention.
    pub fn perturbed<R: Rng + ?Sized>(&self, noise: &WhiteNoise, rng: &mut R) -> Self {
        Self::with_noise(self.into_inner(), noise, rng)
    }

    /// Unit line of sight from the observer to the target, without the `y` normalization: this is the
    /// nonlinear measurement function g(p, p_obs) = (p - p_obs) / |p - p_obs|.
    ///
    /// A target on the observer has no line of sight: this returns the zero vector.
    pub fn line_of_sight(target: &Vector2<f64>, observer: &Vector2<f64>) -> Vector2<f64> {
        let relative = target - observer;
        let range = relative.norm();
        if range > 0.0 {
            relative / range
        } else {
            Vector2::zeros()
        }
    }

    /// Returns the unit vector of this bearing.
    pub fn into_inner(self) -> Vector2<f64> {
        self.0.into_inner()
    }

    /// Angle of this bearing in radians, measured from the +x axis.
    pub fn angle(&self) -> f64 {
        self.0.y.atan2(self.0.x)
    }
}

impl Deref for Bearing {
    type Target = Vector2<f64>;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Display for Bearing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bearing [{:.6}, {:.6}] ({:.3} deg)",
            self.0.x,
            self.0.y,
            self.angle().to_degrees()
        )
    }
}

/// A single sample provided by the driver at one time step for one intruder.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BearingObservation {
    /// Bearing from the observer to the intruder
    pub bearing: Bearing,
    /// Position of the observer when the bearing was taken
    pub observer: Vector2<f64>,
    /// Estimated time to alignment, relative to the time of this observation
    pub tau: f64,
}

/// Time (from now) at which the target and the observer are aligned along the direction perpendicular to `ec`,
/// assuming both keep a constant velocity: `tau = ((p_obs - p_tgt)·ec) / ((v_tgt - v_obs)·ec)`.
///
/// Returns an infinite or NaN value if the relative velocity has no component along `ec`.
pub fn time_to_alignment(
    observer: &Vector2<f64>,
    observer_velocity: &Vector2<f64>,
    target: &Vector2<f64>,
    target_velocity: &Vector2<f64>,
    ec: &Unit<Vector2<f64>>,
) -> f64 {
    let ec = ec.into_inner();
    (observer - target).dot(&ec) / (target_velocity - observer_velocity).dot(&ec)
}
