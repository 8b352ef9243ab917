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

/*! # bearing-tma

Bearing-only target motion analysis: estimates the position and velocity of intruders observed only
through noisy line-of-sight measurements from a moving observer.

The estimation engine is made of three pieces:
+ a closed-form [first hypothesis initializer](od::initializer::TrajectoryInitializer), solving a min-norm linear system for an initial position and velocity;
+ a [particle filter](od::filter::ParticleFilter) with importance weighting and low-variance resampling;
+ a [batch Gauss-Newton smoother](od::blse::BatchSmoother) which re-linearizes every regenerated particle against the full measurement history.
*/

/// Utility functions shared by different modules, and which may be useful to engineers.
pub mod utils;

/// Configuration loading.
pub mod io;

/// All of the bearing-only estimation tools: measurement model, initializer, smoother and particle filter.
pub mod od;

#[macro_use]
extern crate log;
extern crate nalgebra as na;

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

/// Re-export of the random number generator used throughout, seeded for repeatability.
pub use rand_pcg::Pcg64Mcg;

pub use self::od::TrackingError;
