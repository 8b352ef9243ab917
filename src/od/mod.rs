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

use crate::io::ConfigError;
use snafu::prelude::Snafu;

/// Provides noise modeling
pub mod noise;

/// Provides the bearing measurement model
pub mod msr;

/// Provides the closed-form first hypothesis of a trajectory from a handful of bearings.
pub mod initializer;

/// Provides the batch Gauss-Newton smoother used to re-linearize particles.
pub mod blse;

/// Provides the particle filter and its resampling scheme.
pub mod filter;

/// Provides the tracker configuration and the multi-intruder tracking process.
pub mod process;

#[allow(unused_imports)]
pub mod prelude {
    pub use super::blse::*;
    pub use super::filter::*;
    pub use super::initializer::*;
    pub use super::msr::*;
    pub use super::noise::{Stochastics, WhiteNoise};
    pub use super::process::*;
    pub use super::TrackingError;

    pub use crate::io::ConfigRepr;
    pub use crate::linalg::{Unit, Vector2};
    pub use crate::Pcg64Mcg;
}

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TrackingError {
    #[snafu(display("at least {need} bearings required for {action}, got {count}"))]
    InsufficientObservations {
        count: usize,
        need: usize,
        action: &'static str,
    },
    #[snafu(display(
        "only {accepted} of {needed} hypotheses accepted after {draws} draws, check the speed and range bounds"
    ))]
    InitializationExhausted {
        draws: usize,
        accepted: usize,
        needed: usize,
    },
    #[snafu(display("{bearings} bearings but only {observers} observer positions"))]
    MismatchedHistory { bearings: usize, observers: usize },
    #[snafu(display("{observations} observations provided for {intruders} tracked intruders"))]
    MismatchedIntruders {
        observations: usize,
        intruders: usize,
    },
    #[snafu(display("singular matrix encountered: {details}"))]
    SingularMatrix { details: String },
    #[snafu(display("tracker configuration rejected: {source}"))]
    Config { source: ConfigError },
}
