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

use crate::linalg::{DMatrix, DVector, Matrix2, Unit, Vector2};
use crate::od::msr::Bearing;
use crate::od::{InsufficientObservationsSnafu, MismatchedHistorySnafu, TrackingError};
use crate::utils::{perpendicular, pseudo_inverse};
use log::trace;
use snafu::ensure;
use std::fmt;

/// A constant velocity trajectory hypothesis: the target position at the first observation and its velocity.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Hypothesis {
    /// Position at the time of the first bearing
    pub position: Vector2<f64>,
    /// Constant velocity
    pub velocity: Vector2<f64>,
}

impl Hypothesis {
    /// Position of this hypothesis `dt` seconds after the first bearing.
    pub fn position_at(&self, dt: f64) -> Vector2<f64> {
        self.position + self.velocity * dt
    }
}

impl fmt::Display for Hypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p0 = [{:.3}, {:.3}] m\tv = [{:.3}, {:.3}] m/s",
            self.position.x, self.position.y, self.velocity.x, self.velocity.y
        )
    }
}

/// Closed-form first hypothesis of a trajectory from a guessed range along the first bearing.
///
/// For a guessed range `a1` along the first bearing `l1`, the target starts at `p0 = p_obs,0 + a1 l1`. Each subsequent
/// bearing `l_i` taken at `t_i = i ts` must then satisfy `a_i l_i - v t_i = p0 - p_obs,i` for some unknown range `a_i`,
/// and at the alignment time `tau` the target lies along the direction perpendicular to the observer motion `ec`:
/// `a_tau ec⟂ - v tau = p0 - p_obs(tau)`.
///
/// The unknowns `[a_2 .. a_k, a_tau, v]` are solved in the minimum norm least squares sense with a pseudo-inverse,
/// since the system is under or over determined depending on the number of bearings.
///
/// # Observer at the alignment time
/// The observer position at `tau` is extrapolated from the observer history assuming a constant velocity between the
/// first and the latest observer positions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TrajectoryInitializer {
    /// Fixed step between two consecutive bearings, in seconds
    pub step_s: f64,
}

impl TrajectoryInitializer {
    pub fn new(step_s: f64) -> Self {
        Self { step_s }
    }

    /// Solves for the initial position and the velocity of the target.
    ///
    /// # Arguments
    /// + `range_guess`: range from the first observer position to the target, along the first bearing
    /// + `bearings`: ordered bearings, one per step starting at the first observation (at least two)
    /// + `ec`: unit direction of the observer motion
    /// + `tau`: alignment time, relative to the first observation
    /// + `observers`: observer positions at each bearing
    ///
    /// # Errors
    /// + `InsufficientObservations` if fewer than two bearings are provided
    /// + `MismatchedHistory` if there are fewer observer positions than bearings
    pub fn solve(
        &self,
        range_guess: f64,
        bearings: &[Bearing],
        ec: &Unit<Vector2<f64>>,
        tau: f64,
        observers: &[Vector2<f64>],
    ) -> Result<Hypothesis, TrackingError> {
        let k = bearings.len();
        ensure!(
            k >= 2,
            InsufficientObservationsSnafu {
                count: k,
                need: 2_usize,
                action: "a first trajectory hypothesis"
            }
        );
        ensure!(
            observers.len() >= k,
            MismatchedHistorySnafu {
                bearings: k,
                observers: observers.len()
            }
        );

        let n = k - 1;
        let observer_0 = observers[0];
        let anchor = bearings[0].into_inner() * range_guess;
        let ecp = perpendicular(&ec.into_inner());
        let observer_velocity = (observers[n] - observer_0) / (n as f64 * self.step_s);

        // Columns: one range per subsequent bearing, the range at alignment, then the two velocity components.
        let mut a_mat = DMatrix::<f64>::zeros(2 * n + 2, n + 3);
        let mut b_vec = DVector::<f64>::zeros(2 * n + 2);

        for (i, (bearing, observer)) in bearings[1..].iter().zip(&observers[1..k]).enumerate() {
            let dt = (i + 1) as f64 * self.step_s;
            a_mat
                .fixed_view_mut::<2, 1>(2 * i, i)
                .copy_from(&bearing.into_inner());
            a_mat
                .fixed_view_mut::<2, 2>(2 * i, n + 1)
                .copy_from(&(-Matrix2::identity() * dt));
            b_vec
                .fixed_rows_mut::<2>(2 * i)
                .copy_from(&(observer_0 - observer + anchor));
        }

        a_mat.fixed_view_mut::<2, 1>(2 * n, n).copy_from(&ecp);
        a_mat
            .fixed_view_mut::<2, 2>(2 * n, n + 1)
            .copy_from(&(-Matrix2::identity() * tau));
        b_vec
            .fixed_rows_mut::<2>(2 * n)
            .copy_from(&(anchor - observer_velocity * tau));

        let x = pseudo_inverse(&a_mat)? * b_vec;

        let hypothesis = Hypothesis {
            position: observer_0 + anchor,
            velocity: Vector2::new(x[n + 1], x[n + 2]),
        };

        trace!("range guess {range_guess:.3} m with {k} bearings and tau = {tau:.3} s: {hypothesis}");

        Ok(hypothesis)
    }
}
