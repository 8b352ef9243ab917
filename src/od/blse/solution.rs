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

use crate::linalg::Vector2;
use std::fmt;

/// Result of a batch smoothing of a constant velocity trajectory.
///
/// If `converged` is false, the iteration cap was reached and this is the last iterate: a best effort estimate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SmootherSolution {
    /// Position at the most recent bearing
    pub position: Vector2<f64>,
    /// Velocity at the most recent bearing
    pub velocity: Vector2<f64>,
    /// Position at the earliest bearing, at the end of the reconstructed chain
    pub initial_position: Vector2<f64>,
    pub num_iterations: usize,
    pub converged: bool,
    /// Largest absolute component of the last correction
    pub max_correction: f64,
    /// Weighted sum of squared residuals (prior, process and measurement) at the returned iterate
    pub cost: f64,
}

impl SmootherSolution {
    /// Returns true if the returned trajectory is made of finite values only.
    pub fn is_finite(&self) -> bool {
        self.position
            .iter()
            .chain(self.velocity.iter())
            .chain(self.initial_position.iter())
            .all(|x| x.is_finite())
    }
}

impl fmt::Display for SmootherSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Converged: {}", self.converged)?;
        writeln!(f, "Iterations: {}", self.num_iterations)?;
        writeln!(f, "Last correction: {:.3e}", self.max_correction)?;
        writeln!(f, "Cost: {:.6e}", self.cost)?;
        writeln!(
            f,
            "Position: [{:.3}, {:.3}] m\tVelocity: [{:.3}, {:.3}] m/s",
            self.position.x, self.position.y, self.velocity.x, self.velocity.y
        )?;
        write!(
            f,
            "Initial position: [{:.3}, {:.3}] m",
            self.initial_position.x, self.initial_position.y
        )
    }
}
