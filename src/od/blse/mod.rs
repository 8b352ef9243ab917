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

use crate::io::{ConfigError, InvalidConfigSnafu};
use crate::linalg::{DMatrix, DVector, Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};
use crate::od::msr::Bearing;
use crate::od::{InsufficientObservationsSnafu, MismatchedHistorySnafu, TrackingError};
use crate::utils::pseudo_inverse;
use log::{debug, trace};
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use typed_builder::TypedBuilder;

mod solution;

pub use solution::SmootherSolution;

/// Weights and stopping criteria of the batch smoother.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
#[serde(default)]
pub struct SmootherConf {
    /// Variance of the prior on the most recent state, ordered as [x, y, vx, vy]
    #[builder(default = [1e-3, 1e-3, 1.0, 1.0])]
    pub prior_variance: [f64; 4],
    /// Variance of each backward transition between consecutive states
    #[builder(default = [1e-2; 4])]
    pub process_variance: [f64; 4],
    /// Standard deviation of each component of a bearing
    #[builder(default = 0.05)]
    pub measurement_sigma: f64,
    /// Convergence tolerance on every component of the state correction
    #[builder(default = 1e-2)]
    pub tolerance: f64,
    /// Maximum number of Gauss-Newton iterations
    #[builder(default = 10)]
    pub max_iterations: usize,
}

impl Default for SmootherConf {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SmootherConf {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, variances) in [
            ("prior", &self.prior_variance),
            ("process", &self.process_variance),
        ] {
            ensure!(
                variances.iter().all(|v| v.is_finite() && *v > 0.0),
                InvalidConfigSnafu {
                    reason: format!("{name} variances must be strictly positive: {variances:?}")
                }
            );
        }
        ensure!(
            self.measurement_sigma.is_finite() && self.measurement_sigma > 0.0,
            InvalidConfigSnafu {
                reason: format!(
                    "measurement sigma must be strictly positive: {}",
                    self.measurement_sigma
                )
            }
        );
        ensure!(
            self.tolerance >= 0.0,
            InvalidConfigSnafu {
                reason: format!("tolerance must be positive: {}", self.tolerance)
            }
        );
        ensure!(
            self.max_iterations > 0,
            InvalidConfigSnafu {
                reason: "at least one iteration is required"
            }
        );
        Ok(())
    }
}

/// Information weights (inverse covariances) of each residual block.
struct Weights {
    prior: Matrix4<f64>,
    process: Matrix4<f64>,
    msr: Matrix2<f64>,
}

impl From<&SmootherConf> for Weights {
    fn from(conf: &SmootherConf) -> Self {
        Self {
            prior: Matrix4::from_diagonal(&Vector4::from(conf.prior_variance).map(|v| 1.0 / v)),
            process: Matrix4::from_diagonal(
                &Vector4::from(conf.process_variance).map(|v| 1.0 / v),
            ),
            msr: Matrix2::from_diagonal_element(1.0 / conf.measurement_sigma.powi(2)),
        }
    }
}

/// Batch discrete-time Gauss-Newton smoother of a constant velocity trajectory observed through bearings.
///
/// The state `[x, y, vx, vy]` at the most recent bearing is propagated backward, one step at a time, down to the earliest
/// bearing, and the whole chain of `k` states is solved for at once. The stacked residual has `6k` entries:
/// + a prior tying the most recent state to its guess (4),
/// + the backward transitions between consecutive states (4 per transition),
/// + one bearing per state, through g(p, p_obs) = (p - p_obs) / |p - p_obs| (2 per bearing).
///
/// Each iteration solves the normal equations `(Hᵗ W⁻¹ H) Δx = Hᵗ W⁻¹ e` with a pseudo-inverse and applies the correction
/// additively. The Jacobian is block sparse, so the information matrix is accumulated block by block.
///
/// # Limitations
/// Iterations stop when every component of the correction is within the tolerance or when the iteration cap is hit.
/// Hitting the cap is not an error: the last iterate is returned as a best effort estimate (flagged as not converged).
#[derive(Clone, Debug, PartialEq)]
pub struct BatchSmoother {
    /// Fixed step between two consecutive bearings, in seconds
    pub step_s: f64,
    pub conf: SmootherConf,
}

impl BatchSmoother {
    pub fn new(step_s: f64, conf: SmootherConf) -> Self {
        Self { step_s, conf }
    }

    /// Backward state transition: removes one step of velocity from the position, keeps the velocity.
    pub fn transition(&self) -> Matrix4<f64> {
        let mut phi = Matrix4::identity();
        phi[(0, 2)] = -self.step_s;
        phi[(1, 3)] = -self.step_s;
        phi
    }

    /// Refines the most recent position and velocity of the target against the full bearing history.
    ///
    /// The bearings and the observer positions are ordered from the earliest to the most recent. Only the latest
    /// `bearings.len()` observer positions are used.
    pub fn refine(
        &self,
        bearings: &[Bearing],
        position: Vector2<f64>,
        velocity: Vector2<f64>,
        observers: &[Vector2<f64>],
    ) -> Result<SmootherSolution, TrackingError> {
        let k = bearings.len();
        ensure!(
            k >= 1,
            InsufficientObservationsSnafu {
                count: k,
                need: 1_usize,
                action: "batch smoothing"
            }
        );
        ensure!(
            observers.len() >= k,
            MismatchedHistorySnafu {
                bearings: k,
                observers: observers.len()
            }
        );
        let observers = &observers[observers.len() - k..];

        let weights = Weights::from(&self.conf);
        let phi = self.transition();
        let prior = Vector4::new(position.x, position.y, velocity.x, velocity.y);

        // Chain of states, from the most recent (block 0) to the earliest (block k - 1).
        let mut x = DVector::<f64>::zeros(4 * k);
        let mut state = prior;
        for i in 0..k {
            x.fixed_rows_mut::<4>(4 * i).copy_from(&state);
            state = phi * state;
        }

        let mut num_iterations = 0;
        let mut converged = false;
        let mut max_correction;

        loop {
            let (info, normal) = self.normal_equations(&x, &prior, bearings, observers, &weights);
            let dx = pseudo_inverse(&info)? * normal;
            x += &dx;
            num_iterations += 1;
            max_correction = dx.amax();

            trace!(
                "[{num_iterations}/{}] max correction {max_correction:.3e}",
                self.conf.max_iterations
            );

            if max_correction <= self.conf.tolerance {
                converged = true;
                break;
            } else if num_iterations >= self.conf.max_iterations {
                debug!(
                    "smoother stopped after {num_iterations} iterations without convergence (last correction {max_correction:.3e})"
                );
                break;
            }
        }

        let cost = self.cost(&x, &prior, bearings, observers, &weights);

        Ok(SmootherSolution {
            position: Vector2::new(x[0], x[1]),
            velocity: Vector2::new(x[2], x[3]),
            initial_position: Vector2::new(x[4 * (k - 1)], x[4 * (k - 1) + 1]),
            num_iterations,
            converged,
            max_correction,
            cost,
        })
    }

    /// Weighted sum of squared residuals of the provided chain of states.
    pub fn chain_cost(
        &self,
        bearings: &[Bearing],
        position: Vector2<f64>,
        velocity: Vector2<f64>,
        observers: &[Vector2<f64>],
    ) -> Result<f64, TrackingError> {
        let k = bearings.len();
        ensure!(
            observers.len() >= k,
            MismatchedHistorySnafu {
                bearings: k,
                observers: observers.len()
            }
        );
        let observers = &observers[observers.len() - k..];
        let phi = self.transition();
        let prior = Vector4::new(position.x, position.y, velocity.x, velocity.y);
        let mut x = DVector::<f64>::zeros(4 * k);
        let mut state = prior;
        for i in 0..k {
            x.fixed_rows_mut::<4>(4 * i).copy_from(&state);
            state = phi * state;
        }
        Ok(self.cost(&x, &prior, bearings, observers, &Weights::from(&self.conf)))
    }

    /// Accumulates the information matrix `Hᵗ W⁻¹ H` and the normal vector `Hᵗ W⁻¹ e` at the provided chain.
    fn normal_equations(
        &self,
        x: &DVector<f64>,
        prior: &Vector4<f64>,
        bearings: &[Bearing],
        observers: &[Vector2<f64>],
        weights: &Weights,
    ) -> (DMatrix<f64>, DVector<f64>) {
        let k = bearings.len();
        let phi = self.transition();
        let mut info = DMatrix::<f64>::zeros(4 * k, 4 * k);
        let mut normal = DVector::<f64>::zeros(4 * k);

        // Prior on the most recent state
        add_block(&mut info, 0, 0, &weights.prior);
        add_rows(&mut normal, 0, &(weights.prior * (prior - block(x, 0))));

        // Backward transitions: e_i = Φ x_{i-1} - x_i, hence H_i = [-Φ, I]
        let phi_t_w = phi.transpose() * weights.process;
        for i in 1..k {
            let err = phi * block(x, i - 1) - block(x, i);
            add_block(&mut info, i - 1, i - 1, &(phi_t_w * phi));
            add_block(&mut info, i - 1, i, &(-phi_t_w));
            add_block(&mut info, i, i - 1, &(-(weights.process * phi)));
            add_block(&mut info, i, i, &weights.process);
            add_rows(&mut normal, i - 1, &(-(phi_t_w * err)));
            add_rows(&mut normal, i, &(weights.process * err));
        }

        // Bearings, the most recent first
        for i in 0..k {
            let state = block(x, i);
            let observer = &observers[k - 1 - i];
            let err = bearing_residual(&bearings[k - 1 - i], &state, observer);
            let h = sensitivity(&state, observer);
            let h_t_w = h.transpose() * weights.msr;
            add_block(&mut info, i, i, &(h_t_w * h));
            add_rows(&mut normal, i, &(h_t_w * err));
        }

        (info, normal)
    }

    fn cost(
        &self,
        x: &DVector<f64>,
        prior: &Vector4<f64>,
        bearings: &[Bearing],
        observers: &[Vector2<f64>],
        weights: &Weights,
    ) -> f64 {
        let k = bearings.len();
        let phi = self.transition();

        let prior_err = prior - block(x, 0);
        let mut cost = prior_err.dot(&(weights.prior * prior_err));

        for i in 1..k {
            let err = phi * block(x, i - 1) - block(x, i);
            cost += err.dot(&(weights.process * err));
        }

        for i in 0..k {
            let err = bearing_residual(&bearings[k - 1 - i], &block(x, i), &observers[k - 1 - i]);
            cost += err.dot(&(weights.msr * err));
        }

        cost
    }
}

/// Jacobian of g(p, p_obs) = (p - p_obs) / |p - p_obs| with respect to the state [x, y, vx, vy].
pub fn sensitivity(state: &Vector4<f64>, observer: &Vector2<f64>) -> Matrix2x4<f64> {
    let prx = state[0] - observer.x;
    let pry = state[1] - observer.y;
    let denom = (prx.powi(2) + pry.powi(2)).powf(1.5);
    if denom == 0.0 {
        // No line of sight on the observer
        return Matrix2x4::zeros();
    }
    Matrix2x4::new(
        pry * pry,
        -prx * pry,
        0.0,
        0.0,
        -prx * pry,
        prx * prx,
        0.0,
        0.0,
    ) / denom
}

fn bearing_residual(bearing: &Bearing, state: &Vector4<f64>, observer: &Vector2<f64>) -> Vector2<f64> {
    let position = Vector2::new(state[0], state[1]);
    bearing.into_inner() - Bearing::line_of_sight(&position, observer)
}

fn block(x: &DVector<f64>, i: usize) -> Vector4<f64> {
    x.fixed_rows::<4>(4 * i).into_owned()
}

fn add_block(info: &mut DMatrix<f64>, row: usize, col: usize, blk: &Matrix4<f64>) {
    let mut view = info.fixed_view_mut::<4, 4>(4 * row, 4 * col);
    view += blk;
}

fn add_rows(normal: &mut DVector<f64>, row: usize, rows: &Vector4<f64>) {
    let mut view = normal.fixed_rows_mut::<4>(4 * row);
    view += rows;
}
