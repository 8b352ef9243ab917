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

/// Systematic (low-variance) resampling: returns, for each output slot, the index of the source particle.
///
/// The `offset` is a single uniform draw in `[0, 1/N)`. Slot `m` uses the threshold `offset + (m - 1) / N`
/// (and not the textbook `offset + m / N`): the first slot always selects the first particle with a non-zero
/// cumulative weight, and the whole comb is shifted by one slot. The cumulative weight pointer never walks past the
/// last particle, which guards against weights summing to slightly less than one.
///
/// The weights are expected to be normalized.
pub fn systematic_resample(weights: &[f64], offset: f64) -> Vec<usize> {
    let n = weights.len();
    let mut indices = Vec::with_capacity(n);
    if n == 0 {
        return indices;
    }

    let mut i = 0;
    let mut cumulative = weights[0];
    for m in 0..n {
        let threshold = offset + (m as f64 - 1.0) / n as f64;
        while threshold > cumulative && i + 1 < n {
            i += 1;
            cumulative += weights[i];
        }
        indices.push(i);
    }
    indices
}

/// Effective sample size of normalized weights, `1 / Σ w²`.
pub fn effective_sample_size(weights: &[f64]) -> f64 {
    1.0 / weights.iter().map(|w| w * w).sum::<f64>()
}
