use bearing_tma::od::prelude::*;
use rand::Rng;

mod initializer;
mod particle_filter;
mod process;
mod smoother;

pub const TS: f64 = 0.2;

/// Observer and intruder both moving at constant velocity.
#[derive(Copy, Clone, Debug)]
pub struct Encounter {
    pub observer: Vector2<f64>,
    pub observer_velocity: Vector2<f64>,
    pub target: Vector2<f64>,
    pub target_velocity: Vector2<f64>,
}

impl Encounter {
    /// Observer at the origin heading north at 20 m/s, intruder crossing eastward 100 m ahead.
    pub fn crossing() -> Self {
        Self {
            observer: Vector2::zeros(),
            observer_velocity: Vector2::new(0.0, 20.0),
            target: Vector2::new(-30.0, 100.0),
            target_velocity: Vector2::new(20.0, 0.0),
        }
    }

    /// Intruder approaching head-on from the north-east.
    pub fn head_on() -> Self {
        Self {
            observer: Vector2::new(10.0, -5.0),
            observer_velocity: Vector2::new(0.0, 20.0),
            target: Vector2::new(80.0, 150.0),
            target_velocity: Vector2::new(-15.0, -5.0),
        }
    }

    pub fn ec(&self) -> Unit<Vector2<f64>> {
        Unit::new_normalize(self.observer_velocity)
    }

    pub fn observer_at(&self, t: f64) -> Vector2<f64> {
        self.observer + self.observer_velocity * t
    }

    pub fn target_at(&self, t: f64) -> Vector2<f64> {
        self.target + self.target_velocity * t
    }

    /// Alignment time, relative to `t`.
    pub fn tau_at(&self, t: f64) -> f64 {
        time_to_alignment(
            &self.observer_at(t),
            &self.observer_velocity,
            &self.target_at(t),
            &self.target_velocity,
            &self.ec(),
        )
    }

    pub fn observation<R: Rng>(&self, step: usize, noise_std: f64, rng: &mut R) -> BearingObservation {
        let t = step as f64 * TS;
        BearingObservation {
            bearing: Bearing::from_relative(self.target_at(t) - self.observer_at(t), noise_std, rng),
            observer: self.observer_at(t),
            tau: self.tau_at(t),
        }
    }

    /// Exact bearings and observer positions of the first `steps` steps.
    pub fn history(&self, steps: usize) -> (Vec<Bearing>, Vec<Vector2<f64>>) {
        (0..steps)
            .map(|i| {
                let t = i as f64 * TS;
                (
                    Bearing::exact(self.target_at(t) - self.observer_at(t)),
                    self.observer_at(t),
                )
            })
            .unzip()
    }
}
