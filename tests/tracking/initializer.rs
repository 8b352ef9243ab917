use super::{Encounter, TS};
use approx::assert_abs_diff_eq;
use bearing_tma::od::prelude::*;
use rstest::*;

/// Stationary observer at the origin, intruder moving westward: the initializer recovers the trajectory exactly when
/// the range guess is the true range.
#[rstest]
#[case(2)]
#[case(3)]
#[case(5)]
#[case(8)]
fn stationary_observer_round_trip(#[case] num_bearings: usize) {
    let _ = pretty_env_logger::try_init();

    let p0 = Vector2::new(30.0, 50.0);
    let v = Vector2::new(-20.0, 0.0);
    let ec = Unit::new_normalize(Vector2::new(1.0, 0.0));
    // The intruder crosses the y axis at 1.5 s
    let tau = 1.5;

    let bearings = (0..num_bearings)
        .map(|i| Bearing::exact(p0 + v * (i as f64 * TS)))
        .collect::<Vec<_>>();
    let observers = vec![Vector2::zeros(); num_bearings];

    let range = 30.0 / bearings[0].x;
    assert_abs_diff_eq!(range, p0.norm(), epsilon = 1e-12);

    let hypothesis = TrajectoryInitializer::new(TS)
        .solve(range, &bearings, &ec, tau, &observers)
        .unwrap();

    assert_abs_diff_eq!(hypothesis.position, p0, epsilon = 1e-6);
    assert_abs_diff_eq!(hypothesis.velocity, v, epsilon = 1e-6);
}

/// With an observer at constant velocity, any range guess yields the trajectory scaled about the observer.
#[rstest]
#[case(Encounter::crossing(), 0.5)]
#[case(Encounter::crossing(), 1.0)]
#[case(Encounter::crossing(), 2.0)]
#[case(Encounter::head_on(), 0.25)]
#[case(Encounter::head_on(), 3.0)]
fn constant_velocity_observer_scale(#[case] encounter: Encounter, #[case] scale: f64) {
    let _ = pretty_env_logger::try_init();

    let (bearings, observers) = encounter.history(6);
    let relative = encounter.target - encounter.observer;

    let hypothesis = TrajectoryInitializer::new(TS)
        .solve(
            scale * relative.norm(),
            &bearings,
            &encounter.ec(),
            encounter.tau_at(0.0),
            &observers,
        )
        .unwrap();

    let expected_velocity = encounter.observer_velocity
        + (encounter.target_velocity - encounter.observer_velocity) * scale;
    assert_abs_diff_eq!(
        hypothesis.position,
        encounter.observer + relative * scale,
        epsilon = 1e-6
    );
    assert_abs_diff_eq!(hypothesis.velocity, expected_velocity, epsilon = 1e-6);
}

#[test]
fn single_bearing_is_rejected() {
    let encounter = Encounter::crossing();
    let (bearings, observers) = encounter.history(1);
    let err = TrajectoryInitializer::new(TS)
        .solve(100.0, &bearings, &encounter.ec(), 5.0, &observers)
        .unwrap_err();
    assert!(matches!(
        err,
        TrackingError::InsufficientObservations { count: 1, need: 2, .. }
    ));
}
