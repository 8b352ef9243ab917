use super::{Encounter, TS};
use approx::assert_abs_diff_eq;
use bearing_tma::od::prelude::*;
use rstest::*;

#[fixture]
fn smoother() -> BatchSmoother {
    BatchSmoother::new(TS, SmootherConf::default())
}

/// The true trajectory zeroes every residual, so the smoother returns it after a single iteration.
#[rstest]
#[case(Encounter::crossing(), 3)]
#[case(Encounter::crossing(), 12)]
#[case(Encounter::head_on(), 6)]
fn truth_is_a_fixed_point(smoother: BatchSmoother, #[case] encounter: Encounter, #[case] k: usize) {
    let _ = pretty_env_logger::try_init();

    let (bearings, observers) = encounter.history(k);
    let t = (k - 1) as f64 * TS;

    let sol = smoother
        .refine(
            &bearings,
            encounter.target_at(t),
            encounter.target_velocity,
            &observers,
        )
        .unwrap();

    println!("{sol}");
    assert!(sol.converged);
    assert_eq!(sol.num_iterations, 1);
    assert_abs_diff_eq!(sol.position, encounter.target_at(t), epsilon = 1e-3);
    assert_abs_diff_eq!(sol.velocity, encounter.target_velocity, epsilon = 1e-3);
    assert_abs_diff_eq!(sol.initial_position, encounter.target, epsilon = 1e-3);
    assert_abs_diff_eq!(sol.cost, 0.0, epsilon = 1e-9);
}

#[rstest]
#[case(Vector2::new(2.0, -1.0), Vector2::new(1.0, 0.5))]
#[case(Vector2::new(-0.5, 0.5), Vector2::new(-2.0, 0.0))]
fn refinement_reduces_cost(
    smoother: BatchSmoother,
    #[case] position_error: Vector2<f64>,
    #[case] velocity_error: Vector2<f64>,
) {
    let _ = pretty_env_logger::try_init();

    let encounter = Encounter::crossing();
    let k = 8;
    let (bearings, observers) = encounter.history(k);
    let t = (k - 1) as f64 * TS;

    let position = encounter.target_at(t) + position_error;
    let velocity = encounter.target_velocity + velocity_error;
    let initial_cost = smoother
        .chain_cost(&bearings, position, velocity, &observers)
        .unwrap();

    let sol = smoother
        .refine(&bearings, position, velocity, &observers)
        .unwrap();

    assert!(sol.num_iterations <= smoother.conf.max_iterations);
    assert!(
        sol.cost < initial_cost,
        "cost went from {initial_cost:.6e} to {:.6e}",
        sol.cost
    );
}

#[rstest]
fn iteration_cap_is_not_an_error() {
    let encounter = Encounter::crossing();
    let (bearings, observers) = encounter.history(6);
    let t = 5.0 * TS;
    // A single iteration with a zero tolerance cannot be flagged as converged from a wrong guess.
    let capped = BatchSmoother::new(
        TS,
        SmootherConf::builder()
            .tolerance(0.0)
            .max_iterations(1)
            .build(),
    );
    let sol = capped
        .refine(
            &bearings,
            encounter.target_at(t) + Vector2::new(3.0, 3.0),
            encounter.target_velocity,
            &observers,
        )
        .unwrap();
    assert!(!sol.converged);
    assert_eq!(sol.num_iterations, 1);
    assert!(sol.max_correction > 0.0);
}

#[rstest]
fn only_the_latest_observers_are_used(smoother: BatchSmoother) {
    let encounter = Encounter::crossing();
    let (bearings, observers) = encounter.history(6);
    let t = 5.0 * TS;

    // Older observer positions than the oldest bearing are ignored.
    let mut longer = vec![Vector2::new(1e3, -1e3); 3];
    longer.extend_from_slice(&observers);

    let sol = smoother
        .refine(
            &bearings,
            encounter.target_at(t),
            encounter.target_velocity,
            &longer,
        )
        .unwrap();
    assert!(sol.converged);
    assert_abs_diff_eq!(sol.initial_position, encounter.target, epsilon = 1e-3);
}
