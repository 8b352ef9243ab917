use super::{Encounter, TS};
use approx::assert_abs_diff_eq;
use bearing_tma::od::prelude::*;
use rstest::*;

/// Builds a filter from the first two steps of the encounter, with the provided bearing noise.
fn seeded_filter(
    encounter: &Encounter,
    cfg: &TrackerConfig,
    noise_std: f64,
    rng: &mut Pcg64Mcg,
    filter_seed: u128,
) -> ParticleFilter {
    let seeds = (0..2)
        .map(|step| encounter.observation(step, noise_std, rng))
        .collect::<Vec<_>>();
    let bearings = seeds.iter().map(|obs| obs.bearing).collect::<Vec<_>>();
    let observers = seeds.iter().map(|obs| obs.observer).collect::<Vec<_>>();

    ParticleFilter::new(
        cfg,
        &bearings,
        &observers,
        seeds[1].tau,
        encounter.ec(),
        Pcg64Mcg::new(filter_seed),
    )
    .unwrap()
}

#[rstest]
#[case(Encounter::crossing(), 0)]
#[case(Encounter::crossing(), 42)]
#[case(Encounter::head_on(), 7)]
fn filter_invariants(#[case] encounter: Encounter, #[case] seed: u128) {
    let _ = pretty_env_logger::try_init();

    let cfg = TrackerConfig::builder().num_particles(100).build();
    let mut rng = Pcg64Mcg::new(seed);
    let mut pf = seeded_filter(&encounter, &cfg, 5e-4, &mut rng, seed + 1);

    for particle in pf.particles() {
        assert!(particle.velocity.norm() <= cfg.v_max);
        let range = (particle.initial_position - encounter.observer).norm();
        assert!(
            (cfg.r_min - 1e-9..=cfg.r_max + 1e-9).contains(&range),
            "initial range {range} out of bounds"
        );
    }

    for step in 2..7 {
        let obs = encounter.observation(step, 5e-4, &mut rng);
        pf.update(obs.bearing, obs.observer, obs.tau).unwrap();

        assert_eq!(pf.num_particles(), 100);
        assert_eq!(pf.get_particle_positions().len(), 100);
        assert_abs_diff_eq!(pf.weights().iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pf.elapsed(), step as f64 * TS, epsilon = 1e-12);
    }

    // Extrapolation is pure and linear
    assert_eq!(pf.get_future_positions(0.0), pf.get_particle_positions());
    let (dt1, dt2) = (0.6, 1.4);
    let first = pf.get_future_positions(dt1);
    let both = pf.get_future_positions(dt1 + dt2);
    for ((p1, p12), particle) in first.iter().zip(&both).zip(pf.particles()) {
        assert_abs_diff_eq!(*p12, p1 + particle.velocity * dt2, epsilon = 1e-9);
    }
    assert_eq!(pf.get_future_positions(0.0), pf.get_particle_positions());

    let (reachable, unreachable) = pf.partition_reachable(2.0, encounter.observer_at(pf.elapsed()));
    assert_eq!(reachable.len() + unreachable.len(), 100);
}

#[test]
fn seeded_filters_are_reproducible() {
    let encounter = Encounter::crossing();
    let cfg = TrackerConfig::builder().num_particles(64).build();

    let run = |filter_seed: u128| {
        let mut rng = Pcg64Mcg::new(11);
        let mut pf = seeded_filter(&encounter, &cfg, 5e-4, &mut rng, filter_seed);
        for step in 2..5 {
            let obs = encounter.observation(step, 5e-4, &mut rng);
            pf.update(obs.bearing, obs.observer, obs.tau).unwrap();
        }
        pf.particles().to_vec()
    };

    assert_eq!(run(3), run(3));
    assert_ne!(run(3), run(4));
}

/// Crossing encounter: 1000 particles seeded from two noisy bearings, then 20 updates.
///
/// The observer keeps a constant velocity, so every trajectory scaled about the observer explains the bearings and the
/// alignment times equally well: the range is not observable. The particles must hence line up along the true line
/// of sight and bracket the true range, but their mean is not expected to converge to the intruder.
#[test]
fn crossing_encounter() {
    let _ = pretty_env_logger::try_init();

    let encounter = Encounter::crossing();
    let cfg = TrackerConfig::default();
    let mut rng = Pcg64Mcg::new(2023);
    let mut pf = seeded_filter(&encounter, &cfg, 5e-4, &mut rng, 2024);

    for step in 2..22 {
        let obs = encounter.observation(step, 5e-4, &mut rng);
        pf.update(obs.bearing, obs.observer, obs.tau).unwrap();
        assert_eq!(pf.num_particles(), 1000);
        assert_abs_diff_eq!(pf.weights().iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    let t = pf.elapsed();
    assert_abs_diff_eq!(t, 21.0 * TS, epsilon = 1e-9);
    let observer = encounter.observer_at(t);
    let truth = encounter.target_at(t) - observer;

    let mean = pf.mean_position() - observer;
    let bearing_error = (mean.y.atan2(mean.x) - truth.y.atan2(truth.x)).abs();
    println!(
        "mean at {:.3} m from the truth, bearing error {:.3e} rad, covariance {}",
        (mean - truth).norm(),
        bearing_error,
        pf.position_covariance()
    );
    assert!(bearing_error < 0.05, "bearing error of {bearing_error} rad");

    let ranges = pf
        .get_particle_positions()
        .iter()
        .map(|p| (p - observer).norm())
        .collect::<Vec<_>>();
    let closest = ranges.iter().cloned().fold(f64::INFINITY, f64::min);
    let farthest = ranges.iter().cloned().fold(0.0, f64::max);
    assert!(
        closest < truth.norm() && truth.norm() < farthest,
        "true range {} not within [{closest}, {farthest}]",
        truth.norm()
    );
}
