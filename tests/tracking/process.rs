use super::{Encounter, TS};
use crate::data_path;
use approx::assert_abs_diff_eq;
use bearing_tma::io::ConfigError;
use bearing_tma::od::prelude::*;

#[test]
fn load_tracker_config() {
    let cfg = TrackerConfig::load(data_path("tracker.yaml")).unwrap();
    println!("{cfg}");
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.num_particles, 500);
    assert_eq!(cfg.step_s, TS);
    assert_eq!(cfg.smoother, SmootherConf::default());
    assert_eq!(
        cfg,
        TrackerConfig::builder().num_particles(500).build(),
        "only the particle count differs from the defaults"
    );

    let err = TrackerConfig::load(data_path("does_not_exist.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::ReadConfig { .. }));

    let err = TrackerConfig::loads("num_particles: many").unwrap_err();
    assert!(matches!(err, ConfigError::ParseConfig { .. }));
}

#[test]
fn track_two_intruders() {
    let _ = pretty_env_logger::try_init();

    let mut cfg = TrackerConfig::load(data_path("tracker.yaml")).unwrap();
    cfg.num_particles = 80;

    let encounters = [Encounter::crossing(), Encounter::head_on()];
    let mut rng = Pcg64Mcg::new(1);
    let mut process = TrackingProcess::new(cfg);

    for (i, encounter) in encounters.iter().enumerate() {
        let seeds = (0..2)
            .map(|step| encounter.observation(step, 5e-4, &mut rng))
            .collect::<Vec<_>>();
        let bearings = seeds.iter().map(|obs| obs.bearing).collect::<Vec<_>>();
        let observers = seeds.iter().map(|obs| obs.observer).collect::<Vec<_>>();
        let idx = process
            .add_intruder(
                &bearings,
                &observers,
                seeds[1].tau,
                encounter.ec(),
                Pcg64Mcg::new(100 + i as u128),
            )
            .unwrap();
        assert_eq!(idx, i);
    }
    assert_eq!(process.len(), 2);

    for step in 2..6 {
        let observations = encounters
            .iter()
            .map(|encounter| encounter.observation(step, 5e-4, &mut rng))
            .collect::<Vec<_>>();
        process.update(&observations).unwrap();
    }

    for filter in process.filters() {
        assert_eq!(filter.num_particles(), 80);
        assert_eq!(filter.bearings().len(), 6);
        assert_abs_diff_eq!(filter.elapsed(), 5.0 * TS, epsilon = 1e-12);
    }
    assert_eq!(process.mean_positions().len(), 2);
    let futures = process.get_future_positions(1.0);
    assert_eq!(futures.len(), 2);
    assert!(futures.iter().all(|positions| positions.len() == 80));

    // One observation for two intruders
    let lone = encounters[0].observation(6, 0.0, &mut rng);
    assert_eq!(
        process.update(&[lone]),
        Err(TrackingError::MismatchedIntruders {
            observations: 1,
            intruders: 2
        })
    );
    // The failed step did not touch the filters
    assert_eq!(process.filter(0).unwrap().bearings().len(), 6);
}
