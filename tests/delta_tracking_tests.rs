mod support;

use csgtrack::{
    DeltaTracker, Outcome, ParticleState, ParticleType, TaskContext, TrackingError,
    config::TrackingConfig,
    float_types::Real,
    geometry::MaterialId,
    tracking::{CrossSections, OuterBoundary},
};
use nalgebra::{Point3, Vector3};
use std::sync::atomic::{AtomicUsize, Ordering};
use support::{ConstantXs, box_model, init_logging};

fn neutron() -> ParticleState {
    ParticleState::new(Point3::origin(), Vector3::new(1.0, 1.0, 1.0), 1.0, ParticleType::Neutron)
}

/// Kolmogorov-Smirnov distance between `samples` and an exponential
/// distribution with rate `rate`.
fn ks_exponential(mut samples: Vec<Real>, rate: Real) -> Real {
    samples.sort_by(|a, b| a.total_cmp(b));
    let n = samples.len() as Real;
    samples
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let cdf = 1.0 - (-rate * x).exp();
            (cdf - i as Real / n).abs().max((cdf - (i + 1) as Real / n).abs())
        })
        .fold(0.0, Real::max)
}

#[test]
fn collision_fraction_matches_cross_section_ratio() {
    init_logging();
    let geometry = box_model(1.0e6, None);
    let xs = ConstantXs(vec![0.4]);
    let tracker = DeltaTracker::new(&geometry.model, &xs, &OuterBoundary::Black, TrackingConfig::default());
    let mut ctx = TaskContext::new(0, 17);

    let n = 20_000;
    let mut real = 0;
    for _ in 0..n {
        let mut state = neutron();
        let step = tracker.advance(&mut state, 1.0, 0.0, &mut ctx).unwrap();
        assert_eq!(step.cell, Some(geometry.inside));
        assert_eq!(step.material, Some(geometry.material));
        assert_eq!(step.cross_section, 0.4);
        match step.outcome {
            Outcome::Collision => real += 1,
            Outcome::Virtual => {},
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    let fraction = real as Real / n as Real;
    assert!((fraction - 0.4).abs() < 0.02, "collision fraction {fraction}");
    assert_eq!(ctx.counters().accepted(ParticleType::Neutron), real);
    assert_eq!(ctx.counters().rejected(ParticleType::Neutron), n - real);
    assert_eq!(ctx.counters().accepted(ParticleType::Photon), 0);
}

#[test]
fn analog_flight_lengths_are_exponential() {
    let geometry = box_model(1.0e6, None);
    let xs = ConstantXs(vec![0.5]);
    let tracker = DeltaTracker::new(&geometry.model, &xs, &OuterBoundary::Black, TrackingConfig::default());
    let mut ctx = TaskContext::new(0, 3);

    let n = 2000;
    let mut lengths = Vec::with_capacity(n);
    for _ in 0..n {
        let mut state = neutron();
        let step = tracker.advance(&mut state, 0.5, 0.5, &mut ctx).unwrap();
        // majorant equal to the true cross section never rejects
        assert_eq!(step.outcome, Outcome::Collision);
        lengths.push(step.path_length);
    }
    let d = ks_exponential(lengths, 0.5);
    assert!(d < 1.95 / (n as Real).sqrt(), "KS distance {d}");
}

#[test]
fn distance_to_first_real_collision_follows_the_true_cross_section() {
    let geometry = box_model(1.0e6, None);
    let xs = ConstantXs(vec![0.4]);
    let tracker = DeltaTracker::new(&geometry.model, &xs, &OuterBoundary::Black, TrackingConfig::default());
    let mut ctx = TaskContext::new(0, 99);

    let n = 2000;
    let mut distances = Vec::with_capacity(n);
    for _ in 0..n {
        let mut state = neutron();
        let mut travelled = 0.0;
        loop {
            let step = tracker.advance(&mut state, 1.0, 0.0, &mut ctx).unwrap();
            travelled += step.path_length;
            if step.outcome == Outcome::Collision {
                break;
            }
        }
        assert!((state.position.coords.norm() - travelled).abs() < 1e-6 * travelled.max(1.0));
        distances.push(travelled);
    }
    let d = ks_exponential(distances, 0.4);
    assert!(d < 1.95 / (n as Real).sqrt(), "KS distance {d}");
}

#[test]
fn forced_collisions_carry_the_weight_factor() {
    let geometry = box_model(1.0e6, None);
    let xs = ConstantXs(vec![0.1]);
    let config = TrackingConfig { forced_collisions: true, ..TrackingConfig::default() };
    let tracker = DeltaTracker::new(&geometry.model, &xs, &OuterBoundary::Black, config);
    let mut ctx = TaskContext::new(0, 5);

    let n = 20_000;
    let mut weighted = 0.0;
    for _ in 0..n {
        let mut state = neutron();
        let step = tracker.advance(&mut state, 1.0, 0.5, &mut ctx).unwrap();
        match step.outcome {
            Outcome::Collision => {
                approx::assert_relative_eq!(state.weight, 0.2, epsilon = 1e-12);
                weighted += state.weight;
            },
            Outcome::Virtual => assert_eq!(state.weight, 1.0),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    // expected weighted collision rate is still xs / majorant
    let rate = weighted / n as Real;
    assert!((rate - 0.1).abs() < 0.01, "weighted collision rate {rate}");
    let acceptance = ctx.counters().acceptance_ratio(ParticleType::Neutron).unwrap();
    assert!((acceptance - 0.5).abs() < 0.02, "acceptance {acceptance}");
}

#[test]
fn second_tier_thins_collisions_without_forcing() {
    let geometry = box_model(1.0e6, None);
    let xs = ConstantXs(vec![0.1]);
    let tracker = DeltaTracker::new(&geometry.model, &xs, &OuterBoundary::Black, TrackingConfig::default());
    let mut ctx = TaskContext::new(0, 6);

    let n = 20_000;
    let mut real = 0;
    for _ in 0..n {
        let mut state = neutron();
        if tracker.advance(&mut state, 1.0, 0.5, &mut ctx).unwrap().outcome == Outcome::Collision {
            assert_eq!(state.weight, 1.0);
            real += 1;
        }
    }
    let fraction = real as Real / n as Real;
    assert!((fraction - 0.1).abs() < 0.01, "collision fraction {fraction}");
}

#[test]
fn sensitivity_mode_doubles_both_cross_sections() {
    let geometry = box_model(1.0e6, None);
    let xs = ConstantXs(vec![0.4]);
    let config = TrackingConfig { sensitivity: true, ..TrackingConfig::default() };
    let tracker = DeltaTracker::new(&geometry.model, &xs, &OuterBoundary::Black, config);
    let mut ctx = TaskContext::new(0, 8);

    let n = 20_000;
    let mut total_length = 0.0;
    for _ in 0..n {
        let mut state = neutron();
        let step = tracker.advance(&mut state, 1.0, 0.0, &mut ctx).unwrap();
        assert_eq!(step.cross_section, 0.8);
        total_length += step.path_length;
    }
    let mean = total_length / n as Real;
    assert!((mean - 0.5).abs() < 0.02, "mean flight length {mean}");
    let acceptance = ctx.counters().acceptance_ratio(ParticleType::Neutron).unwrap();
    assert!((acceptance - 0.4).abs() < 0.02, "acceptance {acceptance}");
}

#[test]
fn cross_section_above_majorant_is_an_error() {
    let geometry = box_model(1.0e6, None);
    let xs = ConstantXs(vec![2.0]);
    let tracker = DeltaTracker::new(&geometry.model, &xs, &OuterBoundary::Black, TrackingConfig::default());
    let mut ctx = TaskContext::new(0, 1);
    let mut state = neutron();
    let err = tracker.advance(&mut state, 1.0, 0.0, &mut ctx).unwrap_err();
    assert_eq!(err, TrackingError::MajorantViolation { xs: 2.0, majorant: 1.0 });
}

#[test]
fn unusable_majorants_are_rejected() {
    let geometry = box_model(1.0, None);
    let xs = ConstantXs(vec![0.5]);
    let tracker = DeltaTracker::new(&geometry.model, &xs, &OuterBoundary::Black, TrackingConfig::default());
    let mut ctx = TaskContext::new(0, 1);
    for majorant in [0.0, -1.0, Real::INFINITY] {
        let mut state = neutron();
        let err = tracker.advance(&mut state, majorant, 0.0, &mut ctx).unwrap_err();
        assert_eq!(err, TrackingError::InvalidMajorant(majorant));
        assert_eq!(state.position, Point3::origin());
    }
    let mut state = neutron();
    assert!(matches!(
        tracker.advance(&mut state, Real::NAN, 0.0, &mut ctx),
        Err(TrackingError::InvalidMajorant(_))
    ));
}

#[test]
fn non_finite_minimum_cross_sections_are_rejected() {
    let geometry = box_model(1.0e6, None);
    let xs = ConstantXs(vec![0.1]);
    let config = TrackingConfig { forced_collisions: true, ..TrackingConfig::default() };
    let tracker = DeltaTracker::new(&geometry.model, &xs, &OuterBoundary::Black, config);
    let mut ctx = TaskContext::new(0, 1);
    for min_xs in [Real::NAN, Real::INFINITY, Real::NEG_INFINITY] {
        let mut state = neutron();
        let err = tracker.advance(&mut state, 1.0, min_xs, &mut ctx).unwrap_err();
        assert!(matches!(err, TrackingError::InvalidMinimumXs(_)), "{err}");
        assert_eq!(state.position, Point3::origin());
        assert_eq!(state.weight, 1.0);
    }
}

#[test]
fn cells_of_other_ranks_hand_the_particle_over() {
    init_logging();
    let geometry = box_model(100.0, Some(1));
    let xs = ConstantXs(vec![0.5]);
    let rank0 = TrackingConfig { domain_decomposition: true, rank: 0, ..TrackingConfig::default() };
    let rank1 = TrackingConfig { rank: 1, ..rank0 };
    let here = DeltaTracker::new(&geometry.model, &xs, &OuterBoundary::Black, rank0);
    let there = DeltaTracker::new(&geometry.model, &xs, &OuterBoundary::Black, rank1);
    let mut ctx0 = TaskContext::new(0, 21);
    let mut ctx1 = TaskContext::new(1, 21);

    let mut state = neutron();
    let step = here.advance(&mut state, 1.0, 0.0, &mut ctx0).unwrap();
    assert_eq!(step.outcome, Outcome::DomainHandoff);
    assert_eq!(step.cell, Some(geometry.inside));
    assert_eq!(state.rank, 1);
    assert!(state.received_handoff);
    assert_eq!(ctx0.counters().accepted(ParticleType::Neutron), 0);

    // the receiving rank resumes at the handoff point
    let position = state.position;
    let step = there.advance(&mut state, 1.0, 0.0, &mut ctx1).unwrap();
    assert_eq!(step.path_length, 0.0);
    assert_eq!(state.position, position);
    assert!(!state.received_handoff);
    assert!(matches!(step.outcome, Outcome::Collision | Outcome::Virtual));
    assert_eq!(step.material, Some(geometry.material));

    // and moves it on the step after
    let step = there.advance(&mut state, 1.0, 0.0, &mut ctx1).unwrap();
    assert!(step.path_length > 0.0);
}

#[test]
fn ranks_are_ignored_without_domain_decomposition() {
    let geometry = box_model(100.0, Some(3));
    let xs = ConstantXs(vec![0.5]);
    let tracker = DeltaTracker::new(&geometry.model, &xs, &OuterBoundary::Black, TrackingConfig::default());
    let mut ctx = TaskContext::new(0, 2);
    let mut state = neutron();
    let step = tracker.advance(&mut state, 1.0, 0.0, &mut ctx).unwrap();
    assert_ne!(step.outcome, Outcome::DomainHandoff);
    assert_eq!(state.rank, 0);
}

struct CountingXs {
    calls: AtomicUsize,
}

impl CrossSections for CountingXs {
    fn total_macroscopic_xs(&self, _: MaterialId, _: ParticleType, energy: Real, _: usize) -> Real {
        self.calls.fetch_add(1, Ordering::Relaxed);
        0.1 * energy
    }
}

#[test]
fn cross_sections_are_cached_per_energy() {
    let geometry = box_model(1.0e6, None);
    let xs = CountingXs { calls: AtomicUsize::new(0) };
    let tracker = DeltaTracker::new(&geometry.model, &xs, &OuterBoundary::Black, TrackingConfig::default());
    let mut ctx = TaskContext::new(0, 4);

    let mut state = neutron();
    for _ in 0..50 {
        tracker.advance(&mut state, 1.0, 0.0, &mut ctx).unwrap();
    }
    assert_eq!(xs.calls.load(Ordering::Relaxed), 1);

    state.energy = 2.0;
    let step = tracker.advance(&mut state, 1.0, 0.0, &mut ctx).unwrap();
    approx::assert_relative_eq!(step.cross_section, 0.2);
    assert_eq!(xs.calls.load(Ordering::Relaxed), 2);
}

#[test]
fn tasks_with_the_same_seed_reproduce_each_other() {
    let geometry = box_model(1.0e6, None);
    let xs = ConstantXs(vec![0.3]);
    let tracker = DeltaTracker::new(&geometry.model, &xs, &OuterBoundary::Black, TrackingConfig::default());

    let run = |task: usize| {
        let mut ctx = TaskContext::new(task, 42);
        let mut state = neutron();
        (0..100)
            .map(|_| tracker.advance(&mut state, 1.0, 0.0, &mut ctx).unwrap().path_length)
            .collect::<Vec<_>>()
    };
    assert_eq!(run(0), run(0));
    assert_ne!(run(0), run(1));
}
