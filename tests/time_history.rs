//! Single-node time-history tests, including the worked reconstruction
//! scenarios the engine must reproduce exactly.

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};

use msup_solver::prelude::*;

fn zeros() -> DMatrix<f64> {
    DMatrix::zeros(1, 2)
}

/// One node, two modes, sx-only modal stress: the hand-checkable scenario
fn sx_only_model(steady_sx: Option<f64>) -> ModalModel {
    let coord = DMatrix::from_row_slice(2, 3, &[0.10, 0.11, 0.12, 0.20, 0.21, 0.22]);
    let stress = ModalStressSet {
        sx: DMatrix::from_row_slice(1, 2, &[10.0, 20.0]),
        sy: zeros(),
        sz: zeros(),
        sxy: zeros(),
        syz: zeros(),
        sxz: zeros(),
    };
    let model = ModalModel::new(
        coord,
        vec![0.0, 0.1, 0.2],
        vec![7],
        vec![[1.0, 2.0, 3.0]],
        stress,
    )
    .unwrap();
    match steady_sx {
        Some(offset) => model
            .with_steady_state(SteadyStateSet {
                sx: DVector::from_element(1, offset),
                sy: DVector::zeros(1),
                sz: DVector::zeros(1),
                sxy: DVector::zeros(1),
                syz: DVector::zeros(1),
                sxz: DVector::zeros(1),
            })
            .unwrap(),
        None => model,
    }
}

#[test]
fn reconstructed_series_matches_hand_computation() {
    // sx(t) = 10 * coord[mode1] + 20 * coord[mode2]
    let model = sx_only_model(None);
    let runner = TimeHistoryRunner::new(ResourceConfig::default());
    let series = runner
        .run(&model, 7, MetricKind::MaxPrincipal, 0, None)
        .unwrap();

    assert_eq!(series.times, vec![0.0, 0.1, 0.2]);
    assert_relative_eq!(series.values[0], 5.0, epsilon = 1e-12);
    assert_relative_eq!(series.values[1], 5.3, epsilon = 1e-12);
    assert_relative_eq!(series.values[2], 5.6, epsilon = 1e-12);
}

#[test]
fn steady_offset_shifts_the_whole_series() {
    let without = TimeHistoryRunner::new(ResourceConfig::default())
        .run(&sx_only_model(None), 7, MetricKind::MaxPrincipal, 0, None)
        .unwrap();
    let with = TimeHistoryRunner::new(ResourceConfig::default())
        .run(&sx_only_model(Some(100.0)), 7, MetricKind::MaxPrincipal, 0, None)
        .unwrap();
    for (a, b) in without.values.iter().zip(&with.values) {
        assert_relative_eq!(b - a, 100.0, epsilon = 1e-9);
    }
}

#[test]
fn zero_mode_skip_equals_the_full_unsliced_product() {
    let model = sx_only_model(None);
    let runner = TimeHistoryRunner::new(ResourceConfig::default());
    let series = runner
        .run(&model, 7, MetricKind::MaxPrincipal, 0, None)
        .unwrap();

    // Full, unsliced reconstruction done directly on the input matrices
    let expected = DMatrix::from_row_slice(1, 2, &[10.0, 20.0]) * model.coord();
    for (k, &value) in series.values.iter().enumerate() {
        assert_relative_eq!(value, expected[(0, k)], epsilon = 1e-12);
    }
}

#[test]
fn mode_skip_removes_low_order_content() {
    let model = sx_only_model(None);
    let runner = TimeHistoryRunner::new(ResourceConfig::default());
    let series = runner
        .run(&model, 7, MetricKind::MaxPrincipal, 1, None)
        .unwrap();
    // Only mode 2 remains: 20 * [0.20, 0.21, 0.22]
    assert_relative_eq!(series.values[0], 4.0, epsilon = 1e-12);
    assert_relative_eq!(series.values[2], 4.4, epsilon = 1e-12);
}

#[test]
fn skipping_every_mode_fails() {
    let model = sx_only_model(None);
    let runner = TimeHistoryRunner::new(ResourceConfig::default());
    let err = runner
        .run(&model, 7, MetricKind::VonMises, 2, None)
        .unwrap_err();
    assert!(matches!(
        err,
        SolverError::InvalidModeSkip { skip: 2, num_modes: 2 }
    ));
}

#[test]
fn unknown_node_is_reported() {
    let model = sx_only_model(None);
    let runner = TimeHistoryRunner::new(ResourceConfig::default());
    let err = runner
        .run(&model, 999, MetricKind::VonMises, 0, None)
        .unwrap_err();
    assert!(matches!(err, SolverError::NodeNotFound(999)));
}

#[test]
fn damage_index_has_no_time_history_form() {
    let model = sx_only_model(None);
    let runner = TimeHistoryRunner::new(ResourceConfig::default());
    let err = runner
        .run(
            &model,
            7,
            MetricKind::DamageIndex,
            0,
            Some(&FatigueParameters::new(900.0, -0.106)),
        )
        .unwrap_err();
    assert!(matches!(err, SolverError::InvalidInput(_)));
}

#[test]
fn von_mises_series_of_uniaxial_state_is_the_absolute_stress() {
    // Make the sx series change sign: von Mises must fold it positive
    let coord = DMatrix::from_row_slice(1, 3, &[1.0, -2.0, 0.5]);
    let stress = ModalStressSet {
        sx: DMatrix::from_row_slice(1, 1, &[10.0]),
        sy: DMatrix::zeros(1, 1),
        sz: DMatrix::zeros(1, 1),
        sxy: DMatrix::zeros(1, 1),
        syz: DMatrix::zeros(1, 1),
        sxz: DMatrix::zeros(1, 1),
    };
    let model = ModalModel::new(
        coord,
        vec![0.0, 0.1, 0.2],
        vec![1],
        vec![[0.0; 3]],
        stress,
    )
    .unwrap();
    let series = TimeHistoryRunner::new(ResourceConfig::default())
        .run(&model, 1, MetricKind::VonMises, 0, None)
        .unwrap();
    assert_relative_eq!(series.values[0], 10.0, epsilon = 1e-9);
    assert_relative_eq!(series.values[1], 20.0, epsilon = 1e-9);
    assert_relative_eq!(series.values[2], 5.0, epsilon = 1e-9);

    let (peak_time, peak_value) = series.peak().unwrap();
    assert_eq!(peak_time, 0.1);
    assert_relative_eq!(peak_value, 20.0, epsilon = 1e-9);
}

#[test]
fn motion_series_magnitudes_follow_the_modal_coordinates() {
    let coord = DMatrix::from_row_slice(1, 2, &[0.5, -1.5]);
    let zeros1 = DMatrix::zeros(1, 1);
    let model = ModalModel::new(
        coord,
        vec![0.0, 0.1],
        vec![3],
        vec![[0.0; 3]],
        ModalStressSet {
            sx: zeros1.clone(),
            sy: zeros1.clone(),
            sz: zeros1.clone(),
            sxy: zeros1.clone(),
            syz: zeros1.clone(),
            sxz: zeros1,
        },
    )
    .unwrap()
    .with_velocity(ModalMotionSet {
        ux: DMatrix::from_row_slice(1, 1, &[3.0]),
        uy: DMatrix::from_row_slice(1, 1, &[4.0]),
        uz: DMatrix::from_row_slice(1, 1, &[0.0]),
    })
    .unwrap();

    let series = TimeHistoryRunner::new(ResourceConfig::default())
        .run(&model, 3, MetricKind::Velocity, 0, None)
        .unwrap();
    // |(3, 4, 0)| = 5 scaled by the modal coordinate magnitude
    assert_relative_eq!(series.values[0], 2.5, epsilon = 1e-12);
    assert_relative_eq!(series.values[1], 7.5, epsilon = 1e-12);
}

#[test]
fn single_precision_history_tracks_double() {
    let model = sx_only_model(Some(100.0));
    let double = TimeHistoryRunner::new(ResourceConfig::default())
        .run(&model, 7, MetricKind::VonMises, 0, None)
        .unwrap();
    let single = TimeHistoryRunner::new(
        ResourceConfig::default().with_precision(Precision::Single),
    )
    .run(&model, 7, MetricKind::VonMises, 0, None)
    .unwrap();
    for (d, s) in double.values.iter().zip(&single.values) {
        assert_relative_eq!(*d, *s, max_relative = 1e-6);
    }
}
