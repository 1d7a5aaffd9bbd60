//! MSUP Solver Example - Synthetic Two-Mode Plate
//!
//! Builds a small synthetic modal data set, runs a batch extrema pass over
//! every node and a time-history pass for the governing node, and prints
//! the resulting tables.

use anyhow::Result;
use nalgebra::{DMatrix, DVector};

use msup_solver::prelude::*;

struct PrintProgress;

impl ProgressObserver for PrintProgress {
    fn on_progress(&self, fraction: f64) {
        println!("  progress: {:.0}%", fraction * 100.0);
    }
}

/// Synthesize a plate-like modal data set: two modes, a decaying sine for
/// each modal coordinate, and node rows whose modal stress scales with
/// distance from the plate center.
fn build_model(num_nodes: usize, num_times: usize) -> Result<ModalModel> {
    let dt = 0.002;
    let times: Vec<f64> = (0..num_times).map(|k| k as f64 * dt).collect();

    let coord = DMatrix::from_fn(2, num_times, |mode, k| {
        let t = times[k];
        let (freq, decay) = if mode == 0 { (35.0, 2.0) } else { (110.0, 6.0) };
        (-decay * t).exp() * (2.0 * std::f64::consts::PI * freq * t).sin()
    });

    let node_ids: Vec<u64> = (0..num_nodes as u64).map(|i| 1000 + i).collect();
    let node_coords: Vec<[f64; 3]> = (0..num_nodes)
        .map(|i| {
            let x = (i % 10) as f64 * 0.05;
            let y = (i / 10) as f64 * 0.05;
            [x, y, 0.0]
        })
        .collect();

    let shape = |scale: f64| {
        DMatrix::from_fn(num_nodes, 2, |i, mode| {
            let [x, y, _] = node_coords[i];
            let r = ((x - 0.25).powi(2) + (y - 0.25).powi(2)).sqrt();
            let weight = if mode == 0 { 1.0 - r } else { 0.4 * r };
            scale * weight
        })
    };

    let stress = ModalStressSet {
        sx: shape(180.0e6),
        sy: shape(120.0e6),
        sz: shape(40.0e6),
        sxy: shape(25.0e6),
        syz: shape(10.0e6),
        sxz: shape(8.0e6),
    };
    let deformation = ModalMotionSet {
        ux: shape(1.5e-3),
        uy: shape(0.8e-3),
        uz: shape(2.2e-3),
    };
    let steady = SteadyStateSet {
        sx: DVector::from_element(num_nodes, 20.0e6),
        sy: DVector::from_element(num_nodes, 5.0e6),
        sz: DVector::zeros(num_nodes),
        sxy: DVector::zeros(num_nodes),
        syz: DVector::zeros(num_nodes),
        sxz: DVector::zeros(num_nodes),
    };

    let model = ModalModel::new(coord, times, node_ids, node_coords, stress)?
        .with_deformation(deformation)?
        .with_steady_state(steady)?;
    Ok(model)
}

fn main() -> Result<()> {
    env_logger::init();

    println!("=== MSUP Solver Example: Synthetic Two-Mode Plate ===\n");

    let model = build_model(100, 500)?;
    println!(
        "Loaded model: {} nodes, {} modes, {} time samples\n",
        model.num_nodes(),
        model.num_modes(),
        model.num_time_samples()
    );

    // Batch pass: peak stresses and deformation plus a damage estimate
    let options = BatchOptions::new(vec![
        MetricKind::VonMises,
        MetricKind::MaxPrincipal,
        MetricKind::MinPrincipal,
        MetricKind::Deformation,
        MetricKind::DamageIndex,
    ])
    .with_fatigue(FatigueParameters::new(900.0e6, -0.106));

    let mut runner = BatchRunner::new(ResourceConfig::default());
    println!("Running batch extrema pass...");
    let results = runner.run(&model, &options, &PrintProgress, &CancellationToken::new())?;

    println!("\nGoverning nodes:");
    for metric in &options.metrics {
        let table = results.table(*metric).expect("requested metric");
        if let Some(record) = table.governing() {
            println!(
                "  {:>14}: node {} -> {:.4e} at t = {:.4}s",
                metric.label(),
                record.node_id,
                record.value,
                record.time
            );
        }
    }

    // Time-history pass for the node governing von Mises stress
    let governing = results
        .table(MetricKind::VonMises)
        .and_then(|t| t.governing())
        .expect("non-empty batch");

    let history = TimeHistoryRunner::new(ResourceConfig::default());
    let series = history.run(&model, governing.node_id, MetricKind::VonMises, 0, None)?;
    let (peak_time, peak_value) = series.peak().expect("non-empty series");
    println!(
        "\nTime history at node {}: {} samples, peak {:.4e} at t = {:.4}s",
        series.node_id,
        series.len(),
        peak_value,
        peak_time
    );

    // Dump the von Mises table for the export collaborator
    let json = serde_json::to_string_pretty(results.table(MetricKind::VonMises).unwrap())?;
    println!(
        "\nVon Mises table (first record):\n{}",
        json.lines().take(12).collect::<Vec<_>>().join("\n")
    );

    println!("\n=== Analysis Complete ===");
    Ok(())
}
