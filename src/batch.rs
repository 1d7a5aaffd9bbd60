//! Batch orchestration: chunked reconstruction, reduction and publication.
//!
//! Drives the full node set through reconstruction and metric evaluation
//! one chunk at a time, reduces every node row to its extremum and time of
//! occurrence in a single combined pass, and publishes each chunk's records
//! atomically before moving on. Chunks never overlap, so the output tables
//! need no locking; cancellation is honored between chunks and leaves a
//! valid partial record set.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};
use nalgebra::DMatrix;

use crate::analysis::{BatchOptions, FatigueParameters, MetricKind, MotionKind, Reduction, ResourceConfig};
use crate::budget::{self, ChunkPlan};
use crate::compute::ComputeLane;
use crate::error::{SolverError, SolverResult};
use crate::metrics;
use crate::model::{ModalModel, StressComponent};
use crate::reconstruct::{check_finite, MotionChunk, Reconstructor, StressChunk};
use crate::results::{BatchResults, ExtremaRecord, ExtremaTable};
use crate::scalar::{Precision, Scalar};

/// Receives the fractional progress of a batch run after each chunk
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, fraction: f64);
}

/// Observer that discards every update
pub struct NoOpObserver;

impl ProgressObserver for NoOpObserver {
    fn on_progress(&self, _fraction: f64) {}
}

/// Cooperative stop request, checked between chunks
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Lifecycle of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Chunking,
    Processing,
    Reducing,
    Complete,
    Failed,
}

/// Which intermediate tensors a run needs per chunk
struct Needs {
    stress: bool,
    von_mises: bool,
    principal: bool,
}

/// Scratch buffers reused across chunks and released on the reclaim cadence
struct ChunkBuffers<T: Scalar> {
    stress: Option<StressChunk<T>>,
    deformation: Option<MotionChunk<T>>,
    velocity: Option<MotionChunk<T>>,
    acceleration: Option<MotionChunk<T>>,
    von_mises: Option<DMatrix<T>>,
    s1: Option<DMatrix<T>>,
    s2: Option<DMatrix<T>>,
    s3: Option<DMatrix<T>>,
    deformation_mag: Option<DMatrix<T>>,
    velocity_mag: Option<DMatrix<T>>,
    acceleration_mag: Option<DMatrix<T>>,
}

impl<T: Scalar> ChunkBuffers<T> {
    fn new() -> Self {
        Self {
            stress: None,
            deformation: None,
            velocity: None,
            acceleration: None,
            von_mises: None,
            s1: None,
            s2: None,
            s3: None,
            deformation_mag: None,
            velocity_mag: None,
            acceleration_mag: None,
        }
    }

    fn clear(&mut self) {
        *self = Self::new();
    }

    fn motion_slots(
        &mut self,
        kind: MotionKind,
    ) -> (&mut Option<MotionChunk<T>>, &mut Option<DMatrix<T>>) {
        match kind {
            MotionKind::Deformation => (&mut self.deformation, &mut self.deformation_mag),
            MotionKind::Velocity => (&mut self.velocity, &mut self.velocity_mag),
            MotionKind::Acceleration => (&mut self.acceleration, &mut self.acceleration_mag),
        }
    }

    fn motion_mag(&self, kind: MotionKind) -> Option<&DMatrix<T>> {
        match kind {
            MotionKind::Deformation => self.deformation_mag.as_ref(),
            MotionKind::Velocity => self.velocity_mag.as_ref(),
            MotionKind::Acceleration => self.acceleration_mag.as_ref(),
        }
    }
}

fn ensure_matrix<T: Scalar>(slot: &mut Option<DMatrix<T>>, rows: usize, cols: usize) -> &mut DMatrix<T> {
    if slot.as_ref().map(|m| m.shape()) != Some((rows, cols)) {
        *slot = Some(DMatrix::zeros(rows, cols));
    }
    slot.as_mut().unwrap()
}

fn ensure_stress<T: Scalar>(slot: &mut Option<StressChunk<T>>, rows: usize, cols: usize) -> &mut StressChunk<T> {
    if slot.as_ref().map(|c| c.shape()) != Some((rows, cols)) {
        *slot = Some(StressChunk::zeros(rows, cols));
    }
    slot.as_mut().unwrap()
}

fn ensure_motion<T: Scalar>(slot: &mut Option<MotionChunk<T>>, rows: usize, cols: usize) -> &mut MotionChunk<T> {
    if slot.as_ref().map(|c| c.shape()) != Some((rows, cols)) {
        *slot = Some(MotionChunk::zeros(rows, cols));
    }
    slot.as_mut().unwrap()
}

/// Batch extrema orchestrator.
///
/// One runner is good for any number of runs; the resource configuration is
/// fixed at construction so every run with this runner is reproducible.
pub struct BatchRunner {
    config: ResourceConfig,
    state: BatchState,
    partial: Option<BatchResults>,
}

impl BatchRunner {
    pub fn new(config: ResourceConfig) -> Self {
        Self {
            config,
            state: BatchState::Idle,
            partial: None,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Records written before a failed run was aborted.
    ///
    /// Populated only when the previous `run` returned an error; completed
    /// chunks stay valid, unattempted nodes are simply absent.
    pub fn partial_results(&self) -> Option<&BatchResults> {
        self.partial.as_ref()
    }

    /// Run a batch over every node in the model.
    ///
    /// Emits progress after each chunk and checks the cancellation token
    /// between chunks. On success the returned tables carry one record per
    /// node per requested metric, in node order.
    pub fn run(
        &mut self,
        model: &ModalModel,
        options: &BatchOptions,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> SolverResult<BatchResults> {
        self.partial = None;
        self.state = BatchState::Idle;
        let result = match self.config.precision {
            Precision::Single => self.run_typed::<f32>(model, options, observer, cancel),
            Precision::Double => self.run_typed::<f64>(model, options, observer, cancel),
        };
        self.state = match result {
            Ok(_) => BatchState::Complete,
            Err(_) => BatchState::Failed,
        };
        result
    }

    fn run_typed<T: Scalar>(
        &mut self,
        model: &ModalModel,
        options: &BatchOptions,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> SolverResult<BatchResults> {
        self.config.validate()?;
        model.validate_mode_skip(options.mode_skip)?;

        if options.metrics.is_empty() {
            return Err(SolverError::InvalidInput("no metrics requested".to_string()));
        }
        let mut metrics_list: Vec<MetricKind> = Vec::new();
        for &m in &options.metrics {
            if !metrics_list.contains(&m) {
                metrics_list.push(m);
            }
        }

        let needs = Needs {
            stress: metrics_list.iter().any(|m| m.needs_stress()),
            von_mises: metrics_list.contains(&MetricKind::VonMises)
                || metrics_list.contains(&MetricKind::DamageIndex),
            principal: metrics_list.contains(&MetricKind::MaxPrincipal)
                || metrics_list.contains(&MetricKind::MinPrincipal),
        };
        let mut motion_kinds: Vec<MotionKind> = Vec::new();
        for m in &metrics_list {
            if let Some(kind) = m.motion_kind() {
                if !motion_kinds.contains(&kind) {
                    motion_kinds.push(kind);
                }
            }
        }
        // Fail fast, before any reconstruction
        for &kind in &motion_kinds {
            if model.motion(kind).is_none() {
                return Err(SolverError::MissingData(format!(
                    "no modal {} data loaded",
                    kind.label()
                )));
            }
        }
        let fatigue = if metrics_list.contains(&MetricKind::DamageIndex) {
            let fatigue = options.fatigue.ok_or_else(|| {
                SolverError::InvalidFatigueParameters(
                    "damage index requested without fatigue parameters".to_string(),
                )
            })?;
            fatigue.validate()?;
            Some(fatigue)
        } else {
            None
        };

        self.state = BatchState::Chunking;
        let num_nodes = model.num_nodes();
        let num_times = model.num_time_samples();
        let stress_components = if needs.stress { 6 } else { 0 };
        let num_components = stress_components + 3 * motion_kinds.len();
        let plan = match options.chunk_size_override {
            Some(size) => {
                let chunk_size = size.clamp(1, num_nodes.max(1));
                ChunkPlan {
                    chunk_size,
                    num_chunks: num_nodes.div_ceil(chunk_size),
                    low_memory: false,
                }
            }
            None => budget::plan(
                budget::available_memory_bytes(),
                &self.config,
                num_nodes,
                num_times,
                num_components,
            ),
        };
        let lane = ComputeLane::from_config(&self.config);
        info!(
            "batch run: {} nodes in {} chunks of {} on the {} lane",
            num_nodes,
            plan.num_chunks,
            plan.chunk_size,
            lane.describe()
        );

        let reconstructor = Reconstructor::<T>::new(model, options.mode_skip)?;
        let mut tables: HashMap<MetricKind, ExtremaTable> = metrics_list
            .iter()
            .map(|&m| (m, ExtremaTable::with_capacity(m, num_nodes)))
            .collect();
        let mut buffers = ChunkBuffers::<T>::new();
        let mut chunks_completed = 0usize;
        let mut nodes_completed = 0usize;
        let mut was_cancelled = false;

        for chunk_idx in 0..plan.num_chunks {
            if cancel.is_cancelled() {
                was_cancelled = true;
                info!(
                    "batch cancelled after {} of {} chunks",
                    chunks_completed, plan.num_chunks
                );
                break;
            }

            let range = plan.chunk_range(chunk_idx, num_nodes);
            if let Err(err) = process_chunk(
                &mut self.state,
                model,
                &reconstructor,
                &lane,
                &metrics_list,
                &needs,
                &motion_kinds,
                fatigue.as_ref(),
                range.clone(),
                num_times,
                &mut buffers,
                &mut tables,
            ) {
                self.partial = Some(BatchResults {
                    tables,
                    nodes_completed,
                    total_nodes: num_nodes,
                    chunks_completed,
                    total_chunks: plan.num_chunks,
                    cancelled: false,
                    low_memory: plan.low_memory,
                });
                return Err(err);
            }

            nodes_completed += range.len();
            chunks_completed += 1;
            observer.on_progress(chunks_completed as f64 / plan.num_chunks as f64);
            debug!(
                "chunk {}/{} reduced ({} nodes written)",
                chunks_completed, plan.num_chunks, nodes_completed
            );

            if options.reclaim.should_reclaim(chunks_completed) {
                buffers.clear();
                debug!("released chunk scratch buffers");
            }
        }

        Ok(BatchResults {
            tables,
            nodes_completed,
            total_nodes: num_nodes,
            chunks_completed,
            total_chunks: plan.num_chunks,
            cancelled: was_cancelled,
            low_memory: plan.low_memory,
        })
    }
}

/// Reconstruct, evaluate and reduce one chunk, publishing its records.
///
/// Any error leaves the output tables exactly as they were before this
/// chunk: records are pushed only after every metric for the chunk has been
/// computed successfully.
#[allow(clippy::too_many_arguments)]
fn process_chunk<T: Scalar>(
    state: &mut BatchState,
    model: &ModalModel,
    reconstructor: &Reconstructor<'_, T>,
    lane: &ComputeLane,
    metrics_list: &[MetricKind],
    needs: &Needs,
    motion_kinds: &[MotionKind],
    fatigue: Option<&FatigueParameters>,
    range: Range<usize>,
    num_times: usize,
    buffers: &mut ChunkBuffers<T>,
    tables: &mut HashMap<MetricKind, ExtremaTable>,
) -> SolverResult<()> {
    *state = BatchState::Processing;
    let rows = range.len();

    if needs.stress {
        let stress = ensure_stress(&mut buffers.stress, rows, num_times);
        reconstructor.fill_stress(lane, range.clone(), stress);
        for component in StressComponent::ALL {
            check_finite("stress", stress.component(component))?;
        }
    }
    if needs.von_mises {
        let stress = buffers.stress.as_ref().unwrap();
        let out = ensure_matrix(&mut buffers.von_mises, rows, num_times);
        metrics::von_mises_into(stress, out);
    }
    if needs.principal {
        let stress = buffers.stress.as_ref().unwrap();
        let s1 = ensure_matrix(&mut buffers.s1, rows, num_times);
        metrics::principal_into(
            stress,
            s1,
            ensure_matrix(&mut buffers.s2, rows, num_times),
            ensure_matrix(&mut buffers.s3, rows, num_times),
        );
    }
    for &kind in motion_kinds {
        let (chunk_slot, mag_slot) = buffers.motion_slots(kind);
        let chunk = ensure_motion(chunk_slot, rows, num_times);
        reconstructor.fill_motion(lane, kind, range.clone(), chunk)?;
        check_finite(kind.label(), &chunk.ux)?;
        check_finite(kind.label(), &chunk.uy)?;
        check_finite(kind.label(), &chunk.uz)?;
        metrics::magnitude_into(chunk, ensure_matrix(mag_slot, rows, num_times));
    }

    *state = BatchState::Reducing;
    for &metric in metrics_list {
        let table = tables.get_mut(&metric).unwrap();
        match metric {
            MetricKind::VonMises => {
                let reduced = reduce_rows(buffers.von_mises.as_ref().unwrap(), Reduction::Max);
                write_reduced(table, model, &range, &reduced);
            }
            MetricKind::MaxPrincipal => {
                let reduced = reduce_rows(buffers.s1.as_ref().unwrap(), Reduction::Max);
                write_reduced(table, model, &range, &reduced);
            }
            MetricKind::MinPrincipal => {
                let reduced = reduce_rows(buffers.s3.as_ref().unwrap(), Reduction::Min);
                write_reduced(table, model, &range, &reduced);
            }
            MetricKind::Deformation | MetricKind::Velocity | MetricKind::Acceleration => {
                let mag = buffers.motion_mag(metric.motion_kind().unwrap()).unwrap();
                let reduced = reduce_rows(mag, metric.reduction());
                write_reduced(table, model, &range, &reduced);
            }
            MetricKind::DamageIndex => {
                let von_mises = buffers.von_mises.as_ref().unwrap();
                let fatigue = fatigue.unwrap();
                for i in 0..rows {
                    let series: Vec<f64> =
                        von_mises.row(i).iter().map(|v| v.to_f64()).collect();
                    let damage = metrics::damage_index(&series, fatigue);
                    // Time of the governing (series-max) stress sample
                    let peak = series
                        .iter()
                        .enumerate()
                        .max_by(|a, b| a.1.total_cmp(b.1))
                        .map(|(idx, _)| idx)
                        .unwrap_or(0);
                    let node = range.start + i;
                    let [x, y, z] = model.node_coords()[node];
                    table.records.push(ExtremaRecord {
                        node_id: model.node_ids()[node],
                        x,
                        y,
                        z,
                        value: damage,
                        time: model.times()[peak],
                    });
                }
            }
        }
    }
    Ok(())
}

/// Combined extremum/arg-extremum over each row's time axis, single pass
fn reduce_rows<T: Scalar>(m: &DMatrix<T>, reduction: Reduction) -> Vec<(T, usize)> {
    let (num_rows, num_cols) = m.shape();
    let mut best: Vec<(T, usize)> = m.column(0).iter().map(|&v| (v, 0)).collect();
    for j in 1..num_cols {
        let column = m.column(j);
        for i in 0..num_rows {
            let v = column[i];
            let better = match reduction {
                Reduction::Max => v > best[i].0,
                Reduction::Min => v < best[i].0,
            };
            if better {
                best[i] = (v, j);
            }
        }
    }
    best
}

fn write_reduced<T: Scalar>(
    table: &mut ExtremaTable,
    model: &ModalModel,
    range: &Range<usize>,
    reduced: &[(T, usize)],
) {
    for (i, &(value, time_idx)) in reduced.iter().enumerate() {
        let node = range.start + i;
        let [x, y, z] = model.node_coords()[node];
        table.records.push(ExtremaRecord {
            node_id: model.node_ids()[node],
            x,
            y,
            z,
            value: value.to_f64(),
            time: model.times()[time_idx],
        });
    }
}
