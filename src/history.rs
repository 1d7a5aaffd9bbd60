//! Single-node time-history reconstruction.
//!
//! The full-series counterpart of the batch path: one node, every time
//! sample, no reduction. Shares the reconstruction and metric kernels with
//! the batch orchestrator, so a node's series here is identical to the
//! values the batch reduced — wherever its chunk boundary fell.

use nalgebra::DMatrix;

use crate::analysis::{FatigueParameters, MetricKind, ResourceConfig};
use crate::compute::ComputeLane;
use crate::error::{SolverError, SolverResult};
use crate::metrics;
use crate::model::{ModalModel, StressComponent};
use crate::reconstruct::{check_finite, MotionChunk, Reconstructor, StressChunk};
use crate::results::MetricSeries;
use crate::scalar::{Precision, Scalar};

/// Single-node orchestrator
pub struct TimeHistoryRunner {
    config: ResourceConfig,
}

impl TimeHistoryRunner {
    pub fn new(config: ResourceConfig) -> Self {
        Self { config }
    }

    /// Reconstruct the full series of one metric at one node.
    ///
    /// Fails with `NodeNotFound` for an unknown id. The damage index is a
    /// whole-series scalar with no time-history form and is rejected here.
    pub fn run(
        &self,
        model: &ModalModel,
        node_id: u64,
        metric: MetricKind,
        mode_skip: usize,
        fatigue: Option<&FatigueParameters>,
    ) -> SolverResult<MetricSeries> {
        self.config.validate()?;
        if let Some(fatigue) = fatigue {
            fatigue.validate()?;
        }
        match self.config.precision {
            Precision::Single => self.run_typed::<f32>(model, node_id, metric, mode_skip),
            Precision::Double => self.run_typed::<f64>(model, node_id, metric, mode_skip),
        }
    }

    fn run_typed<T: Scalar>(
        &self,
        model: &ModalModel,
        node_id: u64,
        metric: MetricKind,
        mode_skip: usize,
    ) -> SolverResult<MetricSeries> {
        if metric == MetricKind::DamageIndex {
            return Err(SolverError::InvalidInput(
                "damage index is a batch-only metric with no time-history form".to_string(),
            ));
        }
        let row = model.node_row(node_id)?;
        let reconstructor = Reconstructor::<T>::new(model, mode_skip)?;
        let lane = ComputeLane::from_config(&self.config);
        let num_times = model.num_time_samples();
        let range = row..row + 1;

        let mut out = DMatrix::<T>::zeros(1, num_times);
        if let Some(kind) = metric.motion_kind() {
            let mut chunk = MotionChunk::<T>::zeros(1, num_times);
            reconstructor.fill_motion(&lane, kind, range, &mut chunk)?;
            check_finite(kind.label(), &chunk.ux)?;
            check_finite(kind.label(), &chunk.uy)?;
            check_finite(kind.label(), &chunk.uz)?;
            metrics::magnitude_into(&chunk, &mut out);
        } else {
            let mut chunk = StressChunk::<T>::zeros(1, num_times);
            reconstructor.fill_stress(&lane, range, &mut chunk);
            for component in StressComponent::ALL {
                check_finite("stress", chunk.component(component))?;
            }
            match metric {
                MetricKind::VonMises => metrics::von_mises_into(&chunk, &mut out),
                MetricKind::MaxPrincipal | MetricKind::MinPrincipal => {
                    let mut s1 = DMatrix::<T>::zeros(1, num_times);
                    let mut s2 = DMatrix::<T>::zeros(1, num_times);
                    let mut s3 = DMatrix::<T>::zeros(1, num_times);
                    metrics::principal_into(&chunk, &mut s1, &mut s2, &mut s3);
                    out = if metric == MetricKind::MaxPrincipal { s1 } else { s3 };
                }
                _ => unreachable!("stress metrics handled above"),
            }
        }

        Ok(MetricSeries {
            node_id,
            metric,
            times: model.times().to_vec(),
            values: out.row(0).iter().map(|v| v.to_f64()).collect(),
        })
    }
}
