//! Dense reconstruction of physical component time series.
//!
//! Physical values for a node range are recovered as
//! `modal[range, skip..] * coord[skip.., ..]`, one matrix product per
//! component, followed by a per-row steady-state broadcast where offsets
//! are loaded. This is the arithmetic bulk of a run and the natural point
//! for parallel dispatch; it reads only shared immutable matrices and is
//! safe to invoke concurrently for disjoint node ranges.

use std::ops::Range;

use nalgebra::{DMatrix, DVector};

use crate::analysis::MotionKind;
use crate::compute::ComputeLane;
use crate::error::{SolverError, SolverResult};
use crate::model::{ModalModel, StressComponent};
use crate::scalar::Scalar;

/// Reconstructed stress components for one node chunk, node rows x time
/// columns. Scratch-owned by the running orchestrator and reused across
/// chunks.
#[derive(Debug, Clone)]
pub struct StressChunk<T: Scalar> {
    pub sx: DMatrix<T>,
    pub sy: DMatrix<T>,
    pub sz: DMatrix<T>,
    pub sxy: DMatrix<T>,
    pub syz: DMatrix<T>,
    pub sxz: DMatrix<T>,
}

impl<T: Scalar> StressChunk<T> {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            sx: DMatrix::zeros(rows, cols),
            sy: DMatrix::zeros(rows, cols),
            sz: DMatrix::zeros(rows, cols),
            sxy: DMatrix::zeros(rows, cols),
            syz: DMatrix::zeros(rows, cols),
            sxz: DMatrix::zeros(rows, cols),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.sx.shape()
    }

    pub fn component(&self, component: StressComponent) -> &DMatrix<T> {
        match component {
            StressComponent::Sx => &self.sx,
            StressComponent::Sy => &self.sy,
            StressComponent::Sz => &self.sz,
            StressComponent::Sxy => &self.sxy,
            StressComponent::Syz => &self.syz,
            StressComponent::Sxz => &self.sxz,
        }
    }
}

/// Reconstructed motion components (ux, uy, uz) for one node chunk
#[derive(Debug, Clone)]
pub struct MotionChunk<T: Scalar> {
    pub ux: DMatrix<T>,
    pub uy: DMatrix<T>,
    pub uz: DMatrix<T>,
}

impl<T: Scalar> MotionChunk<T> {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            ux: DMatrix::zeros(rows, cols),
            uy: DMatrix::zeros(rows, cols),
            uz: DMatrix::zeros(rows, cols),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.ux.shape()
    }
}

/// Per-run reconstruction engine.
///
/// Converts the mode-skipped coordinate matrix to the run's precision once
/// at construction; every chunk after that is a single gemm per component.
pub struct Reconstructor<'m, T: Scalar> {
    model: &'m ModalModel,
    /// Coordinate matrix with skipped modes removed, (modes - skip) x times
    coord: DMatrix<T>,
    mode_skip: usize,
}

impl<'m, T: Scalar> Reconstructor<'m, T> {
    pub fn new(model: &'m ModalModel, mode_skip: usize) -> SolverResult<Self> {
        model.validate_mode_skip(mode_skip)?;
        let view = model.coord_skipped(mode_skip);
        let coord = DMatrix::from_fn(view.nrows(), view.ncols(), |i, j| <T as Scalar>::from_f64(view[(i, j)]));
        Ok(Self {
            model,
            coord,
            mode_skip,
        })
    }

    pub fn num_time_samples(&self) -> usize {
        self.coord.ncols()
    }

    /// Reconstruct one component for a node range into `out`.
    ///
    /// `out` must already have the chunk's shape (range length x time
    /// samples). The optional steady-state offsets are added as a per-row
    /// constant after the product.
    pub fn reconstruct_into(
        &self,
        modal: &DMatrix<f64>,
        steady: Option<&DVector<f64>>,
        nodes: Range<usize>,
        out: &mut DMatrix<T>,
    ) {
        let rows = nodes.len();
        let modes = self.coord.nrows();
        debug_assert_eq!(out.nrows(), rows);
        debug_assert_eq!(out.ncols(), self.coord.ncols());

        let lhs = DMatrix::from_fn(rows, modes, |i, j| {
            <T as Scalar>::from_f64(modal[(nodes.start + i, self.mode_skip + j)])
        });
        out.gemm(T::one(), &lhs, &self.coord, T::zero());

        if let Some(offsets) = steady {
            for i in 0..rows {
                out.row_mut(i).add_scalar_mut(<T as Scalar>::from_f64(offsets[nodes.start + i]));
            }
        }
    }

    /// Reconstruct all six stress components for a node range, dispatching
    /// the per-component products on the given lane.
    pub fn fill_stress(&self, lane: &ComputeLane, nodes: Range<usize>, chunk: &mut StressChunk<T>) {
        let stress = self.model.stress();
        let steady = self.model.steady_state();
        let tasks: Vec<(&DMatrix<f64>, Option<&DVector<f64>>, &mut DMatrix<T>)> = vec![
            (&stress.sx, steady.map(|s| &s.sx), &mut chunk.sx),
            (&stress.sy, steady.map(|s| &s.sy), &mut chunk.sy),
            (&stress.sz, steady.map(|s| &s.sz), &mut chunk.sz),
            (&stress.sxy, steady.map(|s| &s.sxy), &mut chunk.sxy),
            (&stress.syz, steady.map(|s| &s.syz), &mut chunk.syz),
            (&stress.sxz, steady.map(|s| &s.sxz), &mut chunk.sxz),
        ];
        lane.dispatch(tasks, |(modal, offsets, out)| {
            self.reconstruct_into(modal, offsets, nodes.clone(), out);
        });
    }

    /// Reconstruct the three components of a motion set for a node range.
    ///
    /// Fails with `MissingData` when the model was loaded without that set.
    pub fn fill_motion(
        &self,
        lane: &ComputeLane,
        kind: MotionKind,
        nodes: Range<usize>,
        chunk: &mut MotionChunk<T>,
    ) -> SolverResult<()> {
        let set = self.model.motion(kind).ok_or_else(|| {
            SolverError::MissingData(format!("no modal {} data loaded", kind.label()))
        })?;
        let tasks: Vec<(&DMatrix<f64>, &mut DMatrix<T>)> = vec![
            (&set.ux, &mut chunk.ux),
            (&set.uy, &mut chunk.uy),
            (&set.uz, &mut chunk.uz),
        ];
        lane.dispatch(tasks, |(modal, out)| {
            self.reconstruct_into(modal, None, nodes.clone(), out);
        });
        Ok(())
    }
}

/// Reject chunks containing non-finite values.
///
/// A NaN or infinity here means the inputs or the arithmetic broke down;
/// the batch must fail rather than publish a poisoned extremum.
pub fn check_finite<T: Scalar>(label: &str, m: &DMatrix<T>) -> SolverResult<()> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::ReconstructionFailure(format!(
            "non-finite values in reconstructed {label}"
        )));
    }
    Ok(())
}
