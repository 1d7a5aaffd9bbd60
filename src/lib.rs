//! MSUP Solver - A native Rust modal superposition stress recovery engine
//!
//! This library reconstructs physical stress, deformation, velocity and
//! acceleration time series from modal-superposition data and reduces them
//! to per-node engineering metrics, supporting:
//! - Dense reconstruction of stress/motion components from modal
//!   coordinates and per-node modal shape matrices
//! - Von Mises and principal stresses (closed-form cubic), resultant
//!   magnitudes, and a rainflow-based fatigue damage index
//! - Chunked batch reduction to per-node extrema under a configurable
//!   memory budget, with progress reporting and cancellation
//! - Full time-history recovery for a single node
//!
//! ## Example
//! ```rust
//! use msup_solver::prelude::*;
//! use nalgebra::DMatrix;
//!
//! // 2 modes x 3 time samples of modal coordinates
//! let coord = DMatrix::from_row_slice(2, 3, &[0.10, 0.11, 0.12, 0.20, 0.21, 0.22]);
//! let zeros = DMatrix::zeros(1, 2);
//! let stress = ModalStressSet {
//!     sx: DMatrix::from_row_slice(1, 2, &[10.0, 20.0]),
//!     sy: zeros.clone(),
//!     sz: zeros.clone(),
//!     sxy: zeros.clone(),
//!     syz: zeros.clone(),
//!     sxz: zeros,
//! };
//! let model = ModalModel::new(
//!     coord,
//!     vec![0.0, 0.1, 0.2],
//!     vec![101],
//!     vec![[0.0, 0.0, 0.0]],
//!     stress,
//! )
//! .unwrap();
//!
//! // Reduce every node to its peak von Mises stress
//! let options = BatchOptions::new(vec![MetricKind::VonMises]);
//! let mut runner = BatchRunner::new(ResourceConfig::default());
//! let results = runner
//!     .run(&model, &options, &NoOpObserver, &CancellationToken::new())
//!     .unwrap();
//!
//! let table = results.table(MetricKind::VonMises).unwrap();
//! assert_eq!(table.records.len(), 1);
//! assert!((table.records[0].value - 5.6).abs() < 1e-9);
//! ```

pub mod analysis;
pub mod batch;
pub mod budget;
pub mod compute;
pub mod error;
pub mod history;
pub mod metrics;
pub mod model;
pub mod reconstruct;
pub mod results;
pub mod scalar;

// Re-export common types
pub mod prelude {
    pub use crate::analysis::{
        BatchOptions, FatigueParameters, MetricKind, MotionKind, ReclaimPolicy, ResourceConfig,
    };
    pub use crate::batch::{
        BatchRunner, BatchState, CancellationToken, NoOpObserver, ProgressObserver,
    };
    pub use crate::error::{SolverError, SolverResult};
    pub use crate::history::TimeHistoryRunner;
    pub use crate::model::{
        ModalModel, ModalMotionSet, ModalStressSet, SteadyStateSet, StressComponent,
    };
    pub use crate::results::{BatchResults, ExtremaRecord, ExtremaTable, MetricSeries};
    pub use crate::scalar::Precision;
}

pub use error::{SolverError, SolverResult};
