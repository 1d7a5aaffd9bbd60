//! Compute lane selection.
//!
//! Reconstruction and metric evaluation are pure array-to-array transforms,
//! so the orchestrators stay agnostic about where the arithmetic runs. This
//! build ships a sequential lane and a rayon thread-pool lane; an
//! accelerator request degrades to the parallel CPU lane with a logged
//! warning rather than failing the run.

use log::warn;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::analysis::ResourceConfig;

/// Where a run's data-parallel work executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeLane {
    /// Single-threaded execution
    Sequential,
    /// Rayon worker threads
    Parallel { threads: usize },
}

impl ComputeLane {
    /// Pick a lane for the given resource configuration
    pub fn from_config(config: &ResourceConfig) -> Self {
        if config.use_accelerator {
            warn!("accelerator lane requested but no accelerator backend is built in; using CPU threads");
        }
        let threads = rayon::current_num_threads();
        if threads <= 1 {
            ComputeLane::Sequential
        } else {
            ComputeLane::Parallel { threads }
        }
    }

    /// Run one closure per task, on this lane.
    ///
    /// Tasks must be independent; the batch orchestrator only ever passes
    /// disjoint output buffers here.
    pub fn dispatch<T, F>(&self, tasks: Vec<T>, op: F)
    where
        T: Send,
        F: Fn(T) + Send + Sync,
    {
        match self {
            ComputeLane::Sequential => tasks.into_iter().for_each(op),
            ComputeLane::Parallel { .. } => tasks.into_par_iter().for_each(op),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ComputeLane::Sequential => "sequential CPU".to_string(),
            ComputeLane::Parallel { threads } => format!("parallel CPU ({threads} threads)"),
        }
    }
}
