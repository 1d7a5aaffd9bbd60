//! Error types for the MSUP solver

use thiserror::Error;

/// Main error type for solver operations
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid mode skip {skip}: only {num_modes} modes are loaded")]
    InvalidModeSkip { skip: usize, num_modes: usize },

    #[error("Node {0} not found in the loaded node set")]
    NodeNotFound(u64),

    #[error("Invalid fatigue parameters: {0}")]
    InvalidFatigueParameters(String),

    #[error("Reconstruction failed: {0}")]
    ReconstructionFailure(String),

    #[error("Missing modal data: {0}")]
    MissingData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for solver operations
pub type SolverResult<T> = Result<T, SolverError>;
