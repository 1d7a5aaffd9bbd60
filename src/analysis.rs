//! Analysis request and resource configuration types

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};
use crate::scalar::Precision;

/// Derived quantity a run can compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    /// Von Mises equivalent stress
    VonMises,
    /// Maximum principal stress (s1)
    MaxPrincipal,
    /// Minimum principal stress (s3)
    MinPrincipal,
    /// Deformation magnitude
    Deformation,
    /// Velocity magnitude
    Velocity,
    /// Acceleration magnitude
    Acceleration,
    /// Cumulative fatigue damage index
    DamageIndex,
}

/// Direction of the time-axis reduction for a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Max,
    Min,
}

impl MetricKind {
    /// All metrics the engine knows about
    pub const ALL: [MetricKind; 7] = [
        MetricKind::VonMises,
        MetricKind::MaxPrincipal,
        MetricKind::MinPrincipal,
        MetricKind::Deformation,
        MetricKind::Velocity,
        MetricKind::Acceleration,
        MetricKind::DamageIndex,
    ];

    /// Which extremum the batch reduction keeps for this metric.
    ///
    /// s3 is reduced to its minimum; everything else to its maximum.
    pub fn reduction(self) -> Reduction {
        match self {
            MetricKind::MinPrincipal => Reduction::Min,
            _ => Reduction::Max,
        }
    }

    /// True for metrics derived from the six stress components
    pub fn needs_stress(self) -> bool {
        matches!(
            self,
            MetricKind::VonMises
                | MetricKind::MaxPrincipal
                | MetricKind::MinPrincipal
                | MetricKind::DamageIndex
        )
    }

    /// The motion data set this metric reconstructs from, if any
    pub fn motion_kind(self) -> Option<MotionKind> {
        match self {
            MetricKind::Deformation => Some(MotionKind::Deformation),
            MetricKind::Velocity => Some(MotionKind::Velocity),
            MetricKind::Acceleration => Some(MotionKind::Acceleration),
            _ => None,
        }
    }

    /// Short name used in logs and exported tables
    pub fn label(self) -> &'static str {
        match self {
            MetricKind::VonMises => "von_mises",
            MetricKind::MaxPrincipal => "max_principal",
            MetricKind::MinPrincipal => "min_principal",
            MetricKind::Deformation => "deformation",
            MetricKind::Velocity => "velocity",
            MetricKind::Acceleration => "acceleration",
            MetricKind::DamageIndex => "damage_index",
        }
    }
}

/// Kind of motion component set held by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionKind {
    Deformation,
    Velocity,
    Acceleration,
}

impl MotionKind {
    pub fn label(self) -> &'static str {
        match self {
            MotionKind::Deformation => "deformation",
            MotionKind::Velocity => "velocity",
            MotionKind::Acceleration => "acceleration",
        }
    }
}

/// Basquin stress-life material parameters for the damage index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FatigueParameters {
    /// Fatigue strength coefficient σ'f
    pub strength_coefficient: f64,
    /// Fatigue strength exponent b
    pub strength_exponent: f64,
}

impl FatigueParameters {
    pub fn new(strength_coefficient: f64, strength_exponent: f64) -> Self {
        Self {
            strength_coefficient,
            strength_exponent,
        }
    }

    /// Reject non-physical material constants before any work is done
    pub fn validate(&self) -> SolverResult<()> {
        if !self.strength_coefficient.is_finite() || self.strength_coefficient <= 0.0 {
            return Err(SolverError::InvalidFatigueParameters(format!(
                "strength coefficient must be positive, got {}",
                self.strength_coefficient
            )));
        }
        if !self.strength_exponent.is_finite() || self.strength_exponent == 0.0 {
            return Err(SolverError::InvalidFatigueParameters(format!(
                "strength exponent must be non-zero, got {}",
                self.strength_exponent
            )));
        }
        Ok(())
    }
}

/// Cadence at which chunk-local scratch memory is released back to the
/// allocator. Reclaiming on every chunk keeps the peak footprint smallest;
/// a larger cadence amortizes the reallocation cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimPolicy {
    /// Release scratch buffers after every this many chunks; 0 disables
    pub every_chunks: usize,
}

impl Default for ReclaimPolicy {
    fn default() -> Self {
        Self { every_chunks: 8 }
    }
}

impl ReclaimPolicy {
    pub fn every(chunks: usize) -> Self {
        Self {
            every_chunks: chunks,
        }
    }

    pub fn never() -> Self {
        Self { every_chunks: 0 }
    }

    /// Whether buffers should be released after the given completed chunk
    pub fn should_reclaim(&self, chunks_completed: usize) -> bool {
        self.every_chunks > 0 && chunks_completed % self.every_chunks == 0
    }
}

/// Options for a batch extrema run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Metrics to compute, in output order
    pub metrics: Vec<MetricKind>,
    /// Number of lowest-order modes excluded from reconstruction
    pub mode_skip: usize,
    /// Material constants, required when `DamageIndex` is requested
    pub fatigue: Option<FatigueParameters>,
    /// Scratch memory release cadence
    pub reclaim: ReclaimPolicy,
    /// Fixed chunk size overriding the memory plan (diagnostics/testing)
    pub chunk_size_override: Option<usize>,
}

impl BatchOptions {
    pub fn new(metrics: Vec<MetricKind>) -> Self {
        Self {
            metrics,
            mode_skip: 0,
            fatigue: None,
            reclaim: ReclaimPolicy::default(),
            chunk_size_override: None,
        }
    }

    pub fn with_mode_skip(mut self, mode_skip: usize) -> Self {
        self.mode_skip = mode_skip;
        self
    }

    pub fn with_fatigue(mut self, fatigue: FatigueParameters) -> Self {
        self.fatigue = Some(fatigue);
        self
    }

    pub fn with_reclaim_policy(mut self, reclaim: ReclaimPolicy) -> Self {
        self.reclaim = reclaim;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size_override = Some(chunk_size);
        self
    }
}

/// Resource configuration supplied by the settings collaborator.
///
/// Threaded explicitly into the orchestrators so batch runs stay
/// reproducible and independently testable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Fraction of available host memory the run may claim, in (0, 1]
    pub memory_fraction: f64,
    /// Numeric precision for reconstruction and metrics
    pub precision: Precision,
    /// Prefer an accelerator lane when one is available
    pub use_accelerator: bool,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            memory_fraction: 0.9,
            precision: Precision::Double,
            use_accelerator: false,
        }
    }
}

impl ResourceConfig {
    pub fn validate(&self) -> SolverResult<()> {
        if !self.memory_fraction.is_finite()
            || self.memory_fraction <= 0.0
            || self.memory_fraction > 1.0
        {
            return Err(SolverError::InvalidInput(format!(
                "memory fraction must be in (0, 1], got {}",
                self.memory_fraction
            )));
        }
        Ok(())
    }

    pub fn with_memory_fraction(mut self, fraction: f64) -> Self {
        self.memory_fraction = fraction;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_accelerator(mut self, use_accelerator: bool) -> Self {
        self.use_accelerator = use_accelerator;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_principal_reduces_to_min() {
        for metric in MetricKind::ALL {
            match metric {
                MetricKind::MinPrincipal => assert_eq!(metric.reduction(), Reduction::Min),
                _ => assert_eq!(metric.reduction(), Reduction::Max),
            }
        }
    }

    #[test]
    fn fatigue_rejects_non_physical_constants() {
        assert!(FatigueParameters::new(900.0, -0.1).validate().is_ok());
        assert!(FatigueParameters::new(0.0, -0.1).validate().is_err());
        assert!(FatigueParameters::new(-5.0, -0.1).validate().is_err());
        assert!(FatigueParameters::new(900.0, 0.0).validate().is_err());
    }

    #[test]
    fn reclaim_cadence() {
        let policy = ReclaimPolicy::every(2);
        assert!(!policy.should_reclaim(1));
        assert!(policy.should_reclaim(2));
        assert!(policy.should_reclaim(4));
        assert!(!ReclaimPolicy::never().should_reclaim(7));
    }

    #[test]
    fn resource_config_bounds() {
        assert!(ResourceConfig::default().validate().is_ok());
        assert!(ResourceConfig::default()
            .with_memory_fraction(0.0)
            .validate()
            .is_err());
        assert!(ResourceConfig::default()
            .with_memory_fraction(1.5)
            .validate()
            .is_err());
    }
}
