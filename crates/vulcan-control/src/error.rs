//! Validation errors for calibration tables and tuning-surface input.
//!
//! Runtime faults are not errors; they are recoverable flags surfaced
//! through `SafetyStatus`.

use thiserror::Error;

/// Calibration table construction errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TableError {
    #[error("axis values must be strictly increasing")]
    AxisNotIncreasing,

    #[error("table cell is not finite")]
    NonFiniteCell,
}

/// Rejected tuning-surface updates
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("firing order must be a permutation of cylinder numbers")]
    BadFiringOrder,

    #[error("per-cylinder fuel trim outside -0.5..=0.5")]
    TrimOutOfRange,

    #[error("target AFR outside measurable range")]
    TargetAfrOutOfRange,
}
