use crate::airport::PlacementError;

/// Errors that can occur when constructing or starting a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Airport placement failed.
    #[error("airport placement failed: {0}")]
    Placement(#[from] PlacementError),

    /// The fleet has no aircraft.
    #[error("fleet size must be at least 1")]
    EmptyFleet,

    /// The movement step is not a positive finite number.
    #[error("movement step must be positive and finite, got {0}")]
    InvalidStep(f64),

    /// A periodic interval was configured as zero.
    #[error("{0} interval must be non-zero")]
    ZeroInterval(&'static str),
}
