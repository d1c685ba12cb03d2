//! Error taxonomy shared by the HAI and the simulation engines.
//!
//! Local, recoverable conditions (bad register value, busy axis) are
//! rejected and reported to the caller without side effects. Anything the
//! fault monitor classifies as Critical is never merely returned — it
//! additionally forces a safety-state transition (see `dax_safety`).

use thiserror::Error;

/// Result alias for HAI and engine operations.
pub type HalResult<T> = Result<T, HalError>;

/// Error kinds for HAI and engine operations.
///
/// Payloads are `&'static str` so the error path never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HalError {
    /// A parameter was outside its legal domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// The requested resource was never configured.
    #[error("not initialized: {0}")]
    NotInitialized(&'static str),

    /// The resource is busy and the request was rejected unchanged.
    #[error("busy: {0}")]
    Busy(&'static str),

    /// The operation did not complete within its timeout.
    #[error("timeout after {0} ms")]
    Timeout(u32),

    /// The (simulated) hardware reported a failure.
    #[error("hardware failure: {0}")]
    HardwareFailure(&'static str),

    /// A configuration value is outside its legal range.
    #[error("configuration out of range: {0}")]
    ConfigOutOfRange(&'static str),

    /// The operation is not valid in the current state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// A safety invariant was violated.
    #[error("safety violation: {0}")]
    SafetyViolation(&'static str),
}
