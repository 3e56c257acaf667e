//! Error taxonomy for the partial-likelihood engine.
//!
//! Every public entry point returns `Result<_, EngineError>`; no panics
//! cross the library boundary for caller-supplied bad input. A batched
//! call (`update_partials`, `update_transition_matrices`) either writes
//! every destination it names or none of them.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// A handle was out of range for its kind, or referred to a slot
    /// holding the wrong kind of buffer (e.g. a tip handle with partials
    /// where resolved states were expected).
    #[error("bad {kind} handle: index {index} out of range")]
    BadHandle { kind: &'static str, index: usize },

    /// Caller-supplied scalar or array failed a domain check: a negative
    /// or non-finite branch length, a distribution that does not sum to
    /// one, etc.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// An input array's length disagreed with the instance's configured
    /// counts.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Allocation size overflowed or exceeded the pool's configured cap.
    #[error("out of memory")]
    OutOfMemory,

    /// A root or edge log-likelihood was non-positive or non-finite
    /// before the logarithm was taken. Surfaced so the caller can retry
    /// with rescaling enabled.
    #[error("underflow or NaN encountered computing log-likelihood")]
    UnderflowOrNaN,

    /// A listed but unimplemented operation, e.g. branch-length
    /// derivatives.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

impl EngineError {
    pub fn bad_handle(kind: &'static str, index: usize) -> Self {
        Self::BadHandle { kind, index }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }

    pub fn dimension_mismatch(expected: usize, found: usize) -> Self {
        Self::DimensionMismatch { expected, found }
    }

    /// whether retrying the same call with rescaling enabled is a
    /// sensible recovery strategy.
    pub fn suggests_rescaling(&self) -> bool {
        matches!(self, Self::UnderflowOrNaN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        let err = EngineError::bad_handle("partial", 7);
        assert_eq!(format!("{err}"), "bad partial handle: index 7 out of range");

        let err = EngineError::dimension_mismatch(4, 3);
        assert_eq!(format!("{err}"), "dimension mismatch: expected 4, found 3");
    }

    #[test]
    fn suggests_rescaling_only_for_underflow() {
        assert!(EngineError::UnderflowOrNaN.suggests_rescaling());
        assert!(!EngineError::OutOfMemory.suggests_rescaling());
    }
}
