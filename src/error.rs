//! Error types and result definitions.

use thiserror::Error;

/// Errors surfaced by the research core.
///
/// Pure components (indicators, strategies, the backtest engine) return
/// these as values; nothing is retried inside the core and no error crosses
/// a thread boundary without being converted to a value first.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed input: bad bar series, misaligned signal series, or an
    /// out-of-range parameter.
    #[error("Invalid input '{what}': {reason}")]
    InvalidInput {
        /// What was invalid (parameter or input name)
        what: String,
        /// Why it was rejected
        reason: String,
    },

    /// Fewer bars than the requested computation needs.
    #[error("Insufficient data: need at least {need} bars, got {got}")]
    InsufficientData {
        /// Minimum required bars
        need: usize,
        /// Actual bars provided
        got: usize,
    },

    /// A non-finite intermediate value was detected. Under the indicator
    /// contracts this should be impossible; it is treated as a defect.
    #[error("Numerical defect in {context}: non-finite value at bar {index}")]
    Numerical {
        /// Where the value was produced
        context: String,
        /// Bar index at which it surfaced
        index: usize,
    },

    /// The external bar provider failed; propagated unchanged.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Run-level cancellation was observed.
    #[error("Cancelled")]
    Cancelled,
}

/// Result type for all core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid input error.
    pub fn invalid_input(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Create an insufficient data error.
    pub fn insufficient_data(need: usize, got: usize) -> Self {
        Self::InsufficientData { need, got }
    }

    /// Create a numerical defect error.
    pub fn numerical(context: impl Into<String>, index: usize) -> Self {
        Self::Numerical {
            context: context.into(),
            index,
        }
    }

    /// Create a provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Machine-readable error kind, stable across message changes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::Numerical { .. } => "numerical",
            Self::Provider(_) => "provider",
            Self::Cancelled => "cancelled",
        }
    }
}
