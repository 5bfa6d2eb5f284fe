//! Error types for the backtesting engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using the engine error type.
pub type Result<T> = std::result::Result<T, BacktestError>;

/// Unified error type for a backtest run.
///
/// Every failure inside the pipeline is mapped to one of these kinds at
/// the engine boundary and surfaced as an [`ErrorBody`] rather than a
/// panic or an uncaught fault, so callers (including LLM-agent callers)
/// always receive something they can display.
#[derive(Error, Debug)]
pub enum BacktestError {
    /// Unknown strategy kind, malformed parameters, bad dates or capital
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Fewer candles than the strategy's minimum lookback requires
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// The external candle source failed after exhausting retries
    #[error("Data source error: {0}")]
    DataSource(String),

    /// Nonsensical input reached the simulator (e.g. non-positive price)
    #[error("Computation error: {0}")]
    Computation(String),
}

impl BacktestError {
    /// Stable kind tag used in the serialized error shape.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::InsufficientData(_) => "insufficient_data",
            Self::DataSource(_) => "data_source",
            Self::Computation(_) => "computation",
        }
    }

    /// Check whether this error was caused by caller input.
    pub const fn is_caller_fault(&self) -> bool {
        matches!(self, Self::InvalidParameter(_) | Self::InsufficientData(_))
    }

    /// Convert into the uniform wire shape handed to callers.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

/// Serialized error shape: `{"error": <kind>, "message": <detail>}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    /// Stable machine-readable kind tag
    pub error: String,
    /// Human-readable detail
    pub message: String,
}
