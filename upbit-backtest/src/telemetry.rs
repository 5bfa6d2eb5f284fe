//! Run observation hooks for the backtest engine.
//!
//! The engine reports progress through an injected [`BacktestObserver`]
//! instead of logging from inside the computation, so the pure pipeline
//! stays silent and callers decide where run narration goes (a tracing
//! subscriber, an agent context, or nowhere at all in tests).

use std::fmt;

// ============================================================================
// Pipeline Stages
// ============================================================================

/// Coarse pipeline stage, reported once when the stage begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Parameter and date-range validation
    Validation,
    /// Signal generation over the candle series
    Signals,
    /// Portfolio simulation
    Simulation,
    /// Metric and report assembly
    Analysis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validation => "validation",
            Stage::Signals => "signals",
            Stage::Simulation => "simulation",
            Stage::Analysis => "analysis",
        };
        write!(f, "{}", name)
    }
}

// ============================================================================
// Observer Trait
// ============================================================================

/// Receiver for engine progress notifications.
///
/// All methods have no-op defaults so implementors only handle what they
/// care about. Implementations must be cheap; they are called from inside
/// the run loop.
pub trait BacktestObserver: Send + Sync {
    /// A pipeline stage is starting.
    fn on_stage(&self, _stage: Stage, _detail: &str) {}

    /// Informational message (counts, boundaries).
    fn info(&self, _message: &str) {}

    /// A degraded path worth surfacing (ignored signal, sentinel metric).
    fn warn(&self, _message: &str) {}
}

/// Observer that forwards everything to `tracing`.
#[derive(Debug, Default, Clone)]
pub struct TracingObserver;

impl BacktestObserver for TracingObserver {
    fn on_stage(&self, stage: Stage, detail: &str) {
        tracing::info!(stage = %stage, "{}", detail);
    }

    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}

/// Observer that discards everything. Used in tests and pure callers.
#[derive(Debug, Default, Clone)]
pub struct NullObserver;

impl BacktestObserver for NullObserver {}
