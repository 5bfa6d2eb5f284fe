//! Trading strategy module.
//!
//! Implements signal generation for the supported strategy families:
//! SMA crossover, RSI threshold, Bollinger bands, MACD crossover, and
//! Donchian-style breakout. Each family is a pure function from a candle
//! series to an aligned signal sequence; adding a family means adding one
//! parameter variant and one generator, nothing downstream changes.

mod indicators;
mod signals;

pub use indicators::{
    atr_series, bollinger_bands, ema_series, macd_series, rolling_high, rolling_low, rsi_series,
    sma_series, BollingerPoint, MacdPoint,
};
pub use signals::generate_signals;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::BacktestError;

// ============================================================================
// Signals
// ============================================================================

/// Trade action attached to a candle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    /// Enter a position with all available cash
    Buy,
    /// Exit the position entirely
    Sell,
    /// No action
    Hold,
}

/// One signal per candle, aligned 1:1 with the candle series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Timestamp of the candle the signal belongs to
    pub timestamp: NaiveDateTime,
    /// Action to take at this candle's close
    pub action: SignalAction,
}

// ============================================================================
// Strategy Parameters
// ============================================================================

/// SMA crossover parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmaCrossoverParams {
    /// Fast moving average period
    pub fast_period: usize,
    /// Slow moving average period
    pub slow_period: usize,
}

impl Default for SmaCrossoverParams {
    fn default() -> Self {
        Self {
            fast_period: 20,
            slow_period: 50,
        }
    }
}

/// RSI threshold parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiParams {
    /// Wilder smoothing period
    pub rsi_period: usize,
    /// Buy when RSI crosses up through this level
    pub oversold_threshold: f64,
    /// Sell when RSI crosses down through this level
    pub overbought_threshold: f64,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            oversold_threshold: 30.0,
            overbought_threshold: 70.0,
        }
    }
}

/// Bollinger band parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BollingerParams {
    /// Middle band (SMA) period
    pub period: usize,
    /// Band width in population standard deviations
    pub std_dev: f64,
    /// Buy when the normalized band position crosses below this
    pub buy_threshold: f64,
    /// Sell when the normalized band position crosses above this
    pub sell_threshold: f64,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self {
            period: 20,
            std_dev: 2.0,
            buy_threshold: 0.1,
            sell_threshold: 0.9,
        }
    }
}

/// MACD crossover parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdParams {
    /// Fast EMA period
    pub fast_period: usize,
    /// Slow EMA period
    pub slow_period: usize,
    /// Signal line EMA period
    pub signal_period: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

/// Donchian-style breakout parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakoutParams {
    /// Entry channel period (highest high lookback)
    pub lookback: usize,
    /// Exit channel period (lowest low lookback)
    pub exit_lookback: usize,
    /// ATR period for the optional breakout filter
    pub atr_period: usize,
    /// Require the breakout margin to exceed half an ATR
    pub atr_filter: bool,
}

impl Default for BreakoutParams {
    fn default() -> Self {
        Self {
            lookback: 55,
            exit_lookback: 20,
            atr_period: 14,
            atr_filter: false,
        }
    }
}

/// Strategy parameters, one shape per strategy kind.
///
/// Serializes adjacently tagged (`strategy_type` + `strategy_params`) to
/// match the caller-facing contract; missing fields fall back to the
/// variant defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy_type", content = "strategy_params", rename_all = "snake_case")]
pub enum StrategyParams {
    /// Golden/dead cross of two simple moving averages
    SmaCrossover(SmaCrossoverParams),
    /// RSI threshold crossings out of oversold/overbought zones
    RsiOversold(RsiParams),
    /// Normalized position within Bollinger bands
    BollingerBands(BollingerParams),
    /// MACD line crossing its signal line
    MacdSignal(MacdParams),
    /// Channel breakout with an optional ATR filter
    Breakout(BreakoutParams),
}

impl StrategyParams {
    /// Stable kind tag (matches the serialized `strategy_type`)
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SmaCrossover(_) => "sma_crossover",
            Self::RsiOversold(_) => "rsi_oversold",
            Self::BollingerBands(_) => "bollinger_bands",
            Self::MacdSignal(_) => "macd_signal",
            Self::Breakout(_) => "breakout",
        }
    }

    /// Check the variant's parameter constraints.
    pub fn validate(&self) -> Result<(), BacktestError> {
        match self {
            Self::SmaCrossover(p) => {
                if p.fast_period >= p.slow_period {
                    return Err(BacktestError::InvalidParameter(
                        "fast_period must be less than slow_period".to_string(),
                    ));
                }
                if p.fast_period < 1 {
                    return Err(BacktestError::InvalidParameter(
                        "moving average periods must be at least 1".to_string(),
                    ));
                }
            }
            Self::RsiOversold(p) => {
                if p.rsi_period < 2 {
                    return Err(BacktestError::InvalidParameter(
                        "rsi_period must be at least 2".to_string(),
                    ));
                }
                if p.oversold_threshold >= p.overbought_threshold {
                    return Err(BacktestError::InvalidParameter(
                        "oversold_threshold must be less than overbought_threshold".to_string(),
                    ));
                }
                if p.oversold_threshold < 0.0 || p.overbought_threshold > 100.0 {
                    return Err(BacktestError::InvalidParameter(
                        "RSI thresholds must lie within 0-100".to_string(),
                    ));
                }
            }
            Self::BollingerBands(p) => {
                if p.period < 2 {
                    return Err(BacktestError::InvalidParameter(
                        "period must be at least 2".to_string(),
                    ));
                }
                if p.std_dev <= 0.0 {
                    return Err(BacktestError::InvalidParameter(
                        "std_dev must be positive".to_string(),
                    ));
                }
                if p.buy_threshold >= p.sell_threshold {
                    return Err(BacktestError::InvalidParameter(
                        "buy_threshold must be less than sell_threshold".to_string(),
                    ));
                }
                if p.buy_threshold < 0.0 || p.sell_threshold > 1.0 {
                    return Err(BacktestError::InvalidParameter(
                        "band thresholds must lie within 0-1".to_string(),
                    ));
                }
            }
            Self::MacdSignal(p) => {
                if p.fast_period >= p.slow_period {
                    return Err(BacktestError::InvalidParameter(
                        "fast_period must be less than slow_period".to_string(),
                    ));
                }
                if p.fast_period < 1 || p.signal_period < 1 {
                    return Err(BacktestError::InvalidParameter(
                        "MACD periods must be at least 1".to_string(),
                    ));
                }
            }
            Self::Breakout(p) => {
                if p.lookback < 1 || p.exit_lookback < 1 {
                    return Err(BacktestError::InvalidParameter(
                        "breakout channel periods must be at least 1".to_string(),
                    ));
                }
                if p.atr_period < 1 {
                    return Err(BacktestError::InvalidParameter(
                        "atr_period must be at least 1".to_string(),
                    ));
                }
                if p.lookback <= p.exit_lookback {
                    return Err(BacktestError::InvalidParameter(
                        "lookback must be greater than exit_lookback".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Largest lookback the variant needs before any signal is defined.
    ///
    /// A series is usable only when strictly longer than this.
    pub fn max_required_period(&self) -> usize {
        match self {
            Self::SmaCrossover(p) => p.fast_period.max(p.slow_period),
            Self::RsiOversold(p) => p.rsi_period + 1,
            Self::BollingerBands(p) => p.period,
            Self::MacdSignal(p) => p.fast_period.max(p.slow_period) + p.signal_period,
            Self::Breakout(p) => p.lookback.max(p.exit_lookback).max(p.atr_period) + 5,
        }
    }
}

impl std::fmt::Display for StrategyParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind())
    }
}

// ============================================================================
// Tests
// ============================================================================
