//! Candle data module for the Upbit exchange.
//!
//! Defines the candle series consumed by the backtest core plus the async
//! source boundary that produces it. The core itself never performs I/O:
//! a complete, ascending, date-clipped series is handed over before a run
//! starts, and paging/retry concerns stay on this side of that boundary.

mod fetcher;
mod source;

pub use fetcher::{FetchPlan, PagedFetcher, PagingConfig};
pub use source::{CandleDataSource, InMemorySource, SourceError};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::BacktestError;

// ============================================================================
// Core Data Types
// ============================================================================

/// Candle interval as named by the exchange API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    /// 1-minute candles
    Minute1,
    /// 3-minute candles
    Minute3,
    /// 5-minute candles
    Minute5,
    /// 10-minute candles
    Minute10,
    /// 15-minute candles
    Minute15,
    /// 30-minute candles
    Minute30,
    /// 60-minute candles
    Minute60,
    /// 240-minute candles
    Minute240,
    /// Daily candles
    Day,
    /// Weekly candles
    Week,
    /// Monthly candles
    Month,
}

impl Interval {
    /// Parse from the exchange interval name (e.g., "minute60", "day")
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "minute1" => Some(Self::Minute1),
            "minute3" => Some(Self::Minute3),
            "minute5" => Some(Self::Minute5),
            "minute10" => Some(Self::Minute10),
            "minute15" => Some(Self::Minute15),
            "minute30" => Some(Self::Minute30),
            "minute60" => Some(Self::Minute60),
            "minute240" => Some(Self::Minute240),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            _ => None,
        }
    }

    /// Convert to the candle endpoint path fragment
    pub fn to_api_path(&self) -> &'static str {
        match self {
            Self::Minute1 => "candles/minutes/1",
            Self::Minute3 => "candles/minutes/3",
            Self::Minute5 => "candles/minutes/5",
            Self::Minute10 => "candles/minutes/10",
            Self::Minute15 => "candles/minutes/15",
            Self::Minute30 => "candles/minutes/30",
            Self::Minute60 => "candles/minutes/60",
            Self::Minute240 => "candles/minutes/240",
            Self::Day => "candles/days",
            Self::Week => "candles/weeks",
            Self::Month => "candles/months",
        }
    }

    /// Get the number of minutes per candle
    pub fn minutes(&self) -> u32 {
        match self {
            Self::Minute1 => 1,
            Self::Minute3 => 3,
            Self::Minute5 => 5,
            Self::Minute10 => 10,
            Self::Minute15 => 15,
            Self::Minute30 => 30,
            Self::Minute60 => 60,
            Self::Minute240 => 240,
            Self::Day => 60 * 24,
            Self::Week => 60 * 24 * 7,
            Self::Month => 60 * 24 * 30,
        }
    }

    /// Candle periods per year for annualizing return statistics.
    ///
    /// Crypto markets trade continuously, so minute intervals scale from
    /// the full 525,600-minute year rather than an exchange session count.
    pub fn periods_per_year(&self) -> f64 {
        match self {
            Self::Day => 365.0,
            Self::Week => 52.0,
            Self::Month => 12.0,
            minute => 525_600.0 / minute.minutes() as f64,
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Minute1 => "minute1",
            Self::Minute3 => "minute3",
            Self::Minute5 => "minute5",
            Self::Minute10 => "minute10",
            Self::Minute15 => "minute15",
            Self::Minute30 => "minute30",
            Self::Minute60 => "minute60",
            Self::Minute240 => "minute240",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        };
        write!(f, "{}", name)
    }
}

/// A single candlestick (OHLCV) as served by the exchange.
///
/// Field renames match the exchange wire names so collaborator JSON
/// deserializes directly; timestamps are exchange-local (KST) and naive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    /// Market code (e.g., "KRW-BTC")
    pub market: String,
    /// Candle open time, exchange-local
    #[serde(rename = "candle_date_time_kst")]
    pub timestamp: NaiveDateTime,
    /// Open price
    #[serde(rename = "opening_price")]
    pub open: f64,
    /// High price
    #[serde(rename = "high_price")]
    pub high: f64,
    /// Low price
    #[serde(rename = "low_price")]
    pub low: f64,
    /// Close price
    #[serde(rename = "trade_price")]
    pub close: f64,
    /// Accumulated trade volume
    #[serde(rename = "candle_acc_trade_volume")]
    pub volume: f64,
}

impl Candle {
    /// Check if this is a bullish candle
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Check if this is a bearish candle
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Get the full range (high - low)
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Get the midpoint price
    pub fn midpoint(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// Calendar date of the candle open
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

// ============================================================================
// Series Validation
// ============================================================================

/// Check that a candle series is strictly ascending by timestamp.
///
/// Duplicate timestamps count as a violation. Runs before the pipeline so
/// downstream components can assume ordering.
pub fn validate_ascending(candles: &[Candle]) -> Result<(), BacktestError> {
    for pair in candles.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(BacktestError::InvalidParameter(format!(
                "candles must be strictly ascending by timestamp ({} follows {})",
                pair[1].timestamp, pair[0].timestamp
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
