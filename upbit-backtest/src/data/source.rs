//! Candle source abstraction for exchange data.
//!
//! Defines the `CandleDataSource` trait that candle suppliers implement.
//! A source only has to answer single-page requests; paging across a date
//! range, retrying, and ordering are handled by the fetcher on top of it.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::fmt;
use std::sync::Mutex;

use super::{Candle, Interval};

/// Maximum candles the exchange returns per request.
pub const MAX_CANDLES_PER_REQUEST: usize = 200;

// ============================================================================
// Source Error
// ============================================================================

/// Errors specific to candle sources.
#[derive(Debug, Clone)]
pub enum SourceError {
    /// Network error (connection failed, timeout)
    Network(String),
    /// Rate limit exceeded
    RateLimited { retry_after_secs: Option<u64> },
    /// Response could not be parsed into candles
    InvalidResponse(String),
    /// Source is temporarily unavailable
    Unavailable(String),
    /// Invalid request parameters (unknown market, bad count)
    InvalidRequest(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            Self::Unavailable(msg) => write!(f, "Source unavailable: {}", msg),
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

impl SourceError {
    /// Check if the error is recoverable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Unavailable(_)
        )
    }
}

// ============================================================================
// Candle Source Trait
// ============================================================================

/// Trait for candle suppliers.
///
/// Implementations answer one page at a time, newest first, the way the
/// exchange serves them. The fetcher walks pages backwards through time
/// and assembles the ascending series the backtest core consumes.
#[async_trait]
pub trait CandleDataSource: Send + Sync {
    /// Get the source name (e.g., "upbit", "memory")
    fn name(&self) -> &'static str;

    /// Largest page this source can serve in one call
    fn max_count_per_request(&self) -> usize {
        MAX_CANDLES_PER_REQUEST
    }

    /// Fetch one page of candles, newest first.
    ///
    /// # Arguments
    /// * `market` - Market code (e.g., "KRW-BTC")
    /// * `interval` - Candle interval
    /// * `to` - Exclusive upper bound on candle time; `None` means latest
    /// * `count` - Requested candle count (sources may clamp)
    async fn fetch_page(
        &self,
        market: &str,
        interval: Interval,
        to: Option<NaiveDateTime>,
        count: usize,
    ) -> Result<Vec<Candle>, SourceError>;
}

// ============================================================================
// In-Memory Source
// ============================================================================

/// Candle source backed by a preloaded series.
///
/// Serves pages out of an in-memory history exactly the way the exchange
/// would (newest first, clamped page size). Can be primed to fail a fixed
/// number of leading calls for retry-path tests.
pub struct InMemorySource {
    candles: Vec<Candle>,
    remaining_failures: Mutex<u32>,
    failure: Option<SourceError>,
}

impl InMemorySource {
    /// Create a source over a full candle history (any order; sorted here).
    pub fn new(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.timestamp);
        Self {
            candles,
            remaining_failures: Mutex::new(0),
            failure: None,
        }
    }

    /// Fail the first `count` page calls with the given error.
    pub fn with_failures(mut self, count: u32, failure: SourceError) -> Self {
        self.remaining_failures = Mutex::new(count);
        self.failure = Some(failure);
        self
    }

    fn take_failure(&self) -> Option<SourceError> {
        let mut remaining = self.remaining_failures.lock().unwrap_or_else(|e| e.into_inner());
        if *remaining > 0 {
            *remaining -= 1;
            self.failure.clone()
        } else {
            None
        }
    }
}

#[async_trait]
impl CandleDataSource for InMemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_page(
        &self,
        market: &str,
        _interval: Interval,
        to: Option<NaiveDateTime>,
        count: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        let count = count.min(MAX_CANDLES_PER_REQUEST);
        let mut page: Vec<Candle> = self
            .candles
            .iter()
            .filter(|c| c.market == market)
            .filter(|c| to.map_or(true, |bound| c.timestamp < bound))
            .cloned()
            .collect();

        // Newest first, like the exchange
        page.reverse();
        page.truncate(count);
        Ok(page)
    }
}

// ============================================================================
// Tests
// ============================================================================
