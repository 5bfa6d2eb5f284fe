//! Paged candle collection over a candle source.
//!
//! The exchange serves at most 200 candles per request, newest first. The
//! fetcher walks pages backwards from the end of the requested range,
//! retries recoverable failures with exponential backoff, clips at the
//! start date, and hands back the ascending series the backtest core
//! consumes. All waiting happens here; the core never sleeps.

use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;

use super::source::CandleDataSource;
use super::{Candle, Interval};
use crate::error::BacktestError;

// ============================================================================
// Configuration
// ============================================================================

/// Paging behavior for a collection run.
#[derive(Debug, Clone)]
pub struct PagingConfig {
    /// Candles requested per page
    pub page_size: usize,
    /// Hard cap on page requests per collection (guards runaway ranges)
    pub max_pages: u32,
    /// Attempts per page before a recoverable failure becomes fatal
    pub max_retries: u32,
    /// Base backoff, doubled per retry attempt
    pub retry_base: Duration,
    /// Delay between successive page requests
    pub page_delay: Duration,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: 200,
            max_pages: 50,
            max_retries: 3,
            retry_base: Duration::from_secs(1),
            page_delay: Duration::from_millis(200),
        }
    }
}

/// What to collect: market, interval, and an optional date window.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    /// Market code (e.g., "KRW-BTC")
    pub market: String,
    /// Candle interval
    pub interval: Interval,
    /// First calendar date to include, inclusive
    pub start: Option<NaiveDate>,
    /// Last calendar date to include, inclusive; `None` means latest
    pub end: Option<NaiveDate>,
}

impl FetchPlan {
    /// Plan covering the most recent data for a market.
    pub fn new(market: impl Into<String>, interval: Interval) -> Self {
        Self {
            market: market.into(),
            interval,
            start: None,
            end: None,
        }
    }

    /// Restrict the plan to an inclusive date window.
    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }
}

// ============================================================================
// Paged Fetcher
// ============================================================================

/// Collects a complete candle series from a page-oriented source.
pub struct PagedFetcher {
    source: Arc<dyn CandleDataSource>,
    config: PagingConfig,
}

impl PagedFetcher {
    /// Create a fetcher with default paging behavior.
    pub fn new(source: Arc<dyn CandleDataSource>) -> Self {
        Self::with_config(source, PagingConfig::default())
    }

    /// Create a fetcher with explicit paging behavior.
    pub fn with_config(source: Arc<dyn CandleDataSource>, config: PagingConfig) -> Self {
        Self { source, config }
    }

    /// Collect every candle the plan covers, ascending by timestamp.
    ///
    /// Fails with `DataSource` when the source stays unreachable past the
    /// retry budget, when the range needs more pages than allowed, or when
    /// nothing falls inside the window.
    pub async fn collect(&self, plan: &FetchPlan) -> Result<Vec<Candle>, BacktestError> {
        let page_size = self.config.page_size.min(self.source.max_count_per_request());

        // Exclusive upper cursor just past the end date, so every candle
        // on the end date itself is included.
        let mut cursor: Option<NaiveDateTime> = plan
            .end
            .and_then(|d| d.succ_opt())
            .and_then(|d| d.and_hms_opt(0, 0, 0));

        let mut collected: Vec<Candle> = Vec::new();
        let mut pages = 0u32;

        loop {
            pages += 1;
            if pages > self.config.max_pages {
                return Err(BacktestError::DataSource(format!(
                    "range requires more than {} page requests, narrow the date range",
                    self.config.max_pages
                )));
            }

            let page = self.fetch_page_with_retry(plan, cursor, page_size).await?;
            if page.is_empty() {
                tracing::debug!(market = %plan.market, pages, "source exhausted");
                break;
            }

            // Pages arrive newest first; stop as soon as a candle falls
            // before the start date.
            let page_len = page.len();
            let mut reached_start = false;
            for candle in page.iter() {
                if plan.start.is_some_and(|start| candle.date() < start) {
                    reached_start = true;
                    break;
                }
                collected.push(candle.clone());
            }

            if reached_start {
                tracing::debug!(market = %plan.market, pages, "reached start of range");
                break;
            }
            if page_len < page_size {
                break;
            }

            let oldest = match page.last() {
                Some(candle) => candle.timestamp,
                None => break,
            };
            // A stuck cursor would page the same window forever
            if cursor == Some(oldest) {
                tracing::warn!(market = %plan.market, cursor = %oldest, "cursor did not advance, stopping");
                break;
            }
            cursor = Some(oldest);

            tokio::time::sleep(self.config.page_delay).await;
        }

        if collected.is_empty() {
            return Err(BacktestError::DataSource(
                "no candle data in the requested range".to_string(),
            ));
        }

        collected.sort_by_key(|c| c.timestamp);
        collected.dedup_by_key(|c| c.timestamp);

        tracing::info!(
            market = %plan.market,
            interval = %plan.interval,
            candles = collected.len(),
            pages,
            "candle collection complete"
        );
        Ok(collected)
    }

    async fn fetch_page_with_retry(
        &self,
        plan: &FetchPlan,
        to: Option<NaiveDateTime>,
        count: usize,
    ) -> Result<Vec<Candle>, BacktestError> {
        let mut attempt = 0u32;
        loop {
            match self
                .source
                .fetch_page(&plan.market, plan.interval, to, count)
                .await
            {
                Ok(page) => return Ok(page),
                Err(err) if err.is_recoverable() && attempt + 1 < self.config.max_retries => {
                    let backoff = self.config.retry_base * (1u32 << attempt);
                    tracing::warn!(
                        market = %plan.market,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "page fetch failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(BacktestError::DataSource(format!(
                        "{} (source {}, attempt {})",
                        err,
                        self.source.name(),
                        attempt + 1
                    )));
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
