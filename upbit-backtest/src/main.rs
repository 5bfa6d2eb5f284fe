//! Upbit Backtest - demo run over a synthetic candle series.
//!
//! Collects candles through the paged fetcher (backed by an in-memory
//! source here; a real exchange source plugs into the same trait), runs
//! the SMA crossover strategy, and prints the result as JSON.

use anyhow::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use upbit_backtest::data::InMemorySource;
use upbit_backtest::strategy::SmaCrossoverParams;
use upbit_backtest::{
    BacktestConfig, BacktestEngine, Candle, FetchPlan, Interval, PagedFetcher, StrategyParams,
    TracingObserver,
};

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Upbit Backtest v{}", env!("CARGO_PKG_VERSION"));

    // A year of synthetic daily candles with trend and chop
    let source = Arc::new(InMemorySource::new(synthetic_history(365)));
    let fetcher = PagedFetcher::new(source);

    let plan = FetchPlan::new("KRW-BTC", Interval::Day).between(
        NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date"),
        NaiveDate::from_ymd_opt(2024, 12, 31).expect("valid date"),
    );
    let candles = fetcher.collect(&plan).await?;

    let engine = BacktestEngine::new(BacktestConfig::default());
    let params = StrategyParams::SmaCrossover(SmaCrossoverParams::default());
    let result = engine.run_to_json(
        &plan.market,
        plan.interval,
        &candles,
        &params,
        &TracingObserver,
    );

    tracing::info!(
        duration_ms = startup_start.elapsed().as_millis() as u64,
        "run complete"
    );
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

/// Daily candles from 2024-01-01: a slow uptrend with a sine swing, so
/// crossover strategies have something to trade.
fn synthetic_history(days: usize) -> Vec<Candle> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .expect("valid date")
        .and_hms_opt(9, 0, 0)
        .expect("valid time");

    (0..days)
        .map(|i| {
            let t = i as f64;
            let close = 90_000_000.0 + t * 30_000.0 + (t * 0.12).sin() * 6_000_000.0;
            Candle {
                market: "KRW-BTC".to_string(),
                timestamp: start + chrono::Duration::days(i as i64),
                open: close * 0.995,
                high: close * 1.012,
                low: close * 0.988,
                close,
                volume: 1_000.0 + (t * 0.5).cos().abs() * 500.0,
            }
        })
        .collect()
}
