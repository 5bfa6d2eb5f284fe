//! Upbit Backtest Library
//!
//! Deterministic strategy backtesting over Upbit candle data: signal
//! generation across several indicator families, all-in/all-out portfolio
//! simulation with realized/unrealized separation, and risk-adjusted
//! performance analytics.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         upbit-backtest                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  async boundary                deterministic core                │
//! │  ┌──────────────┐   candles   ┌─────────┐ ┌─────────┐ ┌───────┐  │
//! │  │ PagedFetcher │ ──────────▶ │ Signals │▶│Simulator│▶│Metrics│  │
//! │  │ (source I/O) │             └─────────┘ └─────────┘ └───────┘  │
//! │  └──────────────┘                   BacktestEngine               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The core is a pure function of its inputs: identical candles and
//! parameters always yield an identical [`BacktestResult`]. All I/O,
//! paging, and retry handling live behind the [`data::CandleDataSource`]
//! boundary; the engine itself never suspends.
//!
//! # Strategies
//!
//! - **SMA crossover**: golden/dead cross of two simple moving averages
//! - **RSI threshold**: Wilder RSI crossing out of oversold/overbought
//! - **Bollinger bands**: normalized band position crossing its thresholds
//! - **MACD signal**: MACD line crossing its signal line
//! - **Breakout**: Donchian channel breakout with an optional ATR filter
//!
//! Adding a strategy means adding one parameter variant and one generator
//! function; the simulator and analyzer never change.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod backtest;
pub mod data;
pub mod error;
pub mod strategy;
pub mod telemetry;

pub use backtest::{BacktestConfig, BacktestEngine, BacktestResult};
pub use data::{Candle, CandleDataSource, FetchPlan, Interval, PagedFetcher};
pub use error::{BacktestError, ErrorBody, Result};
pub use strategy::{generate_signals, Signal, SignalAction, StrategyParams};
pub use telemetry::{BacktestObserver, NullObserver, TracingObserver};
