//! Backtest engine: validation and pipeline orchestration.
//!
//! `BacktestEngine::run` is the one entry point callers use. It validates
//! parameters before touching any component, then drives the fixed
//! pipeline (signals, simulation, analysis) and assembles the result.
//! `run_to_json` wraps any failure into the uniform `{error, message}`
//! shape so agent callers always get something to display.

use chrono::NaiveDate;
use serde_json::Value;

use crate::data::{validate_ascending, Candle, Interval};
use crate::error::{BacktestError, Result};
use crate::strategy::{generate_signals, StrategyParams};
use crate::telemetry::{BacktestObserver, NullObserver, Stage};

use super::metrics::{drawdown_periods, monthly_returns, PerformanceMetrics};
use super::report::{BacktestResult, PortfolioSummary};
use super::simulator::PortfolioSimulator;

/// Commission rates above this are almost certainly a unit mistake
/// (e.g. percent passed as a fraction).
const MAX_COMMISSION_RATE: f64 = 0.1;

// ============================================================================
// Configuration
// ============================================================================

/// Capital, commission, and date-range settings for a run.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    /// Starting cash
    pub initial_capital: f64,
    /// Flat commission rate charged on every fill
    pub commission_rate: f64,
    /// First calendar date to simulate, inclusive
    pub start_date: Option<NaiveDate>,
    /// Last calendar date to simulate, inclusive
    pub end_date: Option<NaiveDate>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 1_000_000.0,
            commission_rate: 0.0005, // Upbit KRW-market taker fee
            start_date: None,
            end_date: None,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Deterministic backtest pipeline over an already-fetched candle series.
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    /// Create an engine with the given run configuration.
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline and return the assembled result.
    ///
    /// Identical inputs always produce an identical result; the engine
    /// performs no I/O and keeps no state across runs.
    pub fn run(
        &self,
        market: &str,
        interval: Interval,
        candles: &[Candle],
        params: &StrategyParams,
        observer: &dyn BacktestObserver,
    ) -> Result<BacktestResult> {
        observer.on_stage(Stage::Validation, "validating parameters");
        let candles = self.validate(candles, params)?;

        observer.on_stage(Stage::Signals, "generating signals");
        let signals = generate_signals(candles, params)?;

        observer.on_stage(Stage::Simulation, "simulating portfolio");
        let simulator = PortfolioSimulator::new(self.config.commission_rate);
        let state = simulator.run(self.config.initial_capital, candles, &signals)?;

        observer.on_stage(Stage::Analysis, "computing metrics");
        let performance_metrics =
            PerformanceMetrics::from_state(self.config.initial_capital, &state, interval);
        let portfolio_summary = PortfolioSummary::from_state(self.config.initial_capital, &state);
        let monthly_returns = monthly_returns(&state.equity_curve);
        let drawdown_periods = drawdown_periods(&state.equity_curve);

        observer.info(&format!(
            "backtest complete: {} candles, {} trades, total return {:.4}",
            candles.len(),
            state.trades.len(),
            performance_metrics.total_return
        ));

        Ok(BacktestResult {
            market: market.to_string(),
            strategy: params.kind().to_string(),
            interval,
            portfolio_summary,
            performance_metrics,
            trade_history: state.trades,
            monthly_returns,
            drawdown_periods,
            equity_curve: state.equity_curve,
        })
    }

    /// Run the pipeline without progress reporting.
    pub fn run_silent(
        &self,
        market: &str,
        interval: Interval,
        candles: &[Candle],
        params: &StrategyParams,
    ) -> Result<BacktestResult> {
        self.run(market, interval, candles, params, &NullObserver)
    }

    /// Run the pipeline and serialize the outcome to the wire shape.
    ///
    /// A failed run becomes the `{error, message}` body instead of an
    /// error return; callers always receive a displayable value.
    pub fn run_to_json(
        &self,
        market: &str,
        interval: Interval,
        candles: &[Candle],
        params: &StrategyParams,
        observer: &dyn BacktestObserver,
    ) -> Value {
        let outcome = self
            .run(market, interval, candles, params, observer)
            .and_then(|result| {
                serde_json::to_value(&result)
                    .map_err(|e| BacktestError::Computation(format!("serialization failed: {}", e)))
            });

        match outcome {
            Ok(value) => value,
            Err(err) => {
                observer.warn(&err.to_string());
                // ErrorBody has only string fields, serialization cannot fail
                serde_json::to_value(err.body()).unwrap_or(Value::Null)
            }
        }
    }

    /// Validate the configuration and clip the series to the date range.
    ///
    /// Returns the candle sub-slice the run will cover. No downstream
    /// component is invoked when validation fails.
    fn validate<'a>(
        &self,
        candles: &'a [Candle],
        params: &StrategyParams,
    ) -> Result<&'a [Candle]> {
        params.validate()?;

        if self.config.initial_capital <= 0.0 {
            return Err(BacktestError::InvalidParameter(
                "initial_capital must be positive".to_string(),
            ));
        }
        if !(0.0..=MAX_COMMISSION_RATE).contains(&self.config.commission_rate) {
            return Err(BacktestError::InvalidParameter(format!(
                "commission_rate must lie within 0-{}",
                MAX_COMMISSION_RATE
            )));
        }
        if let (Some(start), Some(end)) = (self.config.start_date, self.config.end_date) {
            if start > end {
                return Err(BacktestError::InvalidParameter(format!(
                    "start_date {} is after end_date {}",
                    start, end
                )));
            }
        }

        validate_ascending(candles)?;

        // Clip to the inclusive date window; ordering makes the window a
        // contiguous sub-slice.
        let from = match self.config.start_date {
            Some(start) => candles.partition_point(|c| c.date() < start),
            None => 0,
        };
        let to = match self.config.end_date {
            Some(end) => candles.partition_point(|c| c.date() <= end),
            None => candles.len(),
        };
        let clipped = &candles[from..to.max(from)];

        if clipped.is_empty() {
            return Err(BacktestError::InvalidParameter(
                "no candles fall inside the requested date range".to_string(),
            ));
        }
        if clipped.len() <= params.max_required_period() {
            return Err(BacktestError::InsufficientData(format!(
                "{} candles remain after date filtering but {} needs more than {}",
                clipped.len(),
                params.kind(),
                params.max_required_period()
            )));
        }

        Ok(clipped)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SmaCrossoverParams;
    use chrono::NaiveDate;

    fn candle(index: usize, close: f64) -> Candle {
        let timestamp = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            + chrono::Duration::days(index as i64);
        Candle {
            market: "KRW-BTC".to_string(),
            timestamp,
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 1.0,
        }
    }

    fn wavy_series(len: usize) -> Vec<Candle> {
        (0..len)
            .map(|i| candle(i, 100.0 + (i as f64 * 0.35).sin() * 15.0))
            .collect()
    }

    fn sma_params() -> StrategyParams {
        StrategyParams::SmaCrossover(SmaCrossoverParams {
            fast_period: 5,
            slow_period: 15,
        })
    }

    #[test]
    fn test_rejects_non_positive_capital() {
        let engine = BacktestEngine::new(BacktestConfig {
            initial_capital: 0.0,
            ..BacktestConfig::default()
        });

        let err = engine
            .run_silent("KRW-BTC", Interval::Day, &wavy_series(60), &sma_params())
            .unwrap_err();
        assert!(matches!(err, BacktestError::InvalidParameter(_)));
    }

    #[test]
    fn test_rejects_absurd_commission() {
        let engine = BacktestEngine::new(BacktestConfig {
            commission_rate: 0.5,
            ..BacktestConfig::default()
        });

        let err = engine
            .run_silent("KRW-BTC", Interval::Day, &wavy_series(60), &sma_params())
            .unwrap_err();
        assert!(matches!(err, BacktestError::InvalidParameter(_)));
    }

    #[test]
    fn test_rejects_inverted_date_range() {
        let engine = BacktestEngine::new(BacktestConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..BacktestConfig::default()
        });

        let err = engine
            .run_silent("KRW-BTC", Interval::Day, &wavy_series(60), &sma_params())
            .unwrap_err();
        assert!(matches!(err, BacktestError::InvalidParameter(_)));
    }

    #[test]
    fn test_date_filter_leaves_too_few_candles() {
        // 60 daily candles from Jan 1; a two-week window cannot feed a
        // 15-period slow SMA
        let engine = BacktestEngine::new(BacktestConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 10),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 20),
            ..BacktestConfig::default()
        });

        let err = engine
            .run_silent("KRW-BTC", Interval::Day, &wavy_series(60), &sma_params())
            .unwrap_err();
        assert!(matches!(err, BacktestError::InsufficientData(_)));
    }

    #[test]
    fn test_empty_date_window_rejected() {
        let engine = BacktestEngine::new(BacktestConfig {
            start_date: NaiveDate::from_ymd_opt(2030, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2030, 2, 1),
            ..BacktestConfig::default()
        });

        let err = engine
            .run_silent("KRW-BTC", Interval::Day, &wavy_series(60), &sma_params())
            .unwrap_err();
        assert!(matches!(err, BacktestError::InvalidParameter(_)));
    }

    #[test]
    fn test_successful_run_assembles_result() {
        let engine = BacktestEngine::new(BacktestConfig::default());
        let candles = wavy_series(120);

        let result = engine
            .run_silent("KRW-BTC", Interval::Day, &candles, &sma_params())
            .unwrap();

        assert_eq!(result.market, "KRW-BTC");
        assert_eq!(result.strategy, "sma_crossover");
        assert_eq!(result.equity_curve.len(), candles.len());
        assert_eq!(
            result.performance_metrics.total_trades,
            result.trade_history.len()
        );
        assert!(
            (result.portfolio_summary.initial_capital - 1_000_000.0).abs() < 1e-9
        );
    }

    #[test]
    fn test_determinism() {
        let engine = BacktestEngine::new(BacktestConfig::default());
        let candles = wavy_series(120);

        let a = engine
            .run_silent("KRW-BTC", Interval::Day, &candles, &sma_params())
            .unwrap();
        let b = engine
            .run_silent("KRW-BTC", Interval::Day, &candles, &sma_params())
            .unwrap();

        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_run_to_json_wraps_errors() {
        let engine = BacktestEngine::new(BacktestConfig {
            initial_capital: -5.0,
            ..BacktestConfig::default()
        });

        let value = engine.run_to_json(
            "KRW-BTC",
            Interval::Day,
            &wavy_series(60),
            &sma_params(),
            &NullObserver,
        );

        assert_eq!(value["error"], "invalid_parameter");
        assert!(value["message"].as_str().unwrap().contains("initial_capital"));
    }

    #[test]
    fn test_run_to_json_success_shape() {
        let engine = BacktestEngine::new(BacktestConfig::default());
        let value = engine.run_to_json(
            "KRW-BTC",
            Interval::Day,
            &wavy_series(120),
            &sma_params(),
            &NullObserver,
        );

        assert!(value.get("error").is_none());
        assert!(value.get("portfolio_summary").is_some());
        assert!(value.get("performance_metrics").is_some());
        assert!(value.get("trade_history").is_some());
        assert!(value.get("monthly_returns").is_some());
        assert!(value.get("drawdown_periods").is_some());
    }
}
