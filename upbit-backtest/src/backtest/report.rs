//! Backtest result assembly.
//!
//! `BacktestResult` is the single structure handed back to callers: the
//! portfolio summary, risk metrics, the full trade ledger, monthly
//! returns, the deepest drawdown periods, and the equity curve a chart
//! consumer can render without recomputing anything.

use serde::{Deserialize, Serialize};

use crate::data::Interval;

use super::metrics::{DrawdownPeriod, MonthlyReturn, PerformanceMetrics};
use super::simulator::{EquityPoint, PortfolioState, Trade};

// ============================================================================
// Portfolio Summary
// ============================================================================

/// Where the capital sits at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    /// Fully in cash
    Cash,
    /// Fully in the asset
    HoldingAsset,
    /// Both cash and asset (display only; the all-in/all-out machine
    /// never actually ends a run here)
    Mixed,
}

/// Final capital breakdown with realized/unrealized separation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub initial_capital: f64,
    pub final_cash_balance: f64,
    pub final_asset_quantity: f64,
    /// Last close price, the mark for the open position
    pub final_asset_price: f64,
    pub final_asset_value: f64,
    pub final_total_value: f64,
    /// Final total value minus initial capital
    pub absolute_profit: f64,
    pub position_status: PositionStatus,
    /// Sum of completed round-trip profits, net of commissions
    pub realized_profit: f64,
    /// Mark-to-market profit on the open position
    pub unrealized_profit: f64,
    /// Realized profit over initial capital
    pub realized_return: f64,
    /// Unrealized profit over initial capital
    pub unrealized_return: f64,
}

impl PortfolioSummary {
    /// Build the summary from a frozen portfolio state.
    pub fn from_state(initial_capital: f64, state: &PortfolioState) -> Self {
        let final_asset_quantity = state.asset_quantity();
        let final_asset_value = final_asset_quantity * state.last_close;
        let final_total_value = state.total_value();
        let realized_profit = state.realized_profit();
        let unrealized_profit = state.unrealized_profit();

        let position_status = if final_asset_quantity <= 0.0 {
            PositionStatus::Cash
        } else if state.cash_balance <= 0.0 {
            PositionStatus::HoldingAsset
        } else {
            PositionStatus::Mixed
        };

        Self {
            initial_capital,
            final_cash_balance: state.cash_balance,
            final_asset_quantity,
            final_asset_price: state.last_close,
            final_asset_value,
            final_total_value,
            absolute_profit: final_total_value - initial_capital,
            position_status,
            realized_profit,
            unrealized_profit,
            realized_return: realized_profit / initial_capital,
            unrealized_return: unrealized_profit / initial_capital,
        }
    }
}

// ============================================================================
// Result
// ============================================================================

/// Complete result of one backtest run. Created once, immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Market the run covered (e.g., "KRW-BTC")
    pub market: String,
    /// Strategy kind tag
    pub strategy: String,
    /// Candle interval of the series
    pub interval: Interval,
    pub portfolio_summary: PortfolioSummary,
    pub performance_metrics: PerformanceMetrics,
    /// Every executed trade in order
    pub trade_history: Vec<Trade>,
    pub monthly_returns: Vec<MonthlyReturn>,
    /// Deepest drawdown periods, at most five
    pub drawdown_periods: Vec<DrawdownPeriod>,
    /// Mark-to-market value at every candle, for chart consumers
    pub equity_curve: Vec<EquityPoint>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::simulator::{PortfolioSimulator, PortfolioState};
    use crate::data::Candle;
    use crate::strategy::{Signal, SignalAction};
    use chrono::NaiveDate;

    fn run_states(closes: &[f64], actions: &[SignalAction]) -> PortfolioState {
        let candles: Vec<Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let timestamp = NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
                    + chrono::Duration::days(i as i64);
                Candle {
                    market: "KRW-BTC".to_string(),
                    timestamp,
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1.0,
                }
            })
            .collect();
        let signals: Vec<Signal> = candles
            .iter()
            .zip(actions)
            .map(|(c, &action)| Signal {
                timestamp: c.timestamp,
                action,
            })
            .collect();
        PortfolioSimulator::new(0.0)
            .run(1_000_000.0, &candles, &signals)
            .unwrap()
    }

    use SignalAction::{Buy, Hold, Sell};

    #[test]
    fn test_summary_flat_run() {
        let state = run_states(&[100.0, 100.0], &[Hold, Hold]);
        let summary = PortfolioSummary::from_state(1_000_000.0, &state);

        assert_eq!(summary.position_status, PositionStatus::Cash);
        assert!((summary.final_total_value - 1_000_000.0).abs() < 1e-9);
        assert!((summary.absolute_profit).abs() < 1e-9);
        assert!((summary.final_asset_quantity).abs() < 1e-9);
    }

    #[test]
    fn test_summary_holding_run() {
        let state = run_states(&[100.0, 130.0], &[Buy, Hold]);
        let summary = PortfolioSummary::from_state(1_000_000.0, &state);

        assert_eq!(summary.position_status, PositionStatus::HoldingAsset);
        assert!((summary.final_cash_balance).abs() < 1e-9);
        assert!((summary.final_asset_price - 130.0).abs() < 1e-9);
        assert!((summary.final_asset_value - 1_300_000.0).abs() < 1e-6);
        assert!((summary.unrealized_profit - 300_000.0).abs() < 1e-6);
        assert!((summary.unrealized_return - 0.3).abs() < 1e-9);
        assert!((summary.realized_profit).abs() < 1e-9);
    }

    #[test]
    fn test_summary_closed_round_trip() {
        let state = run_states(&[100.0, 120.0, 120.0], &[Buy, Sell, Hold]);
        let summary = PortfolioSummary::from_state(1_000_000.0, &state);

        assert_eq!(summary.position_status, PositionStatus::Cash);
        assert!((summary.realized_profit - 200_000.0).abs() < 1e-6);
        assert!((summary.unrealized_profit).abs() < 1e-9);
        assert!((summary.absolute_profit - summary.realized_profit).abs() < 1e-6);
        assert!((summary.realized_return - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_position_status_wire_names() {
        assert_eq!(
            serde_json::to_value(PositionStatus::Cash).unwrap(),
            "CASH"
        );
        assert_eq!(
            serde_json::to_value(PositionStatus::HoldingAsset).unwrap(),
            "HOLDING_ASSET"
        );
        assert_eq!(
            serde_json::to_value(PositionStatus::Mixed).unwrap(),
            "MIXED"
        );
    }
}
