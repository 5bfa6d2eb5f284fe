//! Performance metrics over a simulation run.
//!
//! Everything here is computed from the mark-to-market equity curve and
//! the trade ledger; nothing reaches back into candles or signals.
//! Metrics that can be undefined (no elapsed days, zero return variance,
//! zero completed trades) are `Option<f64>` and serialize as the string
//! `"N/A"` rather than dividing by zero.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::data::Interval;

use super::simulator::{EquityPoint, PortfolioState, Trade};

/// How many drawdown periods a report carries, deepest first.
const MAX_DRAWDOWN_PERIODS: usize = 5;

// ============================================================================
// Sentinel Serialization
// ============================================================================

/// Serde helpers for metrics that may be undefined.
///
/// `None` serializes as the string `"N/A"`; a non-finite value (a profit
/// factor with no losers) serializes as `"Infinity"` since JSON has no
/// numeric representation for it.
mod na {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) if v.is_finite() => serializer.serialize_f64(*v),
            Some(v) if *v > 0.0 => serializer.serialize_str("Infinity"),
            Some(v) => serializer.serialize_f64(*v),
            None => serializer.serialize_str("N/A"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f64>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Some(v),
            Raw::Text(s) if s == "Infinity" => Some(f64::INFINITY),
            Raw::Text(_) => None,
        })
    }
}

// ============================================================================
// Metric Types
// ============================================================================

/// Risk and return metrics for one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Final total value over initial capital, minus one
    pub total_return: f64,
    /// Total return compounded to a 365-day year; N/A when the series
    /// spans zero days
    #[serde(with = "na")]
    pub annualized_return: Option<f64>,
    /// Annualized standard deviation of per-candle returns; N/A when
    /// fewer than two equity snapshots exist
    #[serde(with = "na")]
    pub volatility: Option<f64>,
    /// Annualized mean over standard deviation of per-candle returns;
    /// N/A when the deviation is zero
    #[serde(with = "na")]
    pub sharpe_ratio: Option<f64>,
    /// Deepest peak-to-trough decline, in [-1, 0]
    pub max_drawdown: f64,
    /// Winning round-trips over completed round-trips; N/A with zero
    /// completed trades
    #[serde(with = "na")]
    pub win_rate: Option<f64>,
    /// Gross winning profit over gross losing loss; N/A with zero
    /// completed trades, infinite with winners but no losers
    #[serde(with = "na")]
    pub profit_factor: Option<f64>,
    /// Executed trade count (entries and exits)
    pub total_trades: usize,
}

impl PerformanceMetrics {
    /// Compute metrics from a frozen portfolio state.
    pub fn from_state(initial_capital: f64, state: &PortfolioState, interval: Interval) -> Self {
        let equity = &state.equity_curve;
        let final_value = state.total_value();
        let total_return = final_value / initial_capital - 1.0;

        let annualized_return = days_elapsed(equity).and_then(|days| {
            if days == 0 {
                None
            } else {
                Some((1.0 + total_return).powf(365.0 / days as f64) - 1.0)
            }
        });

        let returns = period_returns(equity);
        let (volatility, sharpe_ratio) = if returns.is_empty() {
            (None, None)
        } else {
            let annualization = interval.periods_per_year().sqrt();
            let mean = returns.iter().mean();
            let std_dev = returns.iter().population_std_dev();
            let sharpe = if std_dev > 0.0 {
                Some(mean / std_dev * annualization)
            } else {
                None
            };
            (Some(std_dev * annualization), sharpe)
        };

        let (win_rate, profit_factor) = trade_ratios(&state.trades);

        Self {
            total_return,
            annualized_return,
            volatility,
            sharpe_ratio,
            max_drawdown: max_drawdown(equity),
            win_rate,
            profit_factor,
            total_trades: state.trades.len(),
        }
    }
}

/// Return across one calendar month of equity snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyReturn {
    /// Calendar month, "YYYY-MM"
    pub month: String,
    /// Value at the month's last snapshot over the base (the previous
    /// month's last snapshot, or the first snapshot for the first month),
    /// minus one
    pub monthly_return: f64,
}

/// One maximal contiguous interval spent below a running peak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownPeriod {
    /// Time of the peak preceding the decline
    pub peak_date: NaiveDateTime,
    /// Time of the lowest point within the period
    pub trough_date: NaiveDateTime,
    /// Time the value regained the peak; absent if never recovered
    pub recovery_date: Option<NaiveDateTime>,
    /// Deepest drawdown within the period, negative
    pub depth: f64,
}

// ============================================================================
// Computation
// ============================================================================

fn days_elapsed(equity: &[EquityPoint]) -> Option<i64> {
    let first = equity.first()?;
    let last = equity.last()?;
    Some((last.timestamp.date() - first.timestamp.date()).num_days())
}

fn period_returns(equity: &[EquityPoint]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|pair| pair[1].value / pair[0].value - 1.0)
        .collect()
}

/// Deepest decline from a running peak, in [-1, 0]. Zero for a series
/// that never dips.
pub fn max_drawdown(equity: &[EquityPoint]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;
    for point in equity {
        if point.value > peak {
            peak = point.value;
        }
        worst = worst.min(point.value / peak - 1.0);
    }
    worst
}

fn trade_ratios(trades: &[Trade]) -> (Option<f64>, Option<f64>) {
    let exits: Vec<&Trade> = trades.iter().filter(|t| t.is_exit()).collect();
    if exits.is_empty() {
        return (None, None);
    }

    let wins = exits.iter().filter(|t| t.trade_profit > 0.0).count();
    let win_rate = wins as f64 / exits.len() as f64;

    let gross_profit: f64 = exits
        .iter()
        .filter(|t| t.trade_profit > 0.0)
        .map(|t| t.trade_profit)
        .sum();
    let gross_loss: f64 = exits
        .iter()
        .filter(|t| t.trade_profit < 0.0)
        .map(|t| t.trade_profit.abs())
        .sum();

    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    (Some(win_rate), Some(profit_factor))
}

/// Group equity snapshots by calendar month and report the return across
/// each month's boundary snapshots.
pub fn monthly_returns(equity: &[EquityPoint]) -> Vec<MonthlyReturn> {
    let Some(first) = equity.first() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut month = first.timestamp.format("%Y-%m").to_string();
    let mut base = first.value;
    let mut last_value = first.value;

    for point in equity {
        let key = point.timestamp.format("%Y-%m").to_string();
        if key != month {
            out.push(MonthlyReturn {
                month: std::mem::replace(&mut month, key),
                monthly_return: last_value / base - 1.0,
            });
            base = last_value;
        }
        last_value = point.value;
    }
    out.push(MonthlyReturn {
        month,
        monthly_return: last_value / base - 1.0,
    });
    out
}

/// Extract every maximal contiguous interval spent below a running peak,
/// sorted deepest first and truncated to the report limit.
pub fn drawdown_periods(equity: &[EquityPoint]) -> Vec<DrawdownPeriod> {
    let Some(first) = equity.first() else {
        return Vec::new();
    };

    struct OpenPeriod {
        peak_date: NaiveDateTime,
        trough_date: NaiveDateTime,
        depth: f64,
    }

    let mut peak = first.value;
    let mut peak_date = first.timestamp;
    let mut open: Option<OpenPeriod> = None;
    let mut periods: Vec<DrawdownPeriod> = Vec::new();

    for point in &equity[1..] {
        if point.value >= peak {
            // Back at (or past) the peak: the open period has recovered
            if let Some(period) = open.take() {
                periods.push(DrawdownPeriod {
                    peak_date: period.peak_date,
                    trough_date: period.trough_date,
                    recovery_date: Some(point.timestamp),
                    depth: period.depth,
                });
            }
            peak = point.value;
            peak_date = point.timestamp;
        } else {
            let depth = point.value / peak - 1.0;
            match open.as_mut() {
                Some(period) => {
                    if depth < period.depth {
                        period.depth = depth;
                        period.trough_date = point.timestamp;
                    }
                }
                None => {
                    open = Some(OpenPeriod {
                        peak_date,
                        trough_date: point.timestamp,
                        depth,
                    });
                }
            }
        }
    }

    if let Some(period) = open {
        periods.push(DrawdownPeriod {
            peak_date: period.peak_date,
            trough_date: period.trough_date,
            recovery_date: None,
            depth: period.depth,
        });
    }

    periods.sort_by(|a, b| a.depth.partial_cmp(&b.depth).unwrap_or(std::cmp::Ordering::Equal));
    periods.truncate(MAX_DRAWDOWN_PERIODS);
    periods
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SignalAction;
    use chrono::NaiveDate;

    fn point(day: u32, value: f64) -> EquityPoint {
        point_ym(2024, 1, day, value)
    }

    fn point_ym(year: i32, month: u32, day: u32, value: f64) -> EquityPoint {
        EquityPoint {
            timestamp: NaiveDate::from_ymd_opt(year, month, day)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            value,
        }
    }

    fn exit_trade(profit: f64) -> Trade {
        Trade {
            timestamp: point(1, 0.0).timestamp,
            action: SignalAction::Sell,
            price: 100.0,
            quantity: 1.0,
            commission: 0.1,
            resulting_cash_balance: 100.0,
            portfolio_value: 100.0,
            trade_profit: profit,
            trade_return: profit / 100.0,
        }
    }

    fn state_from(equity: Vec<EquityPoint>, trades: Vec<Trade>) -> PortfolioState {
        let last = equity.last().map_or(1.0, |p| p.value);
        PortfolioState {
            cash_balance: last,
            position: None,
            trades,
            equity_curve: equity,
            last_close: 100.0,
        }
    }

    #[test]
    fn test_max_drawdown_bounds() {
        let equity = vec![
            point(1, 100.0),
            point(2, 120.0),
            point(3, 90.0),
            point(4, 130.0),
            point(5, 65.0),
        ];

        let dd = max_drawdown(&equity);
        assert!((-1.0..=0.0).contains(&dd));
        assert!((dd - (65.0 / 130.0 - 1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_max_drawdown_flat_is_zero() {
        let equity = vec![point(1, 100.0), point(2, 100.0), point(3, 100.0)];
        assert!(max_drawdown(&equity).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_flat_series_sentinels() {
        let equity = vec![point(1, 1000.0), point(2, 1000.0), point(3, 1000.0)];
        let metrics =
            PerformanceMetrics::from_state(1000.0, &state_from(equity, vec![]), Interval::Day);

        assert!(metrics.total_return.abs() < 1e-9);
        // Zero variance: volatility is zero, Sharpe is undefined
        assert!(metrics.volatility.unwrap().abs() < 1e-9);
        assert_eq!(metrics.sharpe_ratio, None);
        // Zero completed trades
        assert_eq!(metrics.win_rate, None);
        assert_eq!(metrics.profit_factor, None);
        assert_eq!(metrics.total_trades, 0);
    }

    #[test]
    fn test_annualized_return_needs_elapsed_days() {
        let equity = vec![point(1, 1000.0)];
        let metrics =
            PerformanceMetrics::from_state(1000.0, &state_from(equity, vec![]), Interval::Day);
        assert_eq!(metrics.annualized_return, None);

        let equity = vec![point(1, 1000.0), point_ym(2024, 12, 31, 1100.0)];
        let metrics =
            PerformanceMetrics::from_state(1000.0, &state_from(equity, vec![]), Interval::Day);
        // Exactly 365 days elapsed, so annualized equals total
        assert!((metrics.annualized_return.unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_win_rate_and_profit_factor() {
        let trades = vec![exit_trade(30.0), exit_trade(-10.0), exit_trade(20.0)];
        let equity = vec![point(1, 1000.0), point(2, 1040.0)];
        let metrics =
            PerformanceMetrics::from_state(1000.0, &state_from(equity, trades), Interval::Day);

        assert!((metrics.win_rate.unwrap() - 2.0 / 3.0).abs() < 1e-9);
        assert!((metrics.profit_factor.unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(metrics.total_trades, 3);
    }

    #[test]
    fn test_profit_factor_ladder() {
        // Winners but no losers: infinite
        let (_, pf) = trade_ratios(&[exit_trade(10.0)]);
        assert!(pf.unwrap().is_infinite());

        // Exits but neither winners nor losers: zero
        let (win_rate, pf) = trade_ratios(&[exit_trade(0.0)]);
        assert!(win_rate.unwrap().abs() < 1e-9);
        assert!(pf.unwrap().abs() < 1e-9);

        // No exits at all: undefined
        let (win_rate, pf) = trade_ratios(&[]);
        assert_eq!(win_rate, None);
        assert_eq!(pf, None);
    }

    #[test]
    fn test_monthly_returns_chain_across_boundaries() {
        let equity = vec![
            point_ym(2024, 1, 1, 1000.0),
            point_ym(2024, 1, 31, 1100.0),
            point_ym(2024, 2, 15, 1210.0),
            point_ym(2024, 2, 29, 990.0),
            point_ym(2024, 3, 31, 1089.0),
        ];

        let months = monthly_returns(&equity);
        assert_eq!(months.len(), 3);
        assert_eq!(months[0].month, "2024-01");
        assert!((months[0].monthly_return - 0.1).abs() < 1e-9);
        assert!((months[1].monthly_return - (990.0 / 1100.0 - 1.0)).abs() < 1e-9);
        assert!((months[2].monthly_return - 0.1).abs() < 1e-9);

        // Chained monthly factors reproduce the overall return
        let product: f64 = months.iter().map(|m| 1.0 + m.monthly_return).product();
        assert!((product - 1089.0 / 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_drawdown_periods_recovery_and_open() {
        let equity = vec![
            point(1, 100.0),
            point(2, 90.0),  // first drawdown
            point(3, 80.0),  // trough
            point(4, 105.0), // recovery and new peak
            point(5, 70.0),  // second drawdown, never recovers
        ];

        let periods = drawdown_periods(&equity);
        assert_eq!(periods.len(), 2);

        // Deepest first: 70/105 - 1 is deeper than 80/100 - 1
        assert!((periods[0].depth - (70.0 / 105.0 - 1.0)).abs() < 1e-9);
        assert_eq!(periods[0].recovery_date, None);
        assert_eq!(periods[0].peak_date, point(4, 0.0).timestamp);

        assert!((periods[1].depth - (80.0 / 100.0 - 1.0)).abs() < 1e-9);
        assert_eq!(periods[1].recovery_date, Some(point(4, 0.0).timestamp));
        assert_eq!(periods[1].trough_date, point(3, 0.0).timestamp);
    }

    #[test]
    fn test_drawdown_periods_capped_at_five() {
        let mut equity = Vec::new();
        for cycle in 0..8u32 {
            let day = cycle * 3 + 1;
            let base = 100.0 + cycle as f64;
            equity.push(point(day, base));
            equity.push(point(day + 1, base - 5.0 - cycle as f64));
            equity.push(point(day + 2, base + 1.0));
        }

        let periods = drawdown_periods(&equity);
        assert_eq!(periods.len(), MAX_DRAWDOWN_PERIODS);
        for pair in periods.windows(2) {
            assert!(pair[0].depth <= pair[1].depth);
        }
    }

    #[test]
    fn test_na_sentinel_serialization() {
        let equity = vec![point(1, 1000.0)];
        let metrics =
            PerformanceMetrics::from_state(1000.0, &state_from(equity, vec![]), Interval::Day);

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["annualized_return"], "N/A");
        assert_eq!(json["win_rate"], "N/A");
        assert_eq!(json["profit_factor"], "N/A");
        assert_eq!(json["total_return"], 0.0);

        let back: PerformanceMetrics = serde_json::from_value(json).unwrap();
        assert_eq!(back.win_rate, None);
        assert_eq!(back.annualized_return, None);
    }

    #[test]
    fn test_infinity_sentinel_round_trips() {
        // A single winning exit and no losers makes the profit factor
        // infinite, which JSON cannot carry as a number
        let equity = vec![point(1, 1000.0), point(2, 1010.0)];
        let metrics = PerformanceMetrics::from_state(
            1000.0,
            &state_from(equity, vec![exit_trade(10.0)]),
            Interval::Day,
        );
        assert!(metrics.profit_factor.unwrap().is_infinite());

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["profit_factor"], "Infinity");

        let back: PerformanceMetrics = serde_json::from_value(json).unwrap();
        assert!(back.profit_factor.unwrap().is_infinite());
        assert!(back.profit_factor.unwrap() > 0.0);
    }
}
