//! Portfolio simulation over a candle/signal pair sequence.
//!
//! The simulator is an all-in/all-out single-position state machine: a BUY
//! converts the entire cash balance into the asset, a SELL converts the
//! entire position back to cash, and redundant signals (BUY while holding,
//! SELL while flat) are ignored. Fills happen at the candle close, reduced
//! by a flat commission rate on both sides.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::data::Candle;
use crate::error::BacktestError;
use crate::strategy::{Signal, SignalAction};

// ============================================================================
// Ledger Types
// ============================================================================

/// One executed trade, recorded at execution and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Execution time (the candle the signal fired on)
    pub timestamp: NaiveDateTime,
    /// BUY or SELL
    pub action: SignalAction,
    /// Fill price (candle close)
    pub price: f64,
    /// Quantity bought or sold
    pub quantity: f64,
    /// Commission paid on this fill
    pub commission: f64,
    /// Cash balance immediately after the fill
    pub resulting_cash_balance: f64,
    /// Mark-to-market portfolio value immediately after the fill
    pub portfolio_value: f64,
    /// Realized profit of the round-trip this SELL completes, net of both
    /// commissions; zero for entries
    pub trade_profit: f64,
    /// Realized profit as a fraction of the position's cost basis;
    /// zero for entries
    pub trade_return: f64,
}

impl Trade {
    /// Check if this is a completed round-trip (a SELL record).
    pub fn is_exit(&self) -> bool {
        self.action == SignalAction::Sell
    }

    /// Check if this exit was profitable.
    pub fn is_winner(&self) -> bool {
        self.is_exit() && self.trade_profit > 0.0
    }
}

/// An open position. At most one exists per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Asset quantity held
    pub quantity: f64,
    /// Fill price of the entry
    pub average_cost: f64,
    /// Commission paid on the entry, netted into the exit's trade_profit
    entry_commission: f64,
}

impl Position {
    /// Mark-to-market value at the given price.
    pub fn value_at(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Unrealized profit at the given price (cost basis only; the entry
    /// commission is realized on exit).
    pub fn unrealized_profit_at(&self, price: f64) -> f64 {
        self.quantity * (price - self.average_cost)
    }
}

/// One mark-to-market snapshot. Taken at every candle close.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EquityPoint {
    /// Snapshot time
    pub timestamp: NaiveDateTime,
    /// Cash plus position value at the candle close
    pub value: f64,
}

/// Final state of a simulation run, frozen at the last candle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    /// Remaining cash
    pub cash_balance: f64,
    /// Open position, if the run ended while holding
    pub position: Option<Position>,
    /// Every executed trade in order
    pub trades: Vec<Trade>,
    /// Mark-to-market value at every candle
    pub equity_curve: Vec<EquityPoint>,
    /// Close price of the last candle
    pub last_close: f64,
}

impl PortfolioState {
    /// Cash plus position value at the last close.
    pub fn total_value(&self) -> f64 {
        self.cash_balance
            + self
                .position
                .as_ref()
                .map_or(0.0, |p| p.value_at(self.last_close))
    }

    /// Quantity of the open position, zero when flat.
    pub fn asset_quantity(&self) -> f64 {
        self.position.as_ref().map_or(0.0, |p| p.quantity)
    }

    /// Sum of realized profit over completed round-trips.
    pub fn realized_profit(&self) -> f64 {
        self.trades.iter().map(|t| t.trade_profit).sum()
    }

    /// Mark-to-market profit on the open position, zero when flat.
    pub fn unrealized_profit(&self) -> f64 {
        self.position
            .as_ref()
            .map_or(0.0, |p| p.unrealized_profit_at(self.last_close))
    }
}

// ============================================================================
// Simulator
// ============================================================================

/// Single-position portfolio simulator.
pub struct PortfolioSimulator {
    commission_rate: f64,
}

impl PortfolioSimulator {
    /// Create a simulator charging the given flat commission rate per fill.
    pub fn new(commission_rate: f64) -> Self {
        Self { commission_rate }
    }

    /// Replay the signal sequence against the candle series.
    ///
    /// Signals must be aligned 1:1 with candles; every candle must carry a
    /// positive price. The returned state is frozen at the last candle.
    pub fn run(
        &self,
        initial_capital: f64,
        candles: &[Candle],
        signals: &[Signal],
    ) -> Result<PortfolioState, BacktestError> {
        if candles.len() != signals.len() {
            return Err(BacktestError::Computation(format!(
                "signal sequence length {} does not match candle count {}",
                signals.len(),
                candles.len()
            )));
        }
        if candles.is_empty() {
            return Err(BacktestError::Computation(
                "cannot simulate over an empty candle series".to_string(),
            ));
        }

        let mut cash = initial_capital;
        let mut position: Option<Position> = None;
        let mut trades: Vec<Trade> = Vec::new();
        let mut equity_curve: Vec<EquityPoint> = Vec::with_capacity(candles.len());

        for (candle, signal) in candles.iter().zip(signals) {
            let price = candle.close;
            if price <= 0.0 || candle.open <= 0.0 || candle.high <= 0.0 || candle.low <= 0.0 {
                return Err(BacktestError::Computation(format!(
                    "non-positive price in candle at {}",
                    candle.timestamp
                )));
            }

            match signal.action {
                SignalAction::Buy if position.is_none() && cash > 0.0 => {
                    let commission = cash * self.commission_rate;
                    let quantity = (cash - commission) / price;
                    position = Some(Position {
                        quantity,
                        average_cost: price,
                        entry_commission: commission,
                    });
                    cash = 0.0;

                    trades.push(Trade {
                        timestamp: candle.timestamp,
                        action: SignalAction::Buy,
                        price,
                        quantity,
                        commission,
                        resulting_cash_balance: cash,
                        portfolio_value: quantity * price,
                        trade_profit: 0.0,
                        trade_return: 0.0,
                    });
                }
                SignalAction::Sell => {
                    if let Some(pos) = position.take() {
                        let gross = pos.quantity * price;
                        let commission = gross * self.commission_rate;
                        let proceeds = gross - commission;
                        let cost_basis = pos.quantity * pos.average_cost;
                        let trade_profit = proceeds - cost_basis - pos.entry_commission;
                        let trade_return = if cost_basis > 0.0 {
                            trade_profit / cost_basis
                        } else {
                            0.0
                        };
                        cash = proceeds;

                        trades.push(Trade {
                            timestamp: candle.timestamp,
                            action: SignalAction::Sell,
                            price,
                            quantity: pos.quantity,
                            commission,
                            resulting_cash_balance: cash,
                            portfolio_value: cash,
                            trade_profit,
                            trade_return,
                        });
                    }
                    // SELL while flat is ignored
                }
                // BUY while holding is ignored; HOLD changes nothing
                _ => {}
            }

            let value = cash + position.as_ref().map_or(0.0, |p| p.value_at(price));
            equity_curve.push(EquityPoint {
                timestamp: candle.timestamp,
                value,
            });
        }

        let last_close = candles[candles.len() - 1].close;
        tracing::debug!(
            trades = trades.len(),
            final_cash = cash,
            holding = position.is_some(),
            "simulation complete"
        );

        Ok(PortfolioState {
            cash_balance: cash,
            position,
            trades,
            equity_curve,
            last_close,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
