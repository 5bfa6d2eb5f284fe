//! Per-strategy signal generation.
//!
//! Each generator is a pure function from a candle slice to an aligned
//! action sequence. Crossings compare the current candle against the
//! immediately preceding one, and only a strict inequality change counts:
//! values meeting exactly never trigger, so a flat tie cannot oscillate
//! between BUY and SELL.

use crate::data::Candle;
use crate::error::BacktestError;

use super::indicators::{
    atr_series, bollinger_bands, macd_series, rolling_high, rolling_low, rsi_series, sma_series,
};
use super::{
    BollingerParams, BreakoutParams, MacdParams, RsiParams, Signal, SignalAction,
    SmaCrossoverParams, StrategyParams,
};

/// Generate one signal per candle for the given strategy.
///
/// The output is aligned 1:1 with `candles`; every index before the
/// strategy's lookback fills is HOLD. Fails with `InsufficientData` when
/// the series is not strictly longer than the largest required period.
pub fn generate_signals(
    candles: &[Candle],
    params: &StrategyParams,
) -> Result<Vec<Signal>, BacktestError> {
    let required = params.max_required_period();
    if candles.len() <= required {
        return Err(BacktestError::InsufficientData(format!(
            "{} needs more than {} candles, got {}",
            params.kind(),
            required,
            candles.len()
        )));
    }

    let actions = match params {
        StrategyParams::SmaCrossover(p) => sma_crossover(candles, p),
        StrategyParams::RsiOversold(p) => rsi_threshold(candles, p),
        StrategyParams::BollingerBands(p) => bollinger_position(candles, p),
        StrategyParams::MacdSignal(p) => macd_crossover(candles, p),
        StrategyParams::Breakout(p) => channel_breakout(candles, p),
    };
    debug_assert_eq!(actions.len(), candles.len());

    Ok(candles
        .iter()
        .zip(actions)
        .map(|(candle, action)| Signal {
            timestamp: candle.timestamp,
            action,
        })
        .collect())
}

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// BUY on the golden cross (fast moves from at-or-below to strictly above
/// slow), SELL on the dead cross.
fn sma_crossover(candles: &[Candle], params: &SmaCrossoverParams) -> Vec<SignalAction> {
    let closes = closes(candles);
    let fast = sma_series(&closes, params.fast_period);
    let slow = sma_series(&closes, params.slow_period);

    let mut actions = vec![SignalAction::Hold; candles.len()];
    for i in 1..candles.len() {
        let (Some(fast_prev), Some(slow_prev), Some(fast_curr), Some(slow_curr)) =
            (fast[i - 1], slow[i - 1], fast[i], slow[i])
        else {
            continue;
        };

        if fast_prev <= slow_prev && fast_curr > slow_curr {
            actions[i] = SignalAction::Buy;
        } else if fast_prev >= slow_prev && fast_curr < slow_curr {
            actions[i] = SignalAction::Sell;
        }
    }
    actions
}

/// BUY when RSI crosses up through the oversold level, SELL when it
/// crosses down through the overbought level.
fn rsi_threshold(candles: &[Candle], params: &RsiParams) -> Vec<SignalAction> {
    let closes = closes(candles);
    let rsi = rsi_series(&closes, params.rsi_period);

    let mut actions = vec![SignalAction::Hold; candles.len()];
    for i in 1..candles.len() {
        let (Some(prev), Some(curr)) = (rsi[i - 1], rsi[i]) else {
            continue;
        };

        if prev <= params.oversold_threshold && curr > params.oversold_threshold {
            actions[i] = SignalAction::Buy;
        } else if prev >= params.overbought_threshold && curr < params.overbought_threshold {
            actions[i] = SignalAction::Sell;
        }
    }
    actions
}

/// BUY when the close's normalized band position crosses below the buy
/// threshold, SELL when it crosses above the sell threshold.
fn bollinger_position(candles: &[Candle], params: &BollingerParams) -> Vec<SignalAction> {
    let closes = closes(candles);
    let bands = bollinger_bands(&closes, params.period, params.std_dev);

    let mut actions = vec![SignalAction::Hold; candles.len()];
    for i in 1..candles.len() {
        let (Some(band_prev), Some(band_curr)) = (bands[i - 1], bands[i]) else {
            continue;
        };
        let prev = band_prev.position(closes[i - 1]);
        let curr = band_curr.position(closes[i]);

        if prev >= params.buy_threshold && curr < params.buy_threshold {
            actions[i] = SignalAction::Buy;
        } else if prev <= params.sell_threshold && curr > params.sell_threshold {
            actions[i] = SignalAction::Sell;
        }
    }
    actions
}

/// BUY when the MACD line crosses above its signal line, SELL when it
/// crosses below.
fn macd_crossover(candles: &[Candle], params: &MacdParams) -> Vec<SignalAction> {
    let closes = closes(candles);
    let macd = macd_series(
        &closes,
        params.fast_period,
        params.slow_period,
        params.signal_period,
    );

    let mut actions = vec![SignalAction::Hold; candles.len()];
    for i in 1..candles.len() {
        let (Some(prev), Some(curr)) = (macd[i - 1], macd[i]) else {
            continue;
        };

        if prev.macd <= prev.signal && curr.macd > curr.signal {
            actions[i] = SignalAction::Buy;
        } else if prev.macd >= prev.signal && curr.macd < curr.signal {
            actions[i] = SignalAction::Sell;
        }
    }
    actions
}

/// Donchian-style breakout: BUY when the close clears the prior entry
/// channel high, SELL when it drops below the prior exit channel low.
///
/// With the ATR filter on, the breakout margin must also reach half an
/// ATR, which suppresses marginal pokes above the channel.
fn channel_breakout(candles: &[Candle], params: &BreakoutParams) -> Vec<SignalAction> {
    let entry_highs = rolling_high(candles, params.lookback);
    let exit_lows = rolling_low(candles, params.exit_lookback);
    let atr = atr_series(candles, params.atr_period);

    let mut actions = vec![SignalAction::Hold; candles.len()];
    for i in 0..candles.len() {
        let close = candles[i].close;

        if let Some(channel_high) = entry_highs[i] {
            if close > channel_high {
                let passes_filter = if params.atr_filter {
                    atr[i].is_some_and(|atr| close - channel_high >= 0.5 * atr)
                } else {
                    true
                };
                if passes_filter {
                    actions[i] = SignalAction::Buy;
                    continue;
                }
            }
        }

        // lookback > exit_lookback, so the exit channel is nested inside
        // the entry channel and both conditions can never hold at once
        if let Some(channel_low) = exit_lows[i] {
            if close < channel_low {
                actions[i] = SignalAction::Sell;
            }
        }
    }
    actions
}

// ============================================================================
// Tests
// ============================================================================
