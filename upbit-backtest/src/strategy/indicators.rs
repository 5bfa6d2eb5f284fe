//! Technical indicator series.
//!
//! Every indicator is a pure function from a value (or candle) slice to a
//! same-length series of `Option<f64>`, with `None` until the lookback
//! window fills, so signal code can align indicator values with candles by
//! index without off-by-one bookkeeping.

use statrs::statistics::Statistics;

use crate::data::Candle;

// ============================================================================
// Moving Averages
// ============================================================================

/// Simple moving average over `period` values.
///
/// Defined from index `period - 1`.
pub fn sma_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let mut window_sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(window_sum / period as f64);

    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        out[i] = Some(window_sum / period as f64);
    }
    out
}

/// Exponential moving average over `period` values.
///
/// Seeded with the SMA of the first `period` values at index `period - 1`,
/// then `EMA_t = value_t * k + EMA_{t-1} * (1 - k)` with
/// `k = 2 / (period + 1)`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = values[..period].iter().mean();
    out[period - 1] = Some(ema);

    for i in period..values.len() {
        ema = values[i] * k + ema * (1.0 - k);
        out[i] = Some(ema);
    }
    out
}

// ============================================================================
// Oscillators
// ============================================================================

/// Wilder-smoothed relative strength index.
///
/// Average gain/loss are seeded with simple means over the first `period`
/// diffs, then smoothed as `avg = (avg * (period - 1) + x) / period`.
/// Defined from index `period`. When the average loss is zero the RSI is
/// reported as 100.
pub fn rsi_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let diff = values[i] - values[i - 1];
        if diff > 0.0 {
            avg_gain += diff;
        } else {
            avg_loss += -diff;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in (period + 1)..values.len() {
        let diff = values[i] - values[i - 1];
        let gain = diff.max(0.0);
        let loss = (-diff).max(0.0);
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

// ============================================================================
// Bollinger Bands
// ============================================================================

/// One Bollinger band triple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerPoint {
    /// Middle band (SMA)
    pub middle: f64,
    /// Upper band (middle + std_dev * sigma)
    pub upper: f64,
    /// Lower band (middle - std_dev * sigma)
    pub lower: f64,
}

impl BollingerPoint {
    /// Normalized position of a price within the band, clipped to [0, 1].
    ///
    /// A degenerate band (upper == lower, zero variance window) reports
    /// the midpoint 0.5.
    pub fn position(&self, price: f64) -> f64 {
        let width = self.upper - self.lower;
        if width <= 0.0 {
            return 0.5;
        }
        ((price - self.lower) / width).clamp(0.0, 1.0)
    }
}

/// Bollinger bands: SMA(`period`) plus/minus `std_dev` population
/// standard deviations. Defined from index `period - 1`.
pub fn bollinger_bands(values: &[f64], period: usize, std_dev: f64) -> Vec<Option<BollingerPoint>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let middle = window.iter().mean();
        let sigma = window.iter().population_std_dev();
        out[i] = Some(BollingerPoint {
            middle,
            upper: middle + std_dev * sigma,
            lower: middle - std_dev * sigma,
        });
    }
    out
}

// ============================================================================
// MACD
// ============================================================================

/// One MACD/signal-line pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    /// MACD line (fast EMA - slow EMA)
    pub macd: f64,
    /// Signal line (EMA of the MACD line)
    pub signal: f64,
}

/// MACD line with its signal line.
///
/// The MACD line is defined from index `slow_period - 1`; the pair is
/// defined once the signal EMA has seeded over the first `signal_period`
/// MACD values.
pub fn macd_series(
    values: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Vec<Option<MacdPoint>> {
    let mut out = vec![None; values.len()];

    let fast = ema_series(values, fast_period);
    let slow = ema_series(values, slow_period);

    // MACD is defined wherever both EMAs are; that is a contiguous tail
    // starting at slow_period - 1.
    let macd_start = match fast
        .iter()
        .zip(&slow)
        .position(|(f, s)| f.is_some() && s.is_some())
    {
        Some(idx) => idx,
        None => return out,
    };
    let macd_line: Vec<f64> = fast[macd_start..]
        .iter()
        .zip(&slow[macd_start..])
        .filter_map(|(f, s)| Some(f.as_ref()? - s.as_ref()?))
        .collect();

    let signal_line = ema_series(&macd_line, signal_period);
    for (offset, signal) in signal_line.into_iter().enumerate() {
        if let Some(signal) = signal {
            out[macd_start + offset] = Some(MacdPoint {
                macd: macd_line[offset],
                signal,
            });
        }
    }
    out
}

// ============================================================================
// Channels & Volatility
// ============================================================================

/// Highest high over the `lookback` candles preceding each index
/// (the current candle is excluded). Defined from index `lookback`.
pub fn rolling_high(candles: &[Candle], lookback: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    if lookback == 0 {
        return out;
    }
    for i in lookback..candles.len() {
        let high = candles[i - lookback..i]
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max);
        out[i] = Some(high);
    }
    out
}

/// Lowest low over the `lookback` candles preceding each index
/// (the current candle is excluded). Defined from index `lookback`.
pub fn rolling_low(candles: &[Candle], lookback: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    if lookback == 0 {
        return out;
    }
    for i in lookback..candles.len() {
        let low = candles[i - lookback..i]
            .iter()
            .map(|c| c.low)
            .fold(f64::INFINITY, f64::min);
        out[i] = Some(low);
    }
    out
}

/// Average true range as the simple mean of the trailing `period` true
/// ranges. The first true range needs a prior close, so the series is
/// defined from index `period`.
pub fn atr_series(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    if period == 0 || candles.len() <= period {
        return out;
    }

    let true_ranges: Vec<f64> = candles
        .windows(2)
        .map(|pair| {
            let prev = &pair[0];
            let curr = &pair[1];
            (curr.high - curr.low)
                .max((curr.high - prev.close).abs())
                .max((curr.low - prev.close).abs())
        })
        .collect();

    // true_ranges[j] belongs to candle j + 1
    for i in period..candles.len() {
        let window = &true_ranges[i - period..i];
        out[i] = Some(window.iter().mean());
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_candle(day: u32, high: f64, low: f64, close: f64) -> Candle {
        let timestamp = NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        Candle {
            market: "KRW-BTC".to_string(),
            timestamp,
            open: close,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_sma_alignment() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sma = sma_series(&values, 3);

        assert_eq!(sma[0], None);
        assert_eq!(sma[1], None);
        assert!((sma[2].unwrap() - 2.0).abs() < 1e-9);
        assert!((sma[3].unwrap() - 3.0).abs() < 1e-9);
        assert!((sma[4].unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_sma_short_series() {
        let values = [1.0, 2.0];
        assert!(sma_series(&values, 3).iter().all(Option::is_none));
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let values = [2.0, 4.0, 6.0, 8.0];
        let ema = ema_series(&values, 3);

        // Seed = mean(2, 4, 6) = 4; k = 0.5
        assert!((ema[2].unwrap() - 4.0).abs() < 1e-9);
        assert!((ema[3].unwrap() - (8.0 * 0.5 + 4.0 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_pure_uptrend_is_100() {
        let values: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let rsi = rsi_series(&values, 14);

        assert_eq!(rsi[13], None);
        assert!((rsi[14].unwrap() - 100.0).abs() < 1e-9);
        assert!((rsi[19].unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_pure_downtrend_is_0() {
        let values: Vec<f64> = (1..=20).rev().map(|i| i as f64).collect();
        let rsi = rsi_series(&values, 14);
        assert!(rsi[19].unwrap() < 1e-9);
    }

    #[test]
    fn test_rsi_stays_in_bounds() {
        let values: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 10.0)
            .collect();
        for rsi in rsi_series(&values, 14).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&rsi));
        }
    }

    #[test]
    fn test_bollinger_flat_series_is_degenerate() {
        let values = [50.0; 10];
        let bands = bollinger_bands(&values, 5, 2.0);

        let point = bands[9].unwrap();
        assert!((point.upper - point.lower).abs() < 1e-9);
        assert!((point.position(50.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_bollinger_position_clipped() {
        let point = BollingerPoint {
            middle: 100.0,
            upper: 110.0,
            lower: 90.0,
        };
        assert!((point.position(90.0)).abs() < 1e-9);
        assert!((point.position(110.0) - 1.0).abs() < 1e-9);
        assert!((point.position(200.0) - 1.0).abs() < 1e-9);
        assert!((point.position(0.0)).abs() < 1e-9);
        assert!((point.position(100.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_macd_defined_after_seed() {
        let values: Vec<f64> = (0..50)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0)
            .collect();
        let macd = macd_series(&values, 12, 26, 9);

        // MACD line starts at 25; signal line needs 9 MACD values
        assert!(macd[32].is_none());
        assert!(macd[33].is_some());
        assert_eq!(macd.len(), values.len());
    }

    #[test]
    fn test_macd_flat_series_is_zero() {
        let values = [77.0; 50];
        let macd = macd_series(&values, 12, 26, 9);

        let point = macd[49].unwrap();
        assert!(point.macd.abs() < 1e-9);
        assert!(point.signal.abs() < 1e-9);
    }

    #[test]
    fn test_rolling_extrema_exclude_current() {
        let candles = vec![
            make_candle(1, 10.0, 5.0, 7.0),
            make_candle(2, 12.0, 6.0, 8.0),
            make_candle(3, 99.0, 1.0, 9.0),
        ];

        let highs = rolling_high(&candles, 2);
        let lows = rolling_low(&candles, 2);

        assert_eq!(highs[1], None);
        // Candle 3's own extreme 99/1 must not leak into its channel
        assert!((highs[2].unwrap() - 12.0).abs() < 1e-9);
        assert!((lows[2].unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_atr_simple_mean_of_true_ranges() {
        let candles = vec![
            make_candle(1, 11.0, 9.0, 10.0),
            make_candle(2, 12.0, 10.0, 11.0),
            make_candle(3, 13.0, 11.0, 12.0),
            make_candle(4, 14.0, 12.0, 13.0),
        ];

        let atr = atr_series(&candles, 2);
        assert_eq!(atr[1], None);
        // TR at candle 2 and 3 are both 2.0
        assert!((atr[2].unwrap() - 2.0).abs() < 1e-9);
        assert!((atr[3].unwrap() - 2.0).abs() < 1e-9);
    }
}
