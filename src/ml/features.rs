use chrono::{Datelike, Timelike};
use std::f64::consts::PI;
use tracing::debug;

use super::FeatureFrame;
use crate::errors::FrameError;
use crate::indicators::{atr_series, log_returns, macd_series, rsi_series};
use crate::types::PriceSeries;

pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// Column order of every frame produced by [`map_ohlcv_to_features`]
pub const FEATURE_NAMES: [&str; 9] = [
    "log_return",
    "rsi",
    "macd",
    "macd_hist",
    "atr",
    "hour_sin",
    "hour_cos",
    "day_sin",
    "day_cos",
];

pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Angle of `value` on a cycle of length `period`
fn cyclical(value: u32, period: u32) -> f64 {
    2.0 * PI * value as f64 / period as f64
}

/// Maps an OHLCV series to the model's input features.
///
/// Rows still inside an indicator warm-up window are dropped, so the output
/// starts at the first row where every column is defined (row 33 with the
/// default MACD periods) and keeps the timestamps of the rows it retains.
pub fn map_ohlcv_to_features(series: &PriceSeries) -> Result<FeatureFrame, FrameError> {
    let closes = series.closes();
    let highs = series.highs();
    let lows = series.lows();

    let log_return = log_returns(&closes);
    let rsi = rsi_series(&closes, RSI_PERIOD);
    let (macd, macd_hist) = macd_series(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
    let atr = atr_series(&highs, &lows, &closes, ATR_PERIOD);

    let mut index = Vec::with_capacity(series.len());
    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(series.len()); FEATURE_NAMES.len()];

    for (i, candle) in series.candles().iter().enumerate() {
        let (Some(r), Some(s), Some(m), Some(h), Some(a)) =
            (log_return[i], rsi[i], macd[i], macd_hist[i], atr[i])
        else {
            continue;
        };

        let hour = cyclical(candle.open_time.hour(), 24);
        let day = cyclical(candle.open_time.weekday().num_days_from_monday(), 7);
        let row = [r, s, m, h, a, hour.sin(), hour.cos(), day.sin(), day.cos()];

        index.push(candle.open_time);
        for (column, value) in columns.iter_mut().zip(row) {
            column.push(value);
        }
    }

    debug!(
        "Feature mapping kept {} of {} rows after warm-up",
        index.len(),
        series.len()
    );

    FeatureFrame::new(index, feature_names().into_iter().zip(columns).collect())
}
