//! Triple-barrier labeling.
//!
//! Every row opens a hypothetical long position at its close. The label
//! records which barrier the following `horizon` candles touch first: the
//! take-profit level above the entry, the stop-loss level below it, or
//! neither before time runs out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::LabelError;
use crate::types::PriceSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BarrierLabel {
    /// Stop-loss hit first
    Lower,
    /// Horizon elapsed without touching either barrier
    Vertical,
    /// Take-profit hit first
    Upper,
}

impl BarrierLabel {
    pub const ALL: [BarrierLabel; 3] = [BarrierLabel::Lower, BarrierLabel::Vertical, BarrierLabel::Upper];

    pub fn as_i32(&self) -> i32 {
        match self {
            BarrierLabel::Lower => -1,
            BarrierLabel::Vertical => 0,
            BarrierLabel::Upper => 1,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            -1 => Some(BarrierLabel::Lower),
            0 => Some(BarrierLabel::Vertical),
            1 => Some(BarrierLabel::Upper),
            _ => None,
        }
    }
}

impl fmt::Display for BarrierLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarrierLabel::Lower => write!(f, "LOWER"),
            BarrierLabel::Vertical => write!(f, "VERTICAL"),
            BarrierLabel::Upper => write!(f, "UPPER"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarrierConfig {
    /// Fractional distance of the upper barrier, 0.015 = 1.5%
    pub take_profit_pct: f64,
    /// Fractional distance of the lower barrier, must stay below 1
    pub stop_loss_pct: f64,
    /// Forward candles scanned before the vertical barrier
    pub horizon: usize,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            take_profit_pct: 0.015,
            stop_loss_pct: 0.01,
            horizon: 5,
        }
    }
}

impl BarrierConfig {
    pub fn validate(&self) -> Result<(), LabelError> {
        if !(self.take_profit_pct.is_finite() && self.take_profit_pct > 0.0) {
            return Err(LabelError::InvalidParameter {
                reason: format!("take_profit_pct must be > 0, got {}", self.take_profit_pct),
            });
        }
        if !(self.stop_loss_pct > 0.0 && self.stop_loss_pct < 1.0) {
            return Err(LabelError::InvalidParameter {
                reason: format!("stop_loss_pct must be in (0, 1), got {}", self.stop_loss_pct),
            });
        }
        if self.horizon == 0 {
            return Err(LabelError::InvalidParameter {
                reason: "horizon must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Per-class tally of a label column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub upper: usize,
    pub lower: usize,
    pub vertical: usize,
    pub undefined: usize,
}

impl LabelCounts {
    pub fn tally<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a Option<BarrierLabel>>,
    {
        let mut counts = Self::default();
        for label in labels {
            match label {
                Some(BarrierLabel::Upper) => counts.upper += 1,
                Some(BarrierLabel::Lower) => counts.lower += 1,
                Some(BarrierLabel::Vertical) => counts.vertical += 1,
                None => counts.undefined += 1,
            }
        }
        counts
    }

    pub fn defined(&self) -> usize {
        self.upper + self.lower + self.vertical
    }

    /// Number of distinct classes present
    pub fn classes(&self) -> usize {
        [self.upper, self.lower, self.vertical]
            .iter()
            .filter(|c| **c > 0)
            .count()
    }
}

impl fmt::Display for LabelCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "upper={} lower={} vertical={} undefined={}",
            self.upper, self.lower, self.vertical, self.undefined
        )
    }
}

/// Label column aligned row-for-row with the price series it came from
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSeries {
    index: Vec<DateTime<Utc>>,
    labels: Vec<Option<BarrierLabel>>,
}

impl LabelSeries {
    pub fn new(index: Vec<DateTime<Utc>>, labels: Vec<Option<BarrierLabel>>) -> Result<Self, LabelError> {
        if index.len() != labels.len() {
            return Err(LabelError::IndexMismatch {
                index: index.len(),
                labels: labels.len(),
            });
        }
        Ok(Self { index, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn labels(&self) -> &[Option<BarrierLabel>] {
        &self.labels
    }

    pub fn get(&self, i: usize) -> Option<BarrierLabel> {
        self.labels.get(i).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DateTime<Utc>, &Option<BarrierLabel>)> {
        self.index.iter().zip(self.labels.iter())
    }

    pub fn counts(&self) -> LabelCounts {
        LabelCounts::tally(&self.labels)
    }
}

/// Labels raw price arrays.
///
/// The upper barrier is checked before the lower one inside each forward
/// step, so a candle whose range spans both barriers resolves to `Upper`.
/// The last `horizon` rows never get a label, even when a barrier would
/// already be hit inside the shorter window.
pub fn label_barriers(
    close: &[f64],
    high: &[f64],
    low: &[f64],
    config: &BarrierConfig,
) -> Result<Vec<Option<BarrierLabel>>, LabelError> {
    config.validate()?;
    if close.len() != high.len() || close.len() != low.len() {
        return Err(LabelError::LengthMismatch {
            close: close.len(),
            high: high.len(),
            low: low.len(),
        });
    }

    let len = close.len();
    let horizon = config.horizon;
    let mut labels = vec![None; len];
    if len <= horizon {
        return Ok(labels);
    }

    for i in 0..len - horizon {
        let entry = close[i];
        let upper = entry * (1.0 + config.take_profit_pct);
        let lower = entry * (1.0 - config.stop_loss_pct);

        let mut outcome = BarrierLabel::Vertical;
        for j in 1..=horizon {
            if high[i + j] >= upper {
                outcome = BarrierLabel::Upper;
                break;
            }
            if low[i + j] <= lower {
                outcome = BarrierLabel::Lower;
                break;
            }
        }
        labels[i] = Some(outcome);
    }

    Ok(labels)
}

/// Labels a whole price series, keyed by its timestamps
pub fn create_market_target(
    series: &PriceSeries,
    config: &BarrierConfig,
) -> Result<LabelSeries, LabelError> {
    let labels = label_barriers(&series.closes(), &series.highs(), &series.lows(), config)?;
    LabelSeries::new(series.timestamps(), labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candle;
    use chrono::{Duration, TimeZone};

    fn flat_series() -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..10)
            .map(|i| Candle {
                open_time: start + Duration::hours(i),
                open: 100.0,
                high: 100.0,
                low: 100.0,
                close: 100.0,
                volume: 1.0,
            })
            .collect()
    }

    fn config(horizon: usize) -> BarrierConfig {
        BarrierConfig {
            take_profit_pct: 0.015,
            stop_loss_pct: 0.01,
            horizon,
        }
    }

    #[test]
    fn test_take_profit_labels_upper() {
        let mut candles = flat_series();
        candles[1].high = 102.0;

        let target = create_market_target(&PriceSeries::from_candles(candles), &config(3)).unwrap();
        assert_eq!(target.get(0), Some(BarrierLabel::Upper));
        assert!(target.labels()[7..].iter().all(Option::is_none));
    }

    #[test]
    fn test_stop_loss_labels_lower() {
        let mut candles = flat_series();
        candles[1].low = 98.0;

        let target = create_market_target(&PriceSeries::from_candles(candles), &config(3)).unwrap();
        assert_eq!(target.get(0), Some(BarrierLabel::Lower));
        assert!(target.labels()[7..].iter().all(Option::is_none));
    }

    #[test]
    fn test_label_series_rejects_misaligned_index() {
        let index: Vec<_> = flat_series().iter().map(|c| c.open_time).collect();

        let err = LabelSeries::new(index.clone(), vec![Some(BarrierLabel::Upper); 9]).unwrap_err();
        assert!(matches!(err, LabelError::IndexMismatch { index: 10, labels: 9 }));
        assert_eq!(LabelSeries::new(index, vec![None; 10]).unwrap().len(), 10);
    }

    #[test]
    fn test_no_barrier_labels_vertical() {
        let target = create_market_target(&PriceSeries::from_candles(flat_series()), &config(3)).unwrap();
        assert_eq!(target.get(0), Some(BarrierLabel::Vertical));
    }

    #[test]
    fn test_last_horizon_rows_undefined() {
        let target = create_market_target(&PriceSeries::from_candles(flat_series()), &config(3)).unwrap();

        assert_eq!(target.len(), 10);
        assert!(target.labels()[7..].iter().all(Option::is_none));
        assert!(target.labels()[6].is_some());
        assert_eq!(target.counts().undefined, 3);
    }

    #[test]
    fn test_same_step_tie_prefers_upper() {
        let mut candles = flat_series();
        candles[1].high = 110.0;
        candles[1].low = 90.0;

        let target = create_market_target(&PriceSeries::from_candles(candles), &config(3)).unwrap();
        assert_eq!(target.get(0), Some(BarrierLabel::Upper));
        assert!(target.labels()[7..].iter().all(Option::is_none));
    }

    #[test]
    fn test_earlier_lower_beats_later_upper() {
        let close = vec![100.0; 6];
        let mut high = vec![100.0; 6];
        let mut low = vec![100.0; 6];
        low[1] = 98.0;
        high[2] = 105.0;

        let labels = label_barriers(&close, &high, &low, &config(3)).unwrap();
        assert_eq!(labels[0], Some(BarrierLabel::Lower));
    }

    #[test]
    fn test_barrier_touch_is_inclusive() {
        let close = vec![100.0; 4];
        let mut high = vec![100.0; 4];
        high[1] = 100.0 * (1.0 + 0.015);

        let labels = label_barriers(&close, &high, &close, &config(1)).unwrap();
        assert_eq!(labels[0], Some(BarrierLabel::Upper));
    }

    #[test]
    fn test_hit_inside_tail_still_undefined() {
        let close = vec![100.0; 5];
        let mut high = vec![100.0; 5];
        high[4] = 120.0;

        let labels = label_barriers(&close, &high, &close, &config(2)).unwrap();
        // row 3 would see the spike at row 4 but sits in the final window
        assert_eq!(labels[3], None);
        assert_eq!(labels[2], Some(BarrierLabel::Upper));
    }

    #[test]
    fn test_short_input_is_all_undefined() {
        let close = vec![100.0; 3];
        let labels = label_barriers(&close, &close, &close, &config(3)).unwrap();
        assert_eq!(labels, vec![None, None, None]);

        let empty = label_barriers(&[], &[], &[], &config(3)).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let close = vec![100.0; 10];
        let bad = [
            BarrierConfig { take_profit_pct: 0.0, ..config(3) },
            BarrierConfig { stop_loss_pct: 0.0, ..config(3) },
            BarrierConfig { stop_loss_pct: 1.0, ..config(3) },
            BarrierConfig { horizon: 0, ..config(3) },
        ];

        for cfg in bad {
            let err = label_barriers(&close, &close, &close, &cfg).unwrap_err();
            assert!(matches!(err, LabelError::InvalidParameter { .. }));
        }
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = label_barriers(&[1.0, 2.0], &[1.0], &[1.0, 2.0], &config(1)).unwrap_err();
        assert!(matches!(err, LabelError::LengthMismatch { close: 2, high: 1, low: 2 }));
    }

    #[test]
    fn test_label_integer_mapping() {
        for label in BarrierLabel::ALL {
            assert_eq!(BarrierLabel::from_i32(label.as_i32()), Some(label));
        }
        assert_eq!(BarrierLabel::from_i32(7), None);
    }
}
