use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use super::labeler::{BarrierLabel, LabelCounts, LabelSeries};
use super::FeatureFrame;
use crate::errors::DatasetError;

/// Feature rows paired with a defined label for each row
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub features: FeatureFrame,
    pub labels: Vec<BarrierLabel>,
}

impl TrainingSet {
    /// Joins features and labels on timestamp.
    ///
    /// Keeps the feature frame's row order and drops rows whose label is
    /// missing or undefined (warm-up and the final labeling horizon).
    pub fn align(features: &FeatureFrame, labels: &LabelSeries) -> Self {
        let by_time: HashMap<DateTime<Utc>, BarrierLabel> = labels
            .iter()
            .filter_map(|(ts, label)| label.map(|l| (*ts, l)))
            .collect();

        let mut rows = Vec::with_capacity(features.len());
        let mut aligned = Vec::with_capacity(features.len());
        for (i, ts) in features.index().iter().enumerate() {
            if let Some(label) = by_time.get(ts) {
                rows.push(i);
                aligned.push(*label);
            }
        }

        debug!(
            "Aligned {} labeled rows out of {} feature rows",
            rows.len(),
            features.len()
        );

        Self {
            features: features.select_rows(&rows),
            labels: aligned,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        self.features.index()
    }

    pub fn label_counts(&self) -> LabelCounts {
        LabelCounts::tally(&self.labels.iter().map(|l| Some(*l)).collect::<Vec<_>>())
    }

    /// Splits into `(train, test)` at `floor(len * train_fraction)` without
    /// shuffling, so every training row precedes every test row.
    pub fn split_chronological(&self, train_fraction: f64) -> Result<(Self, Self), DatasetError> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(DatasetError::InvalidFraction {
                fraction: train_fraction,
            });
        }

        let len = self.len();
        let cut = (len as f64 * train_fraction).floor() as usize;
        if cut == 0 || cut == len {
            return Err(DatasetError::EmptyPartition {
                rows: len,
                fraction: train_fraction,
            });
        }

        let train = Self {
            features: self.features.slice_rows(0, cut),
            labels: self.labels[..cut].to_vec(),
        };
        let test = Self {
            features: self.features.slice_rows(cut, len),
            labels: self.labels[cut..].to_vec(),
        };
        Ok((train, test))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn frame(hours: &[i64]) -> FeatureFrame {
        FeatureFrame::new(
            hours.iter().map(|h| ts(*h)).collect(),
            vec![("x".to_string(), hours.iter().map(|h| *h as f64).collect())],
        )
        .unwrap()
    }

    #[test]
    fn test_align_inner_join() {
        // features start later (warm-up), labels end earlier (horizon)
        let features = frame(&[2, 3, 4, 5, 6]);
        let labels = LabelSeries::new(
            (0..7).map(ts).collect(),
            vec![
                Some(BarrierLabel::Upper),
                Some(BarrierLabel::Upper),
                Some(BarrierLabel::Lower),
                None,
                Some(BarrierLabel::Vertical),
                None,
                None,
            ],
        ).unwrap();

        let set = TrainingSet::align(&features, &labels);

        assert_eq!(set.index(), &[ts(2), ts(4)]);
        assert_eq!(set.labels, vec![BarrierLabel::Lower, BarrierLabel::Vertical]);
        assert_eq!(set.features.column("x").unwrap().to_vec(), vec![2.0, 4.0]);
    }

    #[test]
    fn test_split_is_chronological() {
        let features = frame(&(0..10).collect::<Vec<_>>());
        let labels = LabelSeries::new(
            (0..10).map(ts).collect(),
            (0..10)
                .map(|i| Some(if i % 2 == 0 { BarrierLabel::Upper } else { BarrierLabel::Lower }))
                .collect(),
        ).unwrap();
        let set = TrainingSet::align(&features, &labels);

        let (train, test) = set.split_chronological(0.8).unwrap();

        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);
        assert!(train.index().last().unwrap() < test.index().first().unwrap());
        assert_eq!(test.labels, vec![BarrierLabel::Upper, BarrierLabel::Lower]);
    }

    #[test]
    fn test_split_rejects_bad_fractions() {
        let features = frame(&[0, 1, 2]);
        let labels = LabelSeries::new((0..3).map(ts).collect(), vec![Some(BarrierLabel::Upper); 3]).unwrap();
        let set = TrainingSet::align(&features, &labels);

        assert!(matches!(
            set.split_chronological(1.0),
            Err(DatasetError::InvalidFraction { .. })
        ));
        assert!(matches!(
            set.split_chronological(0.0),
            Err(DatasetError::InvalidFraction { .. })
        ));
        assert!(matches!(
            set.split_chronological(0.1),
            Err(DatasetError::EmptyPartition { rows: 3, .. })
        ));
    }

    #[test]
    fn test_label_counts() {
        let features = frame(&[0, 1, 2]);
        let labels = LabelSeries::new(
            (0..3).map(ts).collect(),
            vec![Some(BarrierLabel::Upper), Some(BarrierLabel::Upper), Some(BarrierLabel::Vertical)],
        ).unwrap();
        let counts = TrainingSet::align(&features, &labels).label_counts();

        assert_eq!(counts.upper, 2);
        assert_eq!(counts.vertical, 1);
        assert_eq!(counts.undefined, 0);
        assert_eq!(counts.classes(), 2);
    }
}
