use serde::{Deserialize, Serialize};
use std::fmt;

use super::labeler::BarrierLabel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: BarrierLabel,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Hold-out evaluation of a set of predictions.
///
/// `confusion[actual][predicted]`, both axes in `BarrierLabel::ALL` order
/// (Lower, Vertical, Upper).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub samples: usize,
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
    pub confusion: [[usize; 3]; 3],
}

fn slot(label: BarrierLabel) -> usize {
    match label {
        BarrierLabel::Lower => 0,
        BarrierLabel::Vertical => 1,
        BarrierLabel::Upper => 2,
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    /// Pairs are zipped, so a longer slice is truncated to the shorter one
    pub fn from_predictions(actual: &[BarrierLabel], predicted: &[BarrierLabel]) -> Self {
        let mut confusion = [[0usize; 3]; 3];
        for (a, p) in actual.iter().zip(predicted) {
            confusion[slot(*a)][slot(*p)] += 1;
        }

        let samples = actual.len().min(predicted.len());
        let correct: usize = (0..3).map(|i| confusion[i][i]).sum();

        let per_class = BarrierLabel::ALL
            .iter()
            .map(|&label| {
                let k = slot(label);
                let tp = confusion[k][k];
                let support: usize = confusion[k].iter().sum();
                let predicted_k: usize = (0..3).map(|i| confusion[i][k]).sum();
                let precision = ratio(tp, predicted_k);
                let recall = ratio(tp, support);
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label,
                    precision,
                    recall,
                    f1_score,
                    support,
                }
            })
            .collect();

        Self {
            samples,
            accuracy: ratio(correct, samples),
            per_class,
            confusion,
        }
    }

    pub fn class(&self, label: BarrierLabel) -> Option<&ClassMetrics> {
        self.per_class.iter().find(|m| m.label == label)
    }

    /// Unweighted mean over classes that occur in the actual labels
    fn macro_average(&self, metric: fn(&ClassMetrics) -> f64) -> f64 {
        let present: Vec<&ClassMetrics> = self.per_class.iter().filter(|m| m.support > 0).collect();
        if present.is_empty() {
            return 0.0;
        }
        present.iter().map(|m| metric(m)).sum::<f64>() / present.len() as f64
    }

    pub fn macro_f1(&self) -> f64 {
        self.macro_average(|m| m.f1_score)
    }

    pub fn macro_precision(&self) -> f64 {
        self.macro_average(|m| m.precision)
    }

    pub fn macro_recall(&self) -> f64 {
        self.macro_average(|m| m.recall)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "samples={} accuracy={:.2}%", self.samples, self.accuracy * 100.0)?;
        for m in &self.per_class {
            writeln!(
                f,
                "  {:<8} precision={:.3} recall={:.3} f1={:.3} support={}",
                m.label.to_string(),
                m.precision,
                m.recall,
                m.f1_score,
                m.support
            )?;
        }
        write!(f, "  confusion (rows=actual L/V/U): {:?}", self.confusion)
    }
}
