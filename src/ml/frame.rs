use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::errors::FrameError;

/// Timestamp-indexed table of named `f64` columns.
///
/// Values are stored row-major in an `Array2` so a row slice is the feature
/// vector for one timestamp. Frames are never mutated in place: every
/// transform builds a new frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    index: Vec<DateTime<Utc>>,
    columns: Vec<String>,
    values: Array2<f64>,
}

impl FeatureFrame {
    pub fn new(
        index: Vec<DateTime<Utc>>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, FrameError> {
        let rows = index.len();
        let mut values = Array2::<f64>::zeros((rows, columns.len()));
        let mut names: Vec<String> = Vec::with_capacity(columns.len());

        for (j, (name, data)) in columns.into_iter().enumerate() {
            if names.contains(&name) {
                return Err(FrameError::DuplicateColumn { column: name });
            }
            if data.len() != rows {
                return Err(FrameError::LengthMismatch {
                    column: name,
                    expected: rows,
                    actual: data.len(),
                });
            }
            values.column_mut(j).assign(&Array1::from(data));
            names.push(name);
        }

        Ok(Self {
            index,
            columns: names,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.position(name).map(|j| self.values.column(j))
    }

    pub fn row(&self, i: usize) -> Option<ArrayView1<'_, f64>> {
        (i < self.len()).then(|| self.values.row(i))
    }

    /// Rows restricted to the named columns, in the order given
    pub fn select_columns(&self, names: &[String]) -> Result<Array2<f64>, String> {
        let positions = names
            .iter()
            .map(|n| self.position(n).ok_or_else(|| n.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.values.select(Axis(1), &positions))
    }

    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            index: rows.iter().map(|&i| self.index[i]).collect(),
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), rows),
        }
    }

    /// Contiguous rows `[start, end)`, clamped to the frame
    pub fn slice_rows(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.len());
        let start = start.min(end);
        let rows: Vec<usize> = (start..end).collect();
        self.select_rows(&rows)
    }

    pub fn tail(&self, n: usize) -> Self {
        let len = self.len();
        self.slice_rows(len.saturating_sub(n), len)
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.values.outer_iter().map(|r| r.to_vec()).collect()
    }

    /// Copy of this frame with column `j` rewritten by `f`
    pub(crate) fn map_column<F>(&self, j: usize, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        let mut values = self.values.clone();
        values.column_mut(j).mapv_inplace(f);
        Self {
            index: self.index.clone(),
            columns: self.columns.clone(),
            values,
        }
    }
}
