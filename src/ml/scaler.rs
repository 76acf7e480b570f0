use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::FeatureFrame;
use crate::errors::ScalerError;

/// Columns whose population std falls below this are treated as constant
pub const ZERO_VARIANCE_EPS: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub column: String,
    pub mean: f64,
    pub std: f64,
}

impl ColumnStats {
    fn scale(&self, value: f64) -> f64 {
        if self.std < ZERO_VARIANCE_EPS {
            0.0
        } else {
            (value - self.mean) / self.std
        }
    }

    fn unscale(&self, value: f64) -> f64 {
        if self.std < ZERO_VARIANCE_EPS {
            self.mean
        } else {
            value * self.std + self.mean
        }
    }
}

/// Persisted scaler state: the fitted column list with its statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    columns: Vec<ColumnStats>,
}

/// Z-score scaler with a one-way fit.
///
/// Statistics come only from the frame handed to [`FeatureScaler::fit_transform`],
/// which is meant to be the training partition. [`FeatureScaler::transform`]
/// borrows `self` immutably and reapplies those statistics to later data,
/// so nothing seen after the fit can leak into them.
#[derive(Debug, Clone, Default)]
pub struct FeatureScaler {
    params: Option<ScalerParams>,
}

impl FeatureScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    /// Fitted column names, in fit order
    pub fn columns(&self) -> Vec<String> {
        self.params
            .as_ref()
            .map(|p| p.columns.iter().map(|s| s.column.clone()).collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> Option<&[ColumnStats]> {
        self.params.as_ref().map(|p| p.columns.as_slice())
    }

    /// Fits mean and population std on `frame` for `columns`, then scales them.
    /// Columns not listed pass through untouched.
    pub fn fit_transform(
        &mut self,
        frame: &FeatureFrame,
        columns: &[String],
    ) -> Result<FeatureFrame, ScalerError> {
        if self.params.is_some() {
            return Err(ScalerError::AlreadyFitted);
        }
        if frame.is_empty() {
            return Err(ScalerError::EmptyFrame);
        }

        let mut stats: Vec<ColumnStats> = Vec::with_capacity(columns.len());
        for name in columns {
            if stats.iter().any(|s| &s.column == name) {
                return Err(ScalerError::DuplicateColumn { column: name.clone() });
            }
            let values = frame
                .column(name)
                .ok_or_else(|| ScalerError::MissingColumn { column: name.clone() })?;
            if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                return Err(ScalerError::NonFiniteValue {
                    column: name.clone(),
                    row,
                });
            }
            let column = values.insert_axis(Axis(1));
            let mean = column.mean_axis(Axis(0)).map(|m| m[0]).ok_or(ScalerError::EmptyFrame)?;
            let std = column.std_axis(Axis(0), 0.0)[0];

            debug!("Scaler fit {}: mean={:.6} std={:.6}", name, mean, std);
            stats.push(ColumnStats {
                column: name.clone(),
                mean,
                std,
            });
        }

        let params = ScalerParams { columns: stats };
        let scaled = apply(&params, frame, ColumnStats::scale)?;

        info!("Scaler fitted on {} rows, {} columns", frame.len(), params.columns.len());
        self.params = Some(params);
        Ok(scaled)
    }

    /// Applies the fitted statistics to a new frame
    pub fn transform(&self, frame: &FeatureFrame) -> Result<FeatureFrame, ScalerError> {
        let params = self.params.as_ref().ok_or(ScalerError::NotFitted)?;
        apply(params, frame, ColumnStats::scale)
    }

    /// Maps scaled columns back to their original units
    pub fn inverse_transform(&self, frame: &FeatureFrame) -> Result<FeatureFrame, ScalerError> {
        let params = self.params.as_ref().ok_or(ScalerError::NotFitted)?;
        apply(params, frame, ColumnStats::unscale)
    }

    pub fn save(&self) -> Result<String, ScalerError> {
        let params = self.params.as_ref().ok_or(ScalerError::NotFitted)?;
        Ok(serde_json::to_string_pretty(params)?)
    }

    pub fn load(json: &str) -> Result<Self, ScalerError> {
        let params: ScalerParams = serde_json::from_str(json)?;
        Ok(Self {
            params: Some(params),
        })
    }

    /// Loads a blob and checks it was fitted on exactly `columns`, in order
    pub fn load_with_columns(json: &str, columns: &[String]) -> Result<Self, ScalerError> {
        let scaler = Self::load(json)?;
        let stored = scaler.columns();
        if stored.as_slice() != columns {
            return Err(ScalerError::ColumnMismatch {
                expected: stored,
                actual: columns.to_vec(),
            });
        }
        Ok(scaler)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ScalerError> {
        let json = self.save()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        info!("Scaler saved to {}", path.display());
        Ok(())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ScalerError> {
        let json = fs::read_to_string(path)?;
        Self::load(&json)
    }
}

fn apply(
    params: &ScalerParams,
    frame: &FeatureFrame,
    op: fn(&ColumnStats, f64) -> f64,
) -> Result<FeatureFrame, ScalerError> {
    let mut out = frame.clone();
    for stats in &params.columns {
        let j = frame
            .position(&stats.column)
            .ok_or_else(|| ScalerError::MissingColumn {
                column: stats.column.clone(),
            })?;
        out = out.map_column(j, |v| op(stats, v));
    }
    Ok(out)
}
