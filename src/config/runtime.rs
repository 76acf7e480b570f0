use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::exchange::{HistoryRequest, BINANCE_API};
use crate::ml::{BarrierConfig, ForestConfig};
use crate::types::{HistoryPeriod, TimeFrame};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataSettings,
    pub barrier: BarrierConfig,
    pub model: ForestConfig,
    pub training: TrainingSettings,
    pub artifacts: ArtifactSettings,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // Data validation
        if self.data.symbol.trim().is_empty() {
            errors.push("data.symbol must not be empty".to_string());
        }
        if !self.data.base_url.starts_with("http") {
            errors.push(format!("data.base_url must be an http(s) URL, got {:?}", self.data.base_url));
        }

        // Barrier and model validation
        if let Err(e) = self.barrier.validate() {
            errors.push(format!("barrier: {}", e));
        }
        if let Err(e) = self.model.validate() {
            errors.push(format!("model: {}", e));
        }

        // Training validation
        let f = self.training.train_fraction;
        if !(f > 0.0 && f < 1.0) {
            errors.push(format!("training.train_fraction must be in (0, 1), got {}", f));
        }
        for (i, name) in self.training.scale_columns.iter().enumerate() {
            if self.training.scale_columns[..i].contains(name) {
                errors.push(format!("training.scale_columns lists {} twice", name));
            }
        }

        if self.artifacts.models_dir.trim().is_empty() {
            errors.push("artifacts.models_dir must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// History request described by the `data` section
    pub fn history_request(&self) -> HistoryRequest {
        let request = HistoryRequest::new(self.data.symbol.clone(), self.data.interval)
            .with_period(self.data.period);
        match self.data.start_date {
            Some(date) => request.with_start_date(date),
            None => request,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub symbol: String,
    pub interval: TimeFrame,
    pub start_date: Option<NaiveDate>,
    pub period: HistoryPeriod,
    pub base_url: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            interval: TimeFrame::H1,
            start_date: None,
            period: HistoryPeriod::default(),
            base_url: BINANCE_API.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// Leading share of aligned rows used for fitting
    pub train_fraction: f64,
    /// Feature columns standardised before training; the cyclical
    /// encodings are already bounded and pass through
    pub scale_columns: Vec<String>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            scale_columns: ["log_return", "rsi", "macd", "macd_hist", "atr"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    pub models_dir: String,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            models_dir: "models".to_string(),
        }
    }
}
