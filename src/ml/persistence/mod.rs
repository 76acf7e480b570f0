use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use super::evaluation::ClassificationReport;
use super::labeler::LabelCounts;
use super::model::DirectionClassifier;
use super::scaler::FeatureScaler;

/// Files written for one trained version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    Scaler,
    DirectionForest,
    Metrics,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &str {
        match self {
            ArtifactKind::Scaler => "scaler",
            ArtifactKind::DirectionForest => "direction_forest",
            ArtifactKind::Metrics => "metrics",
        }
    }

    pub fn file_extension(&self) -> &str {
        "json"
    }
}

/// Semantic version for models
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ModelVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    pub fn initial() -> Self {
        Self::new(1, 0, 0)
    }

    pub fn bump_patch(&self) -> Self {
        Self::new(self.major, self.minor, self.patch + 1)
    }

    pub fn as_string(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ModelVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(anyhow!("Invalid version format: {}", s));
        }

        Ok(Self {
            major: parts[0].parse()?,
            minor: parts[1].parse()?,
            patch: parts[2].parse()?,
        })
    }
}

impl std::fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Model metadata and hold-out metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub trained_at: DateTime<Utc>,
    pub symbol: String,
    pub interval: String,
    pub accuracy: f64,
    /// Macro averages over the classes present in the test partition
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub train_samples: usize,
    pub test_samples: usize,
    pub train_accuracy: f64,
    pub label_counts: LabelCounts,
    pub feature_names: Vec<String>,
    pub report: ClassificationReport,
}

impl ModelMetrics {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Everything needed to score new data with one trained version
#[derive(Debug)]
pub struct ArtifactBundle {
    pub version: ModelVersion,
    pub scaler: FeatureScaler,
    pub classifier: DirectionClassifier,
    pub metrics: ModelMetrics,
}

/// Versioned scaler, classifier and metrics files under one directory
pub struct ArtifactStore {
    models_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Ensure models directory exists
    pub fn ensure_models_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.models_dir)?;
        Ok(())
    }

    /// `{kind}_{version}.{ext}` inside the models directory
    pub fn artifact_path(&self, kind: ArtifactKind, version: &ModelVersion) -> PathBuf {
        let filename = format!(
            "{}_{}.{}",
            kind.as_str(),
            version.as_string(),
            kind.file_extension()
        );
        self.models_dir.join(filename)
    }

    pub fn save_bundle(
        &self,
        version: &ModelVersion,
        scaler: &FeatureScaler,
        classifier: &DirectionClassifier,
        metrics: &ModelMetrics,
    ) -> Result<()> {
        if !classifier.is_trained() {
            return Err(anyhow!("Refusing to save an untrained classifier as v{}", version));
        }
        self.ensure_models_dir()?;

        scaler.save_to_path(&self.artifact_path(ArtifactKind::Scaler, version))?;
        classifier.save_to_path(&self.artifact_path(ArtifactKind::DirectionForest, version))?;
        std::fs::write(
            self.artifact_path(ArtifactKind::Metrics, version),
            metrics.to_json()?,
        )?;

        info!(
            "Saved model bundle v{} to {}",
            version,
            self.models_dir.display()
        );
        Ok(())
    }

    pub fn load_bundle(&self, version: &ModelVersion) -> Result<ArtifactBundle> {
        let forest_path = self.artifact_path(ArtifactKind::DirectionForest, version);
        if !forest_path.exists() {
            return Err(anyhow!("Model file not found: {}", forest_path.display()));
        }

        let scaler_path = self.artifact_path(ArtifactKind::Scaler, version);
        let scaler = FeatureScaler::load_from_path(&scaler_path)
            .with_context(|| format!("Failed to load scaler {}", scaler_path.display()))?;
        let classifier = DirectionClassifier::load_from_path(&forest_path)
            .with_context(|| format!("Failed to load classifier {}", forest_path.display()))?;

        let metrics_path = self.artifact_path(ArtifactKind::Metrics, version);
        let metrics = ModelMetrics::from_json(&std::fs::read_to_string(&metrics_path)?)
            .with_context(|| format!("Failed to load metrics {}", metrics_path.display()))?;

        info!("Loaded model bundle v{} from {}", version, self.models_dir.display());

        Ok(ArtifactBundle {
            version: version.clone(),
            scaler,
            classifier,
            metrics,
        })
    }

    /// Versions with a saved classifier, oldest first
    pub fn list_versions(&self) -> Result<Vec<ModelVersion>> {
        if !self.models_dir.exists() {
            return Ok(Vec::new());
        }

        let prefix = format!("{}_", ArtifactKind::DirectionForest.as_str());
        let suffix = format!(".{}", ArtifactKind::DirectionForest.file_extension());

        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&self.models_dir)? {
            let name = entry?.file_name().to_string_lossy().to_string();
            let version = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(&suffix))
                .and_then(|v| ModelVersion::from_str(v).ok());
            if let Some(version) = version {
                versions.push(version);
            }
        }
        versions.sort();
        Ok(versions)
    }

    pub fn latest_version(&self) -> Result<Option<ModelVersion>> {
        Ok(self.list_versions()?.pop())
    }

    /// Suggest next version (defaults to patch bump)
    pub fn suggest_next_version(&self) -> Result<ModelVersion> {
        match self.latest_version()? {
            Some(latest) => Ok(latest.bump_patch()),
            None => Ok(ModelVersion::initial()),
        }
    }

    pub fn load_latest(&self) -> Result<ArtifactBundle> {
        let version = self
            .latest_version()?
            .ok_or_else(|| anyhow!("No saved model found in {}", self.models_dir.display()))?;
        self.load_bundle(&version)
    }
}
