use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::evaluation::ClassificationReport;
use super::features::{feature_names, map_ohlcv_to_features};
use super::labeler::{create_market_target, BarrierConfig, BarrierLabel};
use super::model::DirectionClassifier;
use super::persistence::{ArtifactBundle, ArtifactStore, ModelMetrics, ModelVersion};
use super::scaler::FeatureScaler;
use super::TrainingSet;
use crate::config::PipelineConfig;
use crate::exchange::PriceSource;
use crate::types::PriceSeries;

/// Features, labels and the timestamp join between them.
///
/// Rows in the indicator warm-up and in the final labeling horizon have no
/// counterpart on the other side and are dropped.
pub fn prepare_training_set(series: &PriceSeries, barrier: &BarrierConfig) -> Result<TrainingSet> {
    let features = map_ohlcv_to_features(series)?;
    let labels = create_market_target(series, barrier)?;
    info!("Label distribution: {}", labels.counts());

    let set = TrainingSet::align(&features, &labels);
    if set.is_empty() {
        return Err(anyhow!(
            "No labelled feature rows in {} candles; fetch a longer history",
            series.len()
        ));
    }

    info!(
        "Prepared {} training rows from {} candles ({} feature rows)",
        set.len(),
        series.len(),
        features.len()
    );
    Ok(set)
}

/// Output of one training run
#[derive(Debug)]
pub struct TrainedArtifacts {
    pub scaler: FeatureScaler,
    pub classifier: DirectionClassifier,
    pub metrics: ModelMetrics,
}

impl TrainedArtifacts {
    /// Saves under the next free version and returns it
    pub fn save(&self, store: &ArtifactStore) -> Result<ModelVersion> {
        let version = store.suggest_next_version()?;
        store.save_bundle(&version, &self.scaler, &self.classifier, &self.metrics)?;
        Ok(version)
    }
}

/// Fetch, label, split, scale, train and evaluate
pub struct TrainingPipeline<S: PriceSource> {
    source: S,
    config: PipelineConfig,
}

impl<S: PriceSource> TrainingPipeline<S> {
    pub fn new(source: S, config: PipelineConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<TrainedArtifacts> {
        self.config
            .validate()
            .map_err(|errors| anyhow!("Invalid configuration: {}", errors.join("; ")))?;

        let request = self.config.history_request();
        let series = self.source.fetch_history(&request).await?;
        info!("Training on {} {} candles", series.len(), request.symbol);

        let set = prepare_training_set(&series, &self.config.barrier)?;
        self.fit(&set, &request.symbol, request.interval.as_str())
    }

    /// Everything after the fetch; the scaler only sees the train partition
    pub fn fit(&self, set: &TrainingSet, symbol: &str, interval: &str) -> Result<TrainedArtifacts> {
        let (train, test) = set.split_chronological(self.config.training.train_fraction)?;
        info!("Chronological split: {} train / {} test rows", train.len(), test.len());

        let mut scaler = FeatureScaler::new();
        let train_x = scaler.fit_transform(&train.features, &self.config.training.scale_columns)?;
        let test_x = scaler.transform(&test.features)?;

        let mut classifier = DirectionClassifier::new(self.config.model.clone());
        let training = classifier.train(&train_x, &train.labels)?;
        info!(
            "Trained {} trees on {} rows, train accuracy {:.2}%",
            training.trees,
            training.samples,
            training.train_accuracy * 100.0
        );

        let predicted = classifier.predict(&test_x)?;
        let report = ClassificationReport::from_predictions(&test.labels, &predicted);
        info!("Hold-out evaluation:\n{}", report);

        let metrics = ModelMetrics {
            trained_at: Utc::now(),
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            accuracy: report.accuracy,
            precision: report.macro_precision(),
            recall: report.macro_recall(),
            f1_score: report.macro_f1(),
            train_samples: train.len(),
            test_samples: test.len(),
            train_accuracy: training.train_accuracy,
            label_counts: set.label_counts(),
            feature_names: train_x.column_names().to_vec(),
            report,
        };

        Ok(TrainedArtifacts {
            scaler,
            classifier,
            metrics,
        })
    }
}

/// One scored candle
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionPrediction {
    pub open_time: DateTime<Utc>,
    pub label: BarrierLabel,
    /// Vote share per class, in the classifier's class order
    pub probabilities: Vec<(BarrierLabel, f64)>,
}

/// A fitted scaler and classifier applied to fresh candles
#[derive(Debug)]
pub struct InferenceSession {
    scaler: FeatureScaler,
    classifier: DirectionClassifier,
}

impl InferenceSession {
    pub fn new(scaler: FeatureScaler, classifier: DirectionClassifier) -> Self {
        Self { scaler, classifier }
    }

    pub fn from_bundle(bundle: ArtifactBundle) -> Self {
        Self::new(bundle.scaler, bundle.classifier)
    }

    pub fn classifier(&self) -> &DirectionClassifier {
        &self.classifier
    }

    /// Scores the last `n` candles that have a complete feature row
    pub fn predict_latest(&self, series: &PriceSeries, n: usize) -> Result<Vec<DirectionPrediction>> {
        let features = map_ohlcv_to_features(series)?;
        if features.is_empty() {
            return Err(anyhow!(
                "{} candles are not enough to fill the indicator warm-up",
                series.len()
            ));
        }

        let latest = features.tail(n);
        let scaled = self.scaler.transform(&latest)?;
        let labels = self.classifier.predict(&scaled)?;
        let proba = self.classifier.predict_proba(&scaled)?;
        let classes = self.classifier.classes()?;
        debug!("Scoring {} rows with features {:?}", latest.len(), feature_names());

        Ok(latest
            .index()
            .iter()
            .zip(labels)
            .zip(proba.outer_iter())
            .map(|((ts, label), row)| DirectionPrediction {
                open_time: *ts,
                label,
                probabilities: classes.iter().copied().zip(row.iter().copied()).collect(),
            })
            .collect())
    }
}
