use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::labeler::{BarrierLabel, LabelCounts};
use super::FeatureFrame;
use crate::errors::ClassifierError;

type Tree = DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeight {
    /// Bootstrap keeps the observed class proportions
    Uniform,
    /// Bootstrap draws the same number of rows from every class
    Balanced,
}

/// Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
    /// Features drawn per tree; `ceil(sqrt(n_features))` when unset
    pub max_features: Option<usize>,
    pub random_state: u64,
    pub class_weight: ClassWeight,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
            max_features: None,
            random_state: 50,
            class_weight: ClassWeight::Balanced,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<(), ClassifierError> {
        fn invalid(reason: &str) -> Result<(), ClassifierError> {
            Err(ClassifierError::InvalidParameter {
                reason: reason.to_string(),
            })
        }

        if self.n_estimators == 0 {
            return invalid("n_estimators must be at least 1");
        }
        if self.max_depth == 0 {
            return invalid("max_depth must be at least 1");
        }
        if self.min_samples_split < 2 {
            return invalid("min_samples_split must be at least 2");
        }
        if self.max_features == Some(0) {
            return invalid("max_features must be at least 1");
        }
        Ok(())
    }

    fn features_per_tree(&self, n_features: usize) -> usize {
        self.max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().ceil() as usize)
            .clamp(1, n_features.max(1))
    }
}

/// Training report after model fit
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub samples: usize,
    pub features: usize,
    pub trees: usize,
    pub classes: Vec<BarrierLabel>,
    pub label_counts: LabelCounts,
    /// Accuracy of the fitted forest on its own training rows
    pub train_accuracy: f64,
}

/// One tree and the feature columns it was grown on
#[derive(Debug, Serialize, Deserialize)]
struct ForestMember {
    features: Vec<usize>,
    tree: Tree,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedForest {
    feature_names: Vec<String>,
    classes: Vec<BarrierLabel>,
    members: Vec<ForestMember>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ClassifierState {
    Untrained,
    Trained(TrainedForest),
}

/// Direction classifier over barrier labels.
///
/// Starts `Untrained`; a successful [`DirectionClassifier::train`] moves it to
/// `Trained` and there is no way back. Prediction on an untrained instance
/// fails with [`ClassifierError::NotFitted`].
#[derive(Debug, Serialize, Deserialize)]
pub struct DirectionClassifier {
    config: ForestConfig,
    state: ClassifierState,
}

impl DirectionClassifier {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            state: ClassifierState::Untrained,
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    pub fn is_trained(&self) -> bool {
        matches!(self.state, ClassifierState::Trained(_))
    }

    /// Labels seen during training, in probability column order
    pub fn classes(&self) -> Result<&[BarrierLabel], ClassifierError> {
        Ok(&self.forest()?.classes)
    }

    pub fn feature_names(&self) -> Result<&[String], ClassifierError> {
        Ok(&self.forest()?.feature_names)
    }

    fn forest(&self) -> Result<&TrainedForest, ClassifierError> {
        match &self.state {
            ClassifierState::Trained(forest) => Ok(forest),
            ClassifierState::Untrained => Err(ClassifierError::NotFitted),
        }
    }

    /// Fits the forest on every column of `features`. Training an already
    /// trained classifier replaces its forest.
    pub fn train(
        &mut self,
        features: &FeatureFrame,
        labels: &[BarrierLabel],
    ) -> Result<TrainingReport, ClassifierError> {
        self.config.validate()?;

        let n = features.len();
        if n == 0 || features.column_names().is_empty() {
            return Err(ClassifierError::EmptyTrainingSet);
        }
        if n != labels.len() {
            return Err(ClassifierError::LengthMismatch {
                features: n,
                labels: labels.len(),
            });
        }

        let mut rows_by_class: BTreeMap<BarrierLabel, Vec<usize>> = BTreeMap::new();
        for (i, label) in labels.iter().enumerate() {
            rows_by_class.entry(*label).or_default().push(i);
        }
        if rows_by_class.len() < 2 {
            return Err(ClassifierError::SingleClass {
                found: rows_by_class.len(),
            });
        }
        let classes: Vec<BarrierLabel> = rows_by_class.keys().copied().collect();

        let x = features.values();
        let n_features = x.ncols();
        let per_tree = self.config.features_per_tree(n_features);
        let per_class = (n as f64 / classes.len() as f64).ceil() as usize;

        let mut members = Vec::with_capacity(self.config.n_estimators);
        for t in 0..self.config.n_estimators {
            let seed = self.config.random_state.wrapping_add(t as u64);
            let mut rng = StdRng::seed_from_u64(seed);

            let mut columns = index::sample(&mut rng, n_features, per_tree).into_vec();
            columns.sort_unstable();

            // stratified bootstrap: every class appears in every tree
            let mut sample = Vec::with_capacity(n);
            for rows in rows_by_class.values() {
                let draws = match self.config.class_weight {
                    ClassWeight::Balanced => per_class,
                    ClassWeight::Uniform => rows.len(),
                };
                for _ in 0..draws {
                    sample.push(rows[rng.gen_range(0..rows.len())]);
                }
            }

            let sub_x = x.select(Axis(0), &sample).select(Axis(1), &columns);
            let sub_y: Vec<i32> = sample.iter().map(|&i| labels[i].as_i32()).collect();

            let params = DecisionTreeClassifierParameters {
                max_depth: Some(self.config.max_depth),
                min_samples_split: self.config.min_samples_split,
                seed: Some(seed),
                ..Default::default()
            };
            let tree = Tree::fit(&dense(&sub_x)?, &sub_y, params)
                .map_err(|e| ClassifierError::Estimator(e.to_string()))?;

            members.push(ForestMember {
                features: columns,
                tree,
            });
        }

        let forest = TrainedForest {
            feature_names: features.column_names().to_vec(),
            classes: classes.clone(),
            members,
        };

        let predicted = forest.vote(x)?;
        let correct = predicted
            .iter()
            .zip(labels)
            .filter(|(p, a)| p == a)
            .count();
        let train_accuracy = correct as f64 / n as f64;
        let label_counts = LabelCounts::tally(&labels.iter().map(|l| Some(*l)).collect::<Vec<_>>());

        info!(
            "Direction forest trained: {} samples, {} features ({} per tree), {} trees, {:.1}% train accuracy",
            n,
            n_features,
            per_tree,
            self.config.n_estimators,
            train_accuracy * 100.0
        );
        debug!("Training label distribution: {}", label_counts);

        self.state = ClassifierState::Trained(forest);

        Ok(TrainingReport {
            samples: n,
            features: n_features,
            trees: self.config.n_estimators,
            classes,
            label_counts,
            train_accuracy,
        })
    }

    /// Majority-vote label per row; ties go to the first class in `classes()`
    pub fn predict(&self, features: &FeatureFrame) -> Result<Vec<BarrierLabel>, ClassifierError> {
        let forest = self.forest()?;
        let x = forest.design_matrix(features)?;
        forest.vote(&x)
    }

    /// Vote fractions, one row per input row and one column per class
    pub fn predict_proba(&self, features: &FeatureFrame) -> Result<Array2<f64>, ClassifierError> {
        let forest = self.forest()?;
        let x = forest.design_matrix(features)?;
        let votes = forest.tally(&x)?;
        Ok(votes.mapv(|v| v / forest.members.len() as f64))
    }

    pub fn save(&self) -> Result<String, ClassifierError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn load(json: &str) -> Result<Self, ClassifierError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ClassifierError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.save()?)?;
        info!("Classifier saved to {}", path.display());
        Ok(())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ClassifierError> {
        let json = fs::read_to_string(path)?;
        Self::load(&json)
    }
}

impl TrainedForest {
    fn design_matrix(&self, frame: &FeatureFrame) -> Result<Array2<f64>, ClassifierError> {
        frame
            .select_columns(&self.feature_names)
            .map_err(|column| ClassifierError::MissingColumn { column })
    }

    /// Per-row vote counts, columns in `classes` order
    fn tally(&self, x: &Array2<f64>) -> Result<Array2<f64>, ClassifierError> {
        let mut votes = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        if x.nrows() == 0 {
            return Ok(votes);
        }

        for member in &self.members {
            let sub_x = x.select(Axis(1), &member.features);
            let predicted = member
                .tree
                .predict(&dense(&sub_x)?)
                .map_err(|e| ClassifierError::Estimator(e.to_string()))?;

            for (row, value) in predicted.iter().enumerate() {
                let class = BarrierLabel::from_i32(*value)
                    .and_then(|label| self.classes.iter().position(|c| *c == label))
                    .ok_or_else(|| {
                        ClassifierError::Estimator(format!("tree predicted unknown class {}", value))
                    })?;
                votes[[row, class]] += 1.0;
            }
        }

        Ok(votes)
    }

    fn vote(&self, x: &Array2<f64>) -> Result<Vec<BarrierLabel>, ClassifierError> {
        let votes = self.tally(x)?;
        Ok(votes
            .outer_iter()
            .map(|row| {
                let mut best = 0;
                for (j, v) in row.iter().enumerate() {
                    if *v > row[best] {
                        best = j;
                    }
                }
                self.classes[best]
            })
            .collect())
    }
}

fn dense(x: &Array2<f64>) -> Result<DenseMatrix<f64>, ClassifierError> {
    let rows: Vec<Vec<f64>> = x.outer_iter().map(|r| r.to_vec()).collect();
    DenseMatrix::from_2d_vec(&rows).map_err(|e| ClassifierError::Estimator(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn index(n: usize) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| start + Duration::hours(i as i64)).collect()
    }

    /// Three well separated clusters on both features
    fn separable() -> (FeatureFrame, Vec<BarrierLabel>) {
        let mut a = Vec::new();
        let mut b = Vec::new();
        let mut labels = Vec::new();
        for i in 0..60 {
            let jitter = (i % 5) as f64 * 0.1;
            let (centre, label) = match i % 3 {
                0 => (-5.0, BarrierLabel::Lower),
                1 => (0.0, BarrierLabel::Vertical),
                _ => (5.0, BarrierLabel::Upper),
            };
            a.push(centre + jitter);
            b.push(centre * 2.0 - jitter);
            labels.push(label);
        }
        let frame = FeatureFrame::new(
            index(60),
            vec![("a".to_string(), a), ("b".to_string(), b)],
        )
        .unwrap();
        (frame, labels)
    }

    fn small_config() -> ForestConfig {
        ForestConfig {
            n_estimators: 15,
            ..Default::default()
        }
    }

    #[test]
    fn test_predict_before_train_fails() {
        let (frame, _) = separable();
        let model = DirectionClassifier::new(small_config());

        assert!(!model.is_trained());
        assert!(matches!(model.predict(&frame), Err(ClassifierError::NotFitted)));
        assert!(matches!(model.predict_proba(&frame), Err(ClassifierError::NotFitted)));
        assert!(matches!(model.classes(), Err(ClassifierError::NotFitted)));
    }

    #[test]
    fn test_train_then_predict() {
        let (frame, labels) = separable();
        let mut model = DirectionClassifier::new(small_config());

        let report = model.train(&frame, &labels).unwrap();
        assert!(model.is_trained());
        assert_eq!(report.samples, 60);
        assert_eq!(report.trees, 15);
        assert_eq!(report.classes, BarrierLabel::ALL.to_vec());
        assert!(report.train_accuracy > 0.95);

        let predicted = model.predict(&frame).unwrap();
        assert_eq!(predicted.len(), frame.len());
        let correct = predicted.iter().zip(&labels).filter(|(p, a)| p == a).count();
        assert!(correct as f64 / labels.len() as f64 > 0.95);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (frame, labels) = separable();
        let mut model = DirectionClassifier::new(small_config());
        model.train(&frame, &labels).unwrap();

        let proba = model.predict_proba(&frame).unwrap();
        assert_eq!(proba.dim(), (60, 3));
        for row in proba.outer_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
            assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn test_predict_selects_columns_by_name() {
        let (frame, labels) = separable();
        let mut model = DirectionClassifier::new(small_config());
        model.train(&frame, &labels).unwrap();

        let reordered = FeatureFrame::new(
            frame.index().to_vec(),
            vec![
                ("extra".to_string(), vec![0.0; 60]),
                ("b".to_string(), frame.column("b").unwrap().to_vec()),
                ("a".to_string(), frame.column("a").unwrap().to_vec()),
            ],
        )
        .unwrap();
        assert_eq!(model.predict(&reordered).unwrap(), model.predict(&frame).unwrap());

        let missing = FeatureFrame::new(
            frame.index().to_vec(),
            vec![("a".to_string(), frame.column("a").unwrap().to_vec())],
        )
        .unwrap();
        assert!(matches!(
            model.predict(&missing),
            Err(ClassifierError::MissingColumn { ref column }) if column == "b"
        ));
    }

    #[test]
    fn test_training_preconditions() {
        let (frame, labels) = separable();

        let mut model = DirectionClassifier::new(small_config());
        let err = model.train(&frame, &labels[..10]).unwrap_err();
        assert!(matches!(err, ClassifierError::LengthMismatch { features: 60, labels: 10 }));

        let err = model.train(&frame, &vec![BarrierLabel::Upper; 60]).unwrap_err();
        assert!(matches!(err, ClassifierError::SingleClass { found: 1 }));

        let empty = frame.slice_rows(0, 0);
        let err = model.train(&empty, &[]).unwrap_err();
        assert!(matches!(err, ClassifierError::EmptyTrainingSet));

        assert!(!model.is_trained());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (frame, labels) = separable();
        for config in [
            ForestConfig { n_estimators: 0, ..Default::default() },
            ForestConfig { max_depth: 0, ..Default::default() },
            ForestConfig { min_samples_split: 1, ..Default::default() },
            ForestConfig { max_features: Some(0), ..Default::default() },
        ] {
            let mut model = DirectionClassifier::new(config);
            let err = model.train(&frame, &labels).unwrap_err();
            assert!(matches!(err, ClassifierError::InvalidParameter { .. }));
        }
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (frame, labels) = separable();
        let mut first = DirectionClassifier::new(small_config());
        let mut second = DirectionClassifier::new(small_config());
        first.train(&frame, &labels).unwrap();
        second.train(&frame, &labels).unwrap();

        assert_eq!(first.predict_proba(&frame).unwrap(), second.predict_proba(&frame).unwrap());
    }

    #[test]
    fn test_uniform_weight_trains() {
        let (frame, labels) = separable();
        let mut model = DirectionClassifier::new(ForestConfig {
            class_weight: ClassWeight::Uniform,
            max_features: Some(2),
            ..small_config()
        });
        model.train(&frame, &labels).unwrap();
        assert_eq!(model.predict(&frame).unwrap().len(), 60);
    }

    #[test]
    fn test_features_per_tree() {
        let config = ForestConfig::default();
        assert_eq!(config.features_per_tree(9), 3);
        assert_eq!(config.features_per_tree(10), 4);
        assert_eq!(config.features_per_tree(1), 1);

        let capped = ForestConfig { max_features: Some(50), ..Default::default() };
        assert_eq!(capped.features_per_tree(9), 9);
    }

    #[test]
    fn test_save_load_round_trip() {
        let (frame, labels) = separable();
        let mut model = DirectionClassifier::new(small_config());
        model.train(&frame, &labels).unwrap();

        let restored = DirectionClassifier::load(&model.save().unwrap()).unwrap();

        assert!(restored.is_trained());
        assert_eq!(restored.config(), model.config());
        assert_eq!(restored.classes().unwrap(), model.classes().unwrap());
        assert_eq!(restored.predict(&frame).unwrap(), model.predict(&frame).unwrap());
        assert_eq!(restored.predict_proba(&frame).unwrap(), model.predict_proba(&frame).unwrap());
        // split thresholds come back bit for bit
        assert_eq!(restored.save().unwrap(), model.save().unwrap());
    }

    #[test]
    fn test_untrained_round_trip_stays_untrained() {
        let model = DirectionClassifier::new(small_config());
        let json = model.save().unwrap();
        assert!(json.contains("\"untrained\""));

        let restored = DirectionClassifier::load(&json).unwrap();
        assert!(!restored.is_trained());
    }

    #[test]
    fn test_save_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("forest.json");
        let (frame, labels) = separable();
        let mut model = DirectionClassifier::new(small_config());
        model.train(&frame, &labels).unwrap();

        model.save_to_path(&path).unwrap();
        let restored = DirectionClassifier::load_from_path(&path).unwrap();
        assert_eq!(restored.predict(&frame).unwrap().len(), 60);
    }
}
