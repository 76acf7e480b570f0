pub mod frame;
pub mod features;
pub mod labeler;
pub mod scaler;
pub mod model;
pub mod dataset;
pub mod evaluation;
pub mod persistence;
pub mod pipeline;

pub use frame::FeatureFrame;
pub use features::{feature_names, map_ohlcv_to_features, FEATURE_NAMES};
pub use labeler::{create_market_target, label_barriers, BarrierConfig, BarrierLabel, LabelCounts, LabelSeries};
pub use scaler::FeatureScaler;
pub use model::{ClassWeight, ClassifierState, DirectionClassifier, ForestConfig, TrainingReport};
pub use dataset::TrainingSet;
pub use evaluation::ClassificationReport;
pub use persistence::{ArtifactStore, ModelMetrics, ModelVersion};
pub use pipeline::{prepare_training_set, DirectionPrediction, InferenceSession, TrainedArtifacts, TrainingPipeline};
