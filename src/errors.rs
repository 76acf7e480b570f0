use thiserror::Error;

/// Errors raised while fetching or cleaning price history
#[derive(Debug, Error)]
pub enum DataError {
    #[error("No price data available for {symbol} ({interval})")]
    Unavailable { symbol: String, interval: String },

    #[error("Price request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Malformed price payload: {reason}")]
    Malformed { reason: String },
}

/// Errors related to building a feature frame
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Column {column} has {actual} values, index has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate column: {column}")]
    DuplicateColumn { column: String },
}

/// Precondition violations for the triple-barrier labeler
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Invalid barrier parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("Price arrays differ in length: close={close}, high={high}, low={low}")]
    LengthMismatch { close: usize, high: usize, low: usize },

    #[error("Label column has {labels} rows, index has {index}")]
    IndexMismatch { index: usize, labels: usize },
}

#[derive(Debug, Error)]
pub enum ScalerError {
    #[error("Scaler is not fitted; call fit_transform on the training partition first")]
    NotFitted,

    #[error("Scaler is already fitted; statistics are fit exactly once")]
    AlreadyFitted,

    #[error("Column not found in frame: {column}")]
    MissingColumn { column: String },

    #[error("Column listed more than once: {column}")]
    DuplicateColumn { column: String },

    #[error("Cannot fit scaler on an empty frame")]
    EmptyFrame,

    #[error("Column {column} holds a non-finite value at row {row}")]
    NonFiniteValue { column: String, row: usize },

    #[error("Column list {actual:?} does not match saved statistics {expected:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Scaler serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Scaler file access failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Model is not trained yet; call train() before predicting")]
    NotFitted,

    #[error("Feature column not found: {column}")]
    MissingColumn { column: String },

    #[error("Training set is empty")]
    EmptyTrainingSet,

    #[error("Feature rows ({features}) and labels ({labels}) differ in length")]
    LengthMismatch { features: usize, labels: usize },

    #[error("Training labels contain {found} class(es); at least 2 are required")]
    SingleClass { found: usize },

    #[error("Invalid model configuration: {reason}")]
    InvalidParameter { reason: String },

    #[error("Estimator failure: {0}")]
    Estimator(String),

    #[error("Model serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Model file access failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Train fraction must be strictly between 0 and 1, got {fraction}")]
    InvalidFraction { fraction: f64 },

    #[error("Split of {rows} rows at {fraction} leaves an empty partition")]
    EmptyPartition { rows: usize, fraction: f64 },
}
