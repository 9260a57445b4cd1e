//! Request-path errors.
//!
//! Startup and loading code uses `anyhow`; everything a prediction request can
//! hit is one of these variants so the HTTP layer can map it to a status.

#[derive(Debug, Clone, PartialEq)]
pub enum PredictError {
    /// Bundle failed to load at startup; nothing can be served until restart.
    ModelUnavailable,
    /// Upload could not be parsed as tabular text.
    MalformedInput(String),
    /// Columns the classifier needs are absent from the input.
    SchemaMismatch(String),
    /// Classifier or formatter failed on well-formed input.
    Inference(String),
}

impl PredictError {
    /// Short label used for the `kind` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::ModelUnavailable => "model_unavailable",
            PredictError::MalformedInput(_) => "malformed_input",
            PredictError::SchemaMismatch(_) => "schema_mismatch",
            PredictError::Inference(_) => "inference",
        }
    }
}

impl std::fmt::Display for PredictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictError::ModelUnavailable => write!(f, "Model not loaded"),
            PredictError::MalformedInput(msg) => write!(f, "Could not parse CSV: {msg}"),
            PredictError::SchemaMismatch(msg) => write!(f, "schema mismatch: {msg}"),
            PredictError::Inference(msg) => write!(f, "inference failed: {msg}"),
        }
    }
}

impl std::error::Error for PredictError {}

pub type PredictResult<T> = std::result::Result<T, PredictError>;
