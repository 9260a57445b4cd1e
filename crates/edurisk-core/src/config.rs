use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_BUNDLE_PATH: &str = "student_success_multiclass.json";

/// Runtime configuration of the prediction core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Model bundle artifact (`.json`, or `.json.gz`).
    pub bundle_path: PathBuf,

    /// Class whose probability is reported as the risk score.
    pub risk_class: String,

    /// Ground-truth column that is kept in batch output but never fed to the model.
    pub target_column: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bundle_path: PathBuf::from(DEFAULT_BUNDLE_PATH),
            risk_class: "Dropout".to_string(),
            target_column: "target".to_string(),
        }
    }
}
