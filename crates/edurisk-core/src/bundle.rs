//! Model bundle: classifier + class labels + column rename map.
//!
//! The artifact is one JSON document (optionally gzip'd):
//!
//! ```json
//! {
//!   "classes": ["Dropout", "Enrolled", "Graduate"],
//!   "rename_dict": {"Curricular units 1st sem (enrolled)": "sem1_enrolled"},
//!   "feature_names": ["sem1_enrolled", "..."],
//!   "cat_maps": {"gender": {"Female": 0, "Male": 1}},
//!   "model": { "learner": { "...": "XGBoost JSON model" } }
//! }
//! ```
//!
//! Configuration invariants (risk class present, labels unique, classifier
//! width == class count) are checked here, once, instead of per request.

use crate::model::Classifier;
use crate::xgb_runtime::{XgbModelJson, XgbRuntime};
use anyhow::{anyhow, ensure, Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
struct BundleFile {
    classes: Vec<String>,
    #[serde(default)]
    rename_dict: HashMap<String, String>,
    #[serde(default)]
    feature_names: Vec<String>,
    #[serde(default)]
    cat_maps: HashMap<String, HashMap<String, u32>>,
    model: XgbModelJson,
}

pub struct ModelBundle {
    pipeline: Arc<dyn Classifier>,
    classes: Vec<String>,
    rename_dict: HashMap<String, String>,
    risk_index: usize,
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle")
            .field("classes", &self.classes)
            .field("rename_dict", &self.rename_dict.len())
            .field("risk_index", &self.risk_index)
            .finish_non_exhaustive()
    }
}

impl ModelBundle {
    pub fn new(
        pipeline: Arc<dyn Classifier>,
        classes: Vec<String>,
        rename_dict: HashMap<String, String>,
        risk_class: &str,
    ) -> Result<Self> {
        ensure!(!classes.is_empty(), "bundle has no classes");

        let mut seen = HashSet::with_capacity(classes.len());
        for c in &classes {
            ensure!(seen.insert(c.as_str()), "duplicate class label '{c}'");
        }

        let risk_index = classes
            .iter()
            .position(|c| c == risk_class)
            .ok_or_else(|| anyhow!("risk class '{risk_class}' not in classes {classes:?}"))?;

        ensure!(
            pipeline.n_classes() == classes.len(),
            "classifier outputs {} probabilities for {} classes",
            pipeline.n_classes(),
            classes.len()
        );

        Ok(Self {
            pipeline,
            classes,
            rename_dict,
            risk_index,
        })
    }

    /// Read and validate the artifact at `path`; `.gz` files are decompressed.
    pub fn load_from_path(path: &Path, risk_class: &str) -> Result<Self> {
        let f = fs::File::open(path)
            .with_context(|| format!("open model bundle: {}", path.display()))?;
        let reader: Box<dyn Read> = if path.extension().is_some_and(|e| e == "gz") {
            Box::new(flate2::read::GzDecoder::new(f))
        } else {
            Box::new(f)
        };
        let file: BundleFile = serde_json::from_reader(BufReader::new(reader))
            .with_context(|| format!("parse model bundle: {}", path.display()))?;

        let runtime = XgbRuntime::new(file.feature_names, file.cat_maps, &file.model)
            .with_context(|| format!("load model in bundle: {}", path.display()))?;
        let n_features = runtime.feature_names.len();

        let bundle = Self::new(Arc::new(runtime), file.classes, file.rename_dict, risk_class)?;
        info!(
            path = %path.display(),
            classes = ?bundle.classes,
            features = n_features,
            renames = bundle.rename_dict.len(),
            "model bundle loaded"
        );
        Ok(bundle)
    }

    #[inline]
    pub fn pipeline(&self) -> &dyn Classifier {
        self.pipeline.as_ref()
    }

    #[inline]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    #[inline]
    pub fn rename_dict(&self) -> &HashMap<String, String> {
        &self.rename_dict
    }

    #[inline]
    pub fn risk_index(&self) -> usize {
        self.risk_index
    }

    #[inline]
    pub fn risk_class(&self) -> &str {
        &self.classes[self.risk_index]
    }
}
