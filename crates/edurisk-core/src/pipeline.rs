use crate::{
    bundle::ModelBundle,
    config::Config,
    csv_io::{parse_csv, write_csv},
    error::{PredictError, PredictResult},
    features::add_feature_engineering,
    formatter::{append_predictions, format_prediction, Prediction},
    normalize::clean_column_names,
    schema::{HealthResponse, PredictResponse},
    table::Table,
    util::now_us,
};

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Request-facing core. Built once at startup, shared read-only.
///
/// `bundle == None` is the degraded state: every prediction fails with
/// `ModelUnavailable` until the process is restarted.
#[derive(Clone)]
pub struct AppCore {
    pub cfg: Config,
    bundle: Option<Arc<ModelBundle>>,
}

impl AppCore {
    /// Load the bundle named by `cfg`. Failures are logged, not returned.
    pub fn load(cfg: Config) -> Self {
        match ModelBundle::load_from_path(&cfg.bundle_path, &cfg.risk_class) {
            Ok(bundle) => {
                info!(path = %cfg.bundle_path.display(), "Loaded model bundle");
                Self::with_bundle(cfg, bundle)
            }
            Err(e) => {
                error!(path = %cfg.bundle_path.display(), error = %format!("{e:#}"), "Failed to load model");
                Self::unloaded(cfg)
            }
        }
    }

    pub fn with_bundle(cfg: Config, bundle: ModelBundle) -> Self {
        Self {
            cfg,
            bundle: Some(Arc::new(bundle)),
        }
    }

    pub fn unloaded(cfg: Config) -> Self {
        Self { cfg, bundle: None }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.bundle.is_some()
    }

    fn bundle(&self) -> PredictResult<&ModelBundle> {
        self.bundle.as_deref().ok_or(PredictError::ModelUnavailable)
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            model_loaded: self.is_ready(),
            classes: self
                .bundle
                .as_ref()
                .map(|b| b.classes().to_vec())
                .unwrap_or_default(),
            risk_class: self.cfg.risk_class.clone(),
        }
    }

    /// Score one JSON record already keyed by canonical column names.
    pub fn predict_record(&self, record: &Map<String, Value>) -> PredictResult<PredictResponse> {
        let t0 = Instant::now();
        let res = self.predict_record_inner(record);
        observe("single", t0, &res);
        res
    }

    fn predict_record_inner(&self, record: &Map<String, Value>) -> PredictResult<PredictResponse> {
        let bundle = self.bundle()?;

        let t_feat = Instant::now();
        let table = add_feature_engineering(&Table::from_record(record));
        metrics::histogram!("stage_feature_us").record(now_us(t_feat) as f64);

        let t_model = Instant::now();
        let probs = bundle.pipeline().predict_proba(&table)?;
        metrics::histogram!("stage_model_us").record(now_us(t_model) as f64);

        let row = probs
            .first()
            .ok_or_else(|| PredictError::Inference("classifier returned no rows".into()))?;
        let pred = format_prediction(row, bundle.classes(), bundle.risk_index())?;
        debug!(prediction = %pred.top_label, confidence = pred.confidence_pct, "record scored");
        Ok(pred.into_response())
    }

    /// Score an uploaded CSV; returns the augmented CSV text.
    pub fn predict_csv(&self, payload: &[u8]) -> PredictResult<String> {
        let t0 = Instant::now();
        let res = self.predict_csv_inner(payload);
        observe("batch", t0, &res);
        res
    }

    fn predict_csv_inner(&self, payload: &[u8]) -> PredictResult<String> {
        let bundle = self.bundle()?;
        let raw = parse_csv(payload)?;

        let t_feat = Instant::now();
        let table = add_feature_engineering(&clean_column_names(&raw, bundle.rename_dict()));
        metrics::histogram!("stage_feature_us").record(now_us(t_feat) as f64);

        let predictions = if table.n_rows() == 0 {
            Vec::new()
        } else {
            let features = table.without_column(&self.cfg.target_column);

            let t_model = Instant::now();
            let probs = bundle.pipeline().predict_proba(&features)?;
            metrics::histogram!("stage_model_us").record(now_us(t_model) as f64);

            if probs.len() != table.n_rows() {
                return Err(PredictError::Inference(format!(
                    "classifier returned {} rows for {} inputs",
                    probs.len(),
                    table.n_rows()
                )));
            }
            probs
                .iter()
                .map(|p| format_prediction(p, bundle.classes(), bundle.risk_index()))
                .collect::<PredictResult<Vec<Prediction>>>()?
        };
        metrics::histogram!("batch_rows").record(table.n_rows() as f64);

        let out = append_predictions(&table, &predictions, bundle.classes())?;
        info!(rows = out.n_rows(), cols = out.n_cols(), "batch scored");
        write_csv(&out).map_err(|e| PredictError::Inference(format!("serialize csv: {e}")))
    }
}

fn observe<T>(mode: &'static str, t0: Instant, res: &PredictResult<T>) {
    metrics::counter!("predict_requests_total", "mode" => mode).increment(1);
    if let Err(e) = res {
        metrics::counter!("predict_errors_total", "mode" => mode, "kind" => e.kind()).increment(1);
        debug!(mode, error = %e, "prediction failed");
    }
    metrics::histogram!("e2e_us", "mode" => mode).record(now_us(t0) as f64);
}

/// Download name for a batch result.
pub fn output_filename(original: Option<&str>) -> String {
    let name = original
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("upload.csv");
    let safe: String = name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("predictions_{safe}")
}
