use crate::error::PredictResult;
use crate::table::Table;

/// Probability model behind the bundle.
///
/// Input columns are matched by name; extra columns are ignored. Output is one
/// row per input row, one probability per class, in bundle class order.
pub trait Classifier: Send + Sync {
    fn n_classes(&self) -> usize;

    fn predict_proba(&self, table: &Table) -> PredictResult<Vec<Vec<f64>>>;
}

/// Fixed-probability classifier, handy for wiring tests and smoke runs.
#[derive(Debug, Clone)]
pub struct ConstantClassifier {
    pub probs: Vec<f64>,
}

impl ConstantClassifier {
    pub fn new(probs: Vec<f64>) -> Self {
        Self { probs }
    }
}

impl Classifier for ConstantClassifier {
    fn n_classes(&self) -> usize {
        self.probs.len()
    }

    fn predict_proba(&self, table: &Table) -> PredictResult<Vec<Vec<f64>>> {
        Ok(vec![self.probs.clone(); table.n_rows()])
    }
}
