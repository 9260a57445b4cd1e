//! Probability vectors -> labeled predictions.

use crate::error::{PredictError, PredictResult};
use crate::schema::{PredictResponse, Scalar};
use crate::table::Table;
use crate::util::round1;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub top_label: String,
    pub confidence_pct: f64,
    pub risk_pct: f64,
    /// (class label, percentage) in class order.
    pub per_class_pct: Vec<(String, f64)>,
}

impl Prediction {
    pub fn into_response(self) -> PredictResponse {
        let mut probs_percent = Map::with_capacity(self.per_class_pct.len());
        for (label, pct) in self.per_class_pct {
            probs_percent.insert(label, Value::from(pct));
        }
        PredictResponse {
            prediction: self.top_label,
            confidence: self.confidence_pct,
            dropout_risk_score: self.risk_pct,
            probs_percent,
        }
    }
}

/// Index of the first maximum; NaN entries never win.
pub fn stable_argmax(probs: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &p) in probs.iter().enumerate() {
        if p.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if p <= b => {}
            _ => best = Some((i, p)),
        }
    }
    best.map(|(i, _)| i)
}

/// Format one probability row. `risk_index` is resolved once at bundle load.
pub fn format_prediction(
    probs: &[f64],
    classes: &[String],
    risk_index: usize,
) -> PredictResult<Prediction> {
    if probs.len() != classes.len() {
        return Err(PredictError::Inference(format!(
            "probability row has {} entries, expected {} classes",
            probs.len(),
            classes.len()
        )));
    }
    let top = stable_argmax(probs)
        .ok_or_else(|| PredictError::Inference("probability row has no finite entry".into()))?;
    let risk = probs.get(risk_index).copied().ok_or_else(|| {
        PredictError::Inference(format!("risk class index {risk_index} out of range"))
    })?;

    Ok(Prediction {
        top_label: classes[top].clone(),
        confidence_pct: round1(probs[top] * 100.0),
        risk_pct: round1(risk * 100.0),
        per_class_pct: classes
            .iter()
            .zip(probs)
            .map(|(c, p)| (c.clone(), round1(p * 100.0)))
            .collect(),
    })
}

/// Output column holding the percentage for class `label`.
#[inline]
pub fn class_column(label: &str) -> String {
    format!("prob_{}", label.to_lowercase())
}

/// Copy of `table` with prediction, confidence, risk and per-class columns appended.
pub fn append_predictions(
    table: &Table,
    predictions: &[Prediction],
    classes: &[String],
) -> PredictResult<Table> {
    if predictions.len() != table.n_rows() {
        return Err(PredictError::Inference(format!(
            "{} predictions for {} rows",
            predictions.len(),
            table.n_rows()
        )));
    }

    let mut out = table.clone();
    out.set_column(
        "prediction",
        predictions.iter().map(|p| Scalar::Text(p.top_label.clone())).collect(),
    );
    out.set_column(
        "confidence",
        predictions.iter().map(|p| Scalar::Number(p.confidence_pct)).collect(),
    );
    out.set_column(
        "dropout_risk_score",
        predictions.iter().map(|p| Scalar::Number(p.risk_pct)).collect(),
    );
    for (i, label) in classes.iter().enumerate() {
        let values = predictions
            .iter()
            .map(|p| {
                p.per_class_pct
                    .get(i)
                    .map(|(_, pct)| Scalar::Number(*pct))
                    .unwrap_or(Scalar::Missing)
            })
            .collect();
        out.set_column(&class_column(label), values);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes() -> Vec<String> {
        vec!["Dropout".into(), "Enrolled".into(), "Graduate".into()]
    }

    #[test]
    fn formats_dropout_example() {
        let p = format_prediction(&[0.7, 0.2, 0.1], &classes(), 0).unwrap();
        assert_eq!(p.top_label, "Dropout");
        assert_eq!(p.confidence_pct, 70.0);
        assert_eq!(p.risk_pct, 70.0);
        assert_eq!(
            p.per_class_pct,
            vec![
                ("Dropout".to_string(), 70.0),
                ("Enrolled".to_string(), 20.0),
                ("Graduate".to_string(), 10.0),
            ]
        );
    }

    #[test]
    fn risk_is_independent_of_top_class() {
        let p = format_prediction(&[0.123, 0.25, 0.627], &classes(), 0).unwrap();
        assert_eq!(p.top_label, "Graduate");
        assert_eq!(p.confidence_pct, 62.7);
        assert_eq!(p.risk_pct, 12.3);
    }

    #[test]
    fn argmax_ties_pick_first() {
        assert_eq!(stable_argmax(&[0.4, 0.4, 0.2]), Some(0));
        assert_eq!(stable_argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(stable_argmax(&[f64::NAN, 0.1, 0.1]), Some(1));
        assert_eq!(stable_argmax(&[]), None);
    }

    #[test]
    fn per_class_percentages_sum_to_about_100() {
        let rows: [[f64; 3]; 4] = [
            [0.3333, 0.3333, 0.3334],
            [0.01, 0.98, 0.01],
            [0.123456, 0.654321, 0.222223],
            [1.0, 0.0, 0.0],
        ];
        for row in rows {
            let p = format_prediction(&row, &classes(), 0).unwrap();
            let sum: f64 = p.per_class_pct.iter().map(|(_, v)| v).sum();
            assert!((sum - 100.0).abs() <= 0.15, "sum={sum}");
            for (_, v) in &p.per_class_pct {
                assert!((0.0..=100.0).contains(v));
            }
        }
    }

    #[test]
    fn width_mismatch_is_an_error() {
        let err = format_prediction(&[0.5, 0.5], &classes(), 0).unwrap_err();
        assert!(matches!(err, PredictError::Inference(_)));
    }

    #[test]
    fn response_keeps_class_order() {
        let resp = format_prediction(&[0.1, 0.2, 0.7], &classes(), 0)
            .unwrap()
            .into_response();
        let keys: Vec<&String> = resp.probs_percent.keys().collect();
        assert_eq!(keys, ["Dropout", "Enrolled", "Graduate"]);
        assert_eq!(resp.prediction, "Graduate");
        assert_eq!(resp.dropout_risk_score, 10.0);
    }

    #[test]
    fn append_adds_columns_after_originals() {
        let mut t = Table::new(vec!["id".into(), "target".into()]);
        t.push_row(vec![Scalar::Text("a".into()), Scalar::Text("Dropout".into())]);
        t.push_row(vec![Scalar::Text("b".into()), Scalar::Text("Graduate".into())]);

        let preds = vec![
            format_prediction(&[0.7, 0.2, 0.1], &classes(), 0).unwrap(),
            format_prediction(&[0.1, 0.1, 0.8], &classes(), 0).unwrap(),
        ];
        let out = append_predictions(&t, &preds, &classes()).unwrap();
        assert_eq!(
            out.columns(),
            [
                "id",
                "target",
                "prediction",
                "confidence",
                "dropout_risk_score",
                "prob_dropout",
                "prob_enrolled",
                "prob_graduate",
            ]
        );
        assert_eq!(out.cell(1, "id"), Some(&Scalar::Text("b".into())));
        assert_eq!(out.cell(1, "prediction"), Some(&Scalar::Text("Graduate".into())));
        assert_eq!(out.cell(1, "prob_graduate"), Some(&Scalar::Number(80.0)));
        assert_eq!(out.cell(0, "dropout_risk_score"), Some(&Scalar::Number(70.0)));

        assert!(append_predictions(&t, &preds[..1], &classes()).is_err());
    }
}
