// crates/edurisk-core/src/schema.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One cell of a feature table.
///
/// Records are schema-flexible, so cells carry their own type instead of
/// living in a fixed struct. `Missing` plays the role of NaN/None. `Int`
/// keeps integer columns exact past 2^53.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Scalar {
    Int(i64),
    Number(f64),
    Bool(bool),
    Text(String),
    #[default]
    Missing,
}

impl Scalar {
    /// Numeric view of the cell. Booleans are 0/1, numeric text counts,
    /// NaN does not.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Number(n) if !n.is_nan() => Some(*n),
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            _ => None,
        }
    }

    #[inline]
    pub fn is_missing(&self) -> bool {
        match self {
            Scalar::Missing => true,
            Scalar::Number(n) => n.is_nan(),
            Scalar::Int(_) | Scalar::Bool(_) | Scalar::Text(_) => false,
        }
    }

    /// JSON -> cell: null and nested values are missing.
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => Scalar::Missing,
            Value::Bool(b) => Scalar::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => n.as_f64().map(Scalar::Number).unwrap_or(Scalar::Missing),
            },
            Value::String(s) => Scalar::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Scalar::Missing,
        }
    }
}

impl std::fmt::Display for Scalar {
    /// CSV cell text: missing is empty, floats always carry a decimal
    /// point (`70.0`), booleans print as `True`/`False`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Missing => Ok(()),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Number(n) if n.is_nan() => Ok(()),
            Scalar::Number(n) => write!(f, "{n:?}"),
            Scalar::Bool(true) => f.write_str("True"),
            Scalar::Bool(false) => f.write_str("False"),
        }
    }
}

/// Response body of `POST /predict`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub prediction: String,
    pub confidence: f64,
    pub dropout_risk_score: f64,
    /// Class label -> percentage, in class order.
    pub probs_percent: Map<String, Value>,
}

/// Response body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub model_loaded: bool,
    pub classes: Vec<String>,
    pub risk_class: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_values_map_to_cells() {
        assert_eq!(Scalar::from_json(&json!(3)), Scalar::Int(3));
        assert_eq!(Scalar::from_json(&json!(2.5)), Scalar::Number(2.5));
        assert_eq!(Scalar::from_json(&json!(true)), Scalar::Bool(true));
        assert_eq!(Scalar::Bool(true).as_f64(), Some(1.0));
        assert_eq!(Scalar::Bool(false).as_f64(), Some(0.0));
        assert_eq!(Scalar::from_json(&json!("Male")), Scalar::Text("Male".into()));
        assert_eq!(Scalar::from_json(&json!(null)), Scalar::Missing);
        assert_eq!(Scalar::from_json(&json!([1, 2])), Scalar::Missing);
    }

    #[test]
    fn numeric_text_is_numeric() {
        assert_eq!(Scalar::Text(" 4 ".into()).as_f64(), Some(4.0));
        assert_eq!(Scalar::Text("four".into()).as_f64(), None);
        assert_eq!(Scalar::Number(f64::NAN).as_f64(), None);
        assert!(Scalar::Number(f64::NAN).is_missing());
    }

    #[test]
    fn display_matches_csv_cells() {
        assert_eq!(Scalar::Int(3).to_string(), "3");
        assert_eq!(Scalar::Int(12345678901234567).to_string(), "12345678901234567");
        assert_eq!(Scalar::Number(70.0).to_string(), "70.0");
        assert_eq!(Scalar::Number(0.25).to_string(), "0.25");
        assert_eq!(Scalar::Bool(false).to_string(), "False");
        assert_eq!(Scalar::Number(-1.5).to_string(), "-1.5");
        assert_eq!(Scalar::Missing.to_string(), "");
        assert_eq!(Scalar::Text("Dropout".into()).to_string(), "Dropout");
    }
}
