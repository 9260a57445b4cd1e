//! Ratio features derived from per-semester curricular unit counters.
//!
//! Each ratio exists only when both of its source columns are present. A zero
//! denominator yields a missing value for that row, and any infinity left in
//! the table afterwards is turned into a missing value too, so downstream
//! code never sees non-finite numbers.

use crate::schema::Scalar;
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatioFeature {
    pub name: &'static str,
    pub numerator: &'static str,
    pub denominator: &'static str,
}

pub const RATIO_FEATURES: &[RatioFeature] = &[
    RatioFeature {
        name: "sem1_approval_rate",
        numerator: "sem1_approved",
        denominator: "sem1_enrolled",
    },
    RatioFeature {
        name: "sem1_success_ratio",
        numerator: "sem1_approved",
        denominator: "sem1_evaluations",
    },
    RatioFeature {
        name: "sem1_noeval_rate",
        numerator: "sem1_without_eval",
        denominator: "sem1_enrolled",
    },
    RatioFeature {
        name: "sem2_approval_rate",
        numerator: "sem2_approved",
        denominator: "sem2_enrolled",
    },
    RatioFeature {
        name: "sem2_success_ratio",
        numerator: "sem2_approved",
        denominator: "sem2_evaluations",
    },
    RatioFeature {
        name: "sem2_noeval_rate",
        numerator: "sem2_without_eval",
        denominator: "sem2_enrolled",
    },
];

impl RatioFeature {
    /// Value for one row; zero, missing or non-numeric inputs give `Missing`.
    #[inline]
    pub fn compute(&self, numerator: &Scalar, denominator: &Scalar) -> Scalar {
        match (numerator.as_f64(), denominator.as_f64()) {
            (Some(_), Some(d)) if d == 0.0 => Scalar::Missing,
            (Some(n), Some(d)) => finite_or_missing(n / d),
            _ => Scalar::Missing,
        }
    }
}

/// Ratios whose source columns are all in `columns`.
pub fn computable_ratios<S: AsRef<str>>(columns: &[S]) -> Vec<&'static RatioFeature> {
    let has = |name: &str| columns.iter().any(|c| c.as_ref() == name);
    RATIO_FEATURES
        .iter()
        .filter(|r| has(r.numerator) && has(r.denominator))
        .collect()
}

/// Copy of `table` with every computable ratio column added (or overwritten).
pub fn add_feature_engineering(table: &Table) -> Table {
    let mut out = table.clone();

    for ratio in computable_ratios(table.columns()) {
        let (Some(num), Some(den)) = (table.column(ratio.numerator), table.column(ratio.denominator))
        else {
            continue;
        };
        let values: Vec<Scalar> = num.zip(den).map(|(n, d)| ratio.compute(n, d)).collect();
        out.set_column(ratio.name, values);
    }

    out.map_cells(|cell| {
        if let Scalar::Number(n) = cell {
            if n.is_infinite() {
                *cell = Scalar::Missing;
            }
        }
    });
    out
}

#[inline]
fn finite_or_missing(x: f64) -> Scalar {
    if x.is_finite() {
        Scalar::Number(x)
    } else {
        Scalar::Missing
    }
}
