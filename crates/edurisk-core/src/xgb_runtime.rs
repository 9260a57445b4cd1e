//! Pure-Rust scorer for XGBoost JSON models (`Booster.save_model("x.json")`).
//!
//! Only numerical splits of `gbtree` boosters are supported, with the
//! `multi:softprob`, `multi:softmax` and `binary:logistic` objectives. Anything
//! else is rejected at load so a bad artifact never reaches request time.
//!
//! Row semantics follow the training pipeline:
//! - numbers: cast to f32
//! - strings: looked up in `cat_maps` (unknown category -> 0), or parsed as a
//!   number when the feature has no category map
//! - missing: NaN, routed by each node's `default_left`

use crate::error::{PredictError, PredictResult};
use crate::model::Classifier;
use crate::schema::Scalar;
use crate::table::Table;
use crate::util::{sigmoid, softmax};
use anyhow::{anyhow, bail, ensure, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;

// ---- on-disk model layout (subset we read) ----

#[derive(Debug, Clone, Deserialize)]
pub struct XgbModelJson {
    learner: LearnerJson,
}

#[derive(Debug, Clone, Deserialize)]
struct LearnerJson {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: GradientBoosterJson,
    learner_model_param: LearnerModelParamJson,
    objective: ObjectiveJson,
}

#[derive(Debug, Clone, Deserialize)]
struct GradientBoosterJson {
    name: String,
    model: Option<GbTreeModelJson>,
}

#[derive(Debug, Clone, Deserialize)]
struct GbTreeModelJson {
    trees: Vec<TreeJson>,
    tree_info: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct TreeJson {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<u32>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<u8>,
}

/// `default_left` is written as 0/1 by newer XGBoost and as bools by older.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(u8),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LearnerModelParamJson {
    base_score: String,
    #[serde(default)]
    num_class: String,
    #[serde(default)]
    num_feature: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ObjectiveJson {
    name: String,
}

/// `"5E-1"` or `"[5E-1,5E-1,5E-1]"`.
fn parse_base_score(s: &str) -> Result<Vec<f64>> {
    let t = s.trim();
    let t = t
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .unwrap_or(t);
    t.split(',')
        .map(|p| {
            p.trim()
                .parse::<f64>()
                .with_context(|| format!("parse base_score '{s}'"))
        })
        .collect()
}

fn parse_count(s: &str, what: &str) -> Result<usize> {
    if s.trim().is_empty() {
        return Ok(0);
    }
    s.trim()
        .parse::<usize>()
        .with_context(|| format!("parse {what} '{s}'"))
}

// ---- in-memory ensemble ----

#[derive(Debug, Clone, Copy)]
struct Node {
    left: i32,
    right: i32,
    split_index: u32,
    /// Split threshold, or the leaf value when `left < 0`.
    split_cond: f32,
    default_left: bool,
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_json(t: &TreeJson, num_feature: usize) -> Result<Self> {
        let n = t.left_children.len();
        ensure!(n > 0, "empty tree");
        ensure!(
            t.right_children.len() == n
                && t.split_indices.len() == n
                && t.split_conditions.len() == n
                && t.default_left.len() == n,
            "tree arrays have inconsistent lengths"
        );
        ensure!(
            t.split_type.iter().all(|&s| s == 0),
            "categorical splits are not supported"
        );

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (l, r) = (t.left_children[i], t.right_children[i]);
            if l >= 0 {
                // children are stored after their parent; this also rules out cycles
                ensure!(
                    (l as usize) > i && (l as usize) < n && r >= 0 && (r as usize) > i && (r as usize) < n,
                    "node {i} has invalid children ({l}, {r})"
                );
                ensure!(
                    num_feature == 0 || (t.split_indices[i] as usize) < num_feature,
                    "node {i} splits on feature {} of {num_feature}",
                    t.split_indices[i]
                );
            }
            nodes.push(Node {
                left: l,
                right: r,
                split_index: t.split_indices[i],
                split_cond: t.split_conditions[i],
                default_left: t.default_left[i].is_set(),
            });
        }
        Ok(Self { nodes })
    }

    #[inline]
    fn leaf_value(&self, row: &[f32]) -> f32 {
        let mut i = 0usize;
        loop {
            let node = &self.nodes[i];
            if node.left < 0 {
                return node.split_cond;
            }
            let v = row
                .get(node.split_index as usize)
                .copied()
                .unwrap_or(f32::NAN);
            let go_left = if v.is_nan() {
                node.default_left
            } else {
                v < node.split_cond
            };
            let next = if go_left { node.left } else { node.right };
            i = next as usize;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Objective {
    Softmax,
    Logistic,
}

/// Boosted trees plus the link function of their objective.
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    trees: Vec<Tree>,
    tree_group: Vec<usize>,
    base_margin: Vec<f64>,
    objective: Objective,
    num_feature: usize,
    n_classes: usize,
}

impl TreeEnsemble {
    pub fn from_model(model: &XgbModelJson) -> Result<Self> {
        let learner = &model.learner;
        ensure!(
            learner.gradient_booster.name == "gbtree",
            "unsupported booster '{}', expected gbtree",
            learner.gradient_booster.name
        );
        let gb = learner
            .gradient_booster
            .model
            .as_ref()
            .ok_or_else(|| anyhow!("gbtree model section missing"))?;

        let num_class = parse_count(&learner.learner_model_param.num_class, "num_class")?;
        let num_feature = parse_count(&learner.learner_model_param.num_feature, "num_feature")?;
        let base_score = parse_base_score(&learner.learner_model_param.base_score)?;

        let (objective, groups, n_classes) = match learner.objective.name.as_str() {
            "multi:softprob" | "multi:softmax" => {
                ensure!(num_class >= 2, "multiclass objective with num_class={num_class}");
                (Objective::Softmax, num_class, num_class)
            }
            "binary:logistic" => (Objective::Logistic, 1, 2),
            other => bail!("unsupported objective '{other}'"),
        };

        let base_margin = match (objective, base_score.as_slice()) {
            (Objective::Logistic, [p]) => {
                ensure!(*p > 0.0 && *p < 1.0, "base_score {p} outside (0, 1)");
                vec![(p / (1.0 - p)).ln()]
            }
            (Objective::Softmax, [b]) => vec![*b; groups],
            (Objective::Softmax, v) if v.len() == groups => v.to_vec(),
            (_, v) => bail!("base_score has {} entries for {groups} output groups", v.len()),
        };

        ensure!(
            gb.tree_info.len() == gb.trees.len(),
            "tree_info has {} entries for {} trees",
            gb.tree_info.len(),
            gb.trees.len()
        );
        let mut trees = Vec::with_capacity(gb.trees.len());
        let mut tree_group = Vec::with_capacity(gb.trees.len());
        for (k, (t, &g)) in gb.trees.iter().zip(&gb.tree_info).enumerate() {
            ensure!(
                g >= 0 && (g as usize) < groups,
                "tree {k} belongs to group {g} of {groups}"
            );
            trees.push(Tree::from_json(t, num_feature).with_context(|| format!("tree {k}"))?);
            tree_group.push(g as usize);
        }

        Ok(Self {
            trees,
            tree_group,
            base_margin,
            objective,
            num_feature,
            n_classes,
        })
    }

    #[inline]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    #[inline]
    pub fn num_feature(&self) -> usize {
        self.num_feature
    }

    /// Raw margins per output group.
    pub fn predict_margin(&self, row: &[f32]) -> Vec<f64> {
        let mut margin = self.base_margin.clone();
        for (tree, &g) in self.trees.iter().zip(&self.tree_group) {
            margin[g] += tree.leaf_value(row) as f64;
        }
        margin
    }

    /// Class probabilities for one dense row (NaN = missing).
    pub fn predict_proba_row(&self, row: &[f32]) -> Vec<f64> {
        let margin = self.predict_margin(row);
        match self.objective {
            Objective::Softmax => softmax(&margin),
            Objective::Logistic => {
                let p = sigmoid(margin[0]);
                vec![1.0 - p, p]
            }
        }
    }
}

/// Bundle-facing classifier: feature schema + category maps + trees.
#[derive(Debug, Clone)]
pub struct XgbRuntime {
    pub feature_names: Vec<String>,
    pub cat_maps: HashMap<String, HashMap<String, u32>>,
    ensemble: TreeEnsemble,
}

impl XgbRuntime {
    /// `feature_names` empty means "use the names stored in the model".
    pub fn new(
        feature_names: Vec<String>,
        cat_maps: HashMap<String, HashMap<String, u32>>,
        model: &XgbModelJson,
    ) -> Result<Self> {
        let ensemble = TreeEnsemble::from_model(model)?;
        let feature_names = if feature_names.is_empty() {
            model.learner.feature_names.clone()
        } else {
            feature_names
        };
        ensure!(
            !feature_names.is_empty(),
            "no feature schema: bundle and model both lack feature_names"
        );
        ensure!(
            ensemble.num_feature() == 0 || ensemble.num_feature() == feature_names.len(),
            "model expects {} features, schema lists {}",
            ensemble.num_feature(),
            feature_names.len()
        );
        Ok(Self {
            feature_names,
            cat_maps,
            ensemble,
        })
    }

    /// Column index of every feature, or the list of absent ones.
    fn feature_indices(&self, table: &Table) -> PredictResult<Vec<usize>> {
        let mut idx = Vec::with_capacity(self.feature_names.len());
        let mut missing = Vec::new();
        for name in &self.feature_names {
            match table.column_index(name) {
                Some(i) => idx.push(i),
                None => missing.push(name.as_str()),
            }
        }
        if !missing.is_empty() {
            return Err(PredictError::SchemaMismatch(format!(
                "columns are missing: {}",
                missing.join(", ")
            )));
        }
        Ok(idx)
    }

    fn encode(&self, feature: &str, cell: &Scalar) -> f32 {
        match cell {
            Scalar::Missing => f32::NAN,
            Scalar::Int(i) => *i as f32,
            Scalar::Number(n) => *n as f32,
            Scalar::Bool(b) => u8::from(*b) as f32,
            Scalar::Text(s) => match self.cat_maps.get(feature) {
                Some(map) => map.get(s).copied().unwrap_or(0) as f32,
                None => s.trim().parse::<f64>().map(|n| n as f32).unwrap_or(f32::NAN),
            },
        }
    }

    /// Dense model rows in table order.
    pub fn build_rows(&self, table: &Table) -> PredictResult<Vec<Vec<f32>>> {
        let idx = self.feature_indices(table)?;
        Ok(table
            .rows()
            .iter()
            .map(|row| {
                idx.iter()
                    .zip(&self.feature_names)
                    .map(|(&i, name)| self.encode(name, &row[i]))
                    .collect()
            })
            .collect())
    }
}

impl Classifier for XgbRuntime {
    fn n_classes(&self) -> usize {
        self.ensemble.n_classes()
    }

    fn predict_proba(&self, table: &Table) -> PredictResult<Vec<Vec<f64>>> {
        let rows = self.build_rows(table)?;
        Ok(rows
            .iter()
            .map(|r| self.ensemble.predict_proba_row(r))
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{json, Value};

    /// Three classes, one round: low approval -> Dropout, high -> Graduate.
    pub(crate) fn toy_model_json() -> Value {
        json!({
            "learner": {
                "feature_names": ["sem1_approval_rate", "gender"],
                "gradient_booster": {
                    "name": "gbtree",
                    "model": {
                        "tree_info": [0, 1, 2],
                        "trees": [
                            {
                                "left_children": [1, -1, -1],
                                "right_children": [2, -1, -1],
                                "split_indices": [0, 0, 0],
                                "split_conditions": [0.5, 1.0, -1.0],
                                "default_left": [1, 0, 0]
                            },
                            {
                                "left_children": [-1],
                                "right_children": [-1],
                                "split_indices": [0],
                                "split_conditions": [0.0],
                                "default_left": [false]
                            },
                            {
                                "left_children": [1, -1, -1],
                                "right_children": [2, -1, -1],
                                "split_indices": [0, 0, 0],
                                "split_conditions": [0.5, -1.0, 1.0],
                                "default_left": [0, 0, 0],
                                "split_type": [0, 0, 0]
                            }
                        ]
                    }
                },
                "learner_model_param": {
                    "base_score": "5E-1",
                    "num_class": "3",
                    "num_feature": "2"
                },
                "objective": {"name": "multi:softprob"}
            },
            "version": [1, 7, 6]
        })
    }

    fn toy_model() -> XgbModelJson {
        serde_json::from_value(toy_model_json()).unwrap()
    }

    fn toy_runtime() -> XgbRuntime {
        let cat_maps = HashMap::from([(
            "gender".to_string(),
            HashMap::from([("Female".to_string(), 0), ("Male".to_string(), 1)]),
        )]);
        XgbRuntime::new(vec![], cat_maps, &toy_model()).unwrap()
    }

    #[test]
    fn traverses_and_applies_softmax() {
        let ens = TreeEnsemble::from_model(&toy_model()).unwrap();
        assert_eq!(ens.n_classes(), 3);

        let low = ens.predict_proba_row(&[0.2, 0.0]);
        assert!(low[0] > low[1] && low[1] > low[2]);
        assert!((low.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        let high = ens.predict_proba_row(&[0.9, 0.0]);
        assert!(high[2] > high[1] && high[1] > high[0]);

        assert_eq!(ens.predict_margin(&[0.2, 0.0]), vec![1.5, 0.5, -0.5]);
    }

    #[test]
    fn missing_follows_default_direction() {
        let ens = TreeEnsemble::from_model(&toy_model()).unwrap();
        // tree 0 defaults left (+1), tree 2 defaults right (+1)
        assert_eq!(ens.predict_margin(&[f32::NAN, 0.0]), vec![1.5, 0.5, 1.5]);
    }

    #[test]
    fn binary_logistic_outputs_two_columns() {
        let mut v = toy_model_json();
        v["learner"]["objective"]["name"] = json!("binary:logistic");
        v["learner"]["learner_model_param"]["num_class"] = json!("0");
        v["learner"]["gradient_booster"]["model"]["tree_info"] = json!([0, 0, 0]);
        let ens = TreeEnsemble::from_model(&serde_json::from_value(v).unwrap()).unwrap();
        assert_eq!(ens.n_classes(), 2);
        let p = ens.predict_proba_row(&[0.2, 0.0]);
        // logit(0.5) = 0; leaves 1 + 0 - 1
        assert!((p[0] - 0.5).abs() < 1e-9 && (p[1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_unsupported_models() {
        let mut v = toy_model_json();
        v["learner"]["objective"]["name"] = json!("reg:squarederror");
        assert!(TreeEnsemble::from_model(&serde_json::from_value(v).unwrap()).is_err());

        let mut v = toy_model_json();
        v["learner"]["gradient_booster"]["model"]["trees"][2]["split_type"] = json!([1, 0, 0]);
        assert!(TreeEnsemble::from_model(&serde_json::from_value(v).unwrap()).is_err());

        let mut v = toy_model_json();
        v["learner"]["gradient_booster"]["model"]["trees"][0]["left_children"] = json!([0, -1, -1]);
        assert!(TreeEnsemble::from_model(&serde_json::from_value(v).unwrap()).is_err());
    }

    #[test]
    fn vector_base_score_is_accepted() {
        assert_eq!(parse_base_score("[5E-1,2.5E-1,0]").unwrap(), vec![0.5, 0.25, 0.0]);
        assert_eq!(parse_base_score("5E-1").unwrap(), vec![0.5]);
        assert!(parse_base_score("x").is_err());
    }

    #[test]
    fn builds_rows_by_name_with_category_maps() {
        let rt = toy_runtime();
        let mut t = Table::new(vec!["gender".into(), "extra".into(), "sem1_approval_rate".into()]);
        t.push_row(vec![Scalar::Text("Male".into()), Scalar::Number(7.0), Scalar::Number(0.25)]);
        t.push_row(vec![Scalar::Text("Other".into()), Scalar::Missing, Scalar::Missing]);

        let rows = rt.build_rows(&t).unwrap();
        assert_eq!(rows[0], vec![0.25, 1.0]);
        assert!(rows[1][0].is_nan());
        assert_eq!(rows[1][1], 0.0);
    }

    #[test]
    fn absent_feature_columns_are_a_schema_mismatch() {
        let rt = toy_runtime();
        let t = Table::new(vec!["gender".into()]);
        match rt.predict_proba(&t) {
            Err(PredictError::SchemaMismatch(msg)) => assert!(msg.contains("sem1_approval_rate")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn schema_width_must_match_model() {
        let err = XgbRuntime::new(vec!["only_one".into()], HashMap::new(), &toy_model());
        assert!(err.is_err());
    }
}
