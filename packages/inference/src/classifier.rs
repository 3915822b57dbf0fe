//! Pre-fitted binary classifiers.
//!
//! Two artifact shapes are supported:
//!
//! ```text
//! { "type": "logistic_regression", "coef": [..15], "intercept": f }
//! { "type": "random_forest", "trees": [ { "children_left": [..],
//!   "children_right": [..], "feature": [..], "threshold": [..],
//!   "value": [[c0, c1], ..] }, .. ] }
//! ```
//!
//! Tree nodes are stored flat. A node whose `children_left` is `-1` is a
//! leaf; otherwise `x[feature] <= threshold` descends left.

use landslide_inference_models::{CLASS_COUNT, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

use crate::InferenceError;

const LEAF: i64 = -1;

/// A fitted classifier producing one probability per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Classifier {
    /// Binary logistic regression.
    LogisticRegression {
        /// One weight per feature.
        coef: Vec<f64>,
        /// Bias term.
        intercept: f64,
    },
    /// Averaged decision trees.
    RandomForest {
        /// Member trees.
        trees: Vec<DecisionTree>,
    },
}

/// One tree of a random forest in flat array form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class weights (counts or fractions).
    pub value: Vec<Vec<f64>>,
}

impl Classifier {
    /// Checks the artifact against the feature schema.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidArtifact`] describing the first
    /// inconsistency found.
    pub fn validate(&self) -> Result<(), InferenceError> {
        match self {
            Self::LogisticRegression { coef, intercept } => {
                if coef.len() != FEATURE_COUNT {
                    return Err(InferenceError::InvalidArtifact(format!(
                        "logistic regression has {} coefficients, expected {FEATURE_COUNT}",
                        coef.len()
                    )));
                }
                if !intercept.is_finite() || coef.iter().any(|c| !c.is_finite()) {
                    return Err(InferenceError::InvalidArtifact(
                        "logistic regression has non-finite parameters".to_string(),
                    ));
                }
                Ok(())
            }
            Self::RandomForest { trees } => {
                if trees.is_empty() {
                    return Err(InferenceError::InvalidArtifact(
                        "random forest has no trees".to_string(),
                    ));
                }
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate()
                        .map_err(|e| InferenceError::InvalidArtifact(format!("tree {i}: {e}")))?;
                }
                Ok(())
            }
        }
    }

    /// Class probabilities for an already scaled input.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::Model`] if a tree cannot be walked.
    pub fn predict_proba(
        &self,
        x: &[f64; FEATURE_COUNT],
    ) -> Result<[f64; CLASS_COUNT], InferenceError> {
        match self {
            Self::LogisticRegression { coef, intercept } => {
                let z = coef
                    .iter()
                    .zip(x)
                    .fold(*intercept, |acc, (c, v)| c.mul_add(*v, acc));
                let p = sigmoid(z);
                Ok([1.0 - p, p])
            }
            Self::RandomForest { trees } => {
                let mut sum = [0.0; CLASS_COUNT];
                for tree in trees {
                    let leaf = tree.leaf_distribution(x)?;
                    for (s, p) in sum.iter_mut().zip(leaf) {
                        *s += p;
                    }
                }
                #[allow(clippy::cast_precision_loss)]
                let n = trees.len() as f64;
                Ok(sum.map(|s| s / n))
            }
        }
    }
}

impl DecisionTree {
    fn validate(&self) -> Result<(), String> {
        let n = self.children_left.len();
        if n == 0 {
            return Err("no nodes".to_string());
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|len| *len != n)
        {
            return Err("node arrays differ in length".to_string());
        }

        for node in 0..n {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == LEAF {
                let value = &self.value[node];
                if value.len() != CLASS_COUNT {
                    return Err(format!(
                        "leaf {node} has {} class weights, expected {CLASS_COUNT}",
                        value.len()
                    ));
                }
                if value.iter().any(|w| !w.is_finite() || *w < 0.0) || value.iter().sum::<f64>() <= 0.0 {
                    return Err(format!("leaf {node} has unusable class weights"));
                }
                continue;
            }

            // Children always come after their parent, so walks terminate.
            for child in [left, right] {
                if !usize::try_from(child).is_ok_and(|c| c > node && c < n) {
                    return Err(format!("node {node} has invalid child {child}"));
                }
            }
            if !usize::try_from(self.feature[node]).is_ok_and(|f| f < FEATURE_COUNT) {
                return Err(format!(
                    "node {node} splits on unknown feature {}",
                    self.feature[node]
                ));
            }
            if !self.threshold[node].is_finite() {
                return Err(format!("node {node} has a non-finite threshold"));
            }
        }

        Ok(())
    }

    /// Normalized class distribution of the leaf reached by `x`.
    ///
    /// Every read is bounds-checked and each step must move to a later
    /// node, so an unvalidated tree errors instead of panicking or looping.
    fn leaf_distribution(
        &self,
        x: &[f64; FEATURE_COUNT],
    ) -> Result<[f64; CLASS_COUNT], InferenceError> {
        let mut node = 0usize;
        loop {
            let left = *self.children_left.get(node).ok_or_else(|| walk_error(node))?;
            if left == LEAF {
                break;
            }
            let feature = self
                .feature
                .get(node)
                .and_then(|f| usize::try_from(*f).ok())
                .ok_or_else(|| walk_error(node))?;
            let value = x.get(feature).ok_or_else(|| walk_error(node))?;
            let threshold = self.threshold.get(node).ok_or_else(|| walk_error(node))?;
            let next = if value <= threshold {
                left
            } else {
                *self.children_right.get(node).ok_or_else(|| walk_error(node))?
            };
            node = usize::try_from(next)
                .ok()
                .filter(|next| *next > node)
                .ok_or_else(|| walk_error(node))?;
        }

        let weights = self
            .value
            .get(node)
            .filter(|w| w.len() == CLASS_COUNT)
            .ok_or_else(|| walk_error(node))?;
        let total: f64 = weights.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(walk_error(node));
        }

        let mut out = [0.0; CLASS_COUNT];
        for (o, w) in out.iter_mut().zip(weights) {
            *o = w / total;
        }
        Ok(out)
    }
}

fn walk_error(node: usize) -> InferenceError {
    InferenceError::Model(format!("decision tree walk failed at node {node}"))
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
