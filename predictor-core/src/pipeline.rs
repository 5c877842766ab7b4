//! Evaluation of a fitted tabular classification pipeline.
//!
//! The pipeline mirrors a column transformer (standard scaling for
//! numerical columns, one-hot encoding for categorical columns) feeding a
//! random forest of decision trees. All parameters come from the bundle
//! artifact; nothing here is trained.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BundleError, PredictorError, PredictorResult};
use crate::models::{FeatureRow, FeatureValue};

/// A fitted model able to score a single row of patient features
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Class ids, in the order of the probability columns
    fn classes(&self) -> &[i64];

    /// Per-class probabilities for one row, aligned with [`Classifier::classes`].
    fn predict_proba(&self, row: &FeatureRow<'_>) -> PredictorResult<Vec<f64>>;
}

/// Index of the highest probability; the first maximum wins on ties.
pub fn argmax(values: &[f64]) -> Option<(usize, f64)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (idx, value)| match best {
            Some((_, best_value)) if value <= best_value => best,
            _ => Some((idx, value)),
        })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericScaler {
    pub column: String,
    pub mean: f64,
    pub scale: f64,
}

impl NumericScaler {
    fn apply(&self, value: f64) -> f64 {
        let scale = if self.scale == 0.0 { 1.0 } else { self.scale };
        (value - self.mean) / scale
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotColumn {
    pub column: String,
    pub categories: Vec<String>,
}

/// What the encoder does with a category it was not fitted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCategory {
    #[default]
    Error,
    Ignore,
}

/// Column transformer: scaled numericals followed by one-hot blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocessor {
    #[serde(default)]
    pub numerical: Vec<NumericScaler>,
    #[serde(default)]
    pub categorical: Vec<OneHotColumn>,
    #[serde(default)]
    pub handle_unknown: UnknownCategory,
}

impl Preprocessor {
    pub fn n_output_features(&self) -> usize {
        self.numerical.len()
            + self
                .categorical
                .iter()
                .map(|c| c.categories.len())
                .sum::<usize>()
    }

    pub fn input_columns(&self) -> impl Iterator<Item = &str> {
        self.numerical
            .iter()
            .map(|n| n.column.as_str())
            .chain(self.categorical.iter().map(|c| c.column.as_str()))
    }

    /// Transform one row into the dense feature vector the forest consumes.
    pub fn transform(&self, row: &FeatureRow<'_>) -> PredictorResult<Vec<f64>> {
        let mut out = Vec::with_capacity(self.n_output_features());

        for scaler in &self.numerical {
            match row.get(&scaler.column) {
                Some(FeatureValue::Number(value)) => out.push(scaler.apply(value)),
                Some(FeatureValue::Category(text)) => {
                    return Err(PredictorError::prediction(format!(
                        "column '{}' expects a numeric value, got '{}'",
                        scaler.column, text
                    )))
                }
                None => return Err(missing_column(&scaler.column)),
            }
        }

        for encoder in &self.categorical {
            let value = row
                .get(&encoder.column)
                .ok_or_else(|| missing_column(&encoder.column))?
                .to_string();
            let hit = encoder.categories.iter().position(|c| *c == value);
            if hit.is_none() && self.handle_unknown == UnknownCategory::Error {
                return Err(PredictorError::prediction(format!(
                    "Found unknown category '{}' in column '{}' during transform",
                    value, encoder.column
                )));
            }
            out.extend((0..encoder.categories.len()).map(|i| {
                if Some(i) == hit {
                    1.0
                } else {
                    0.0
                }
            }));
        }

        Ok(out)
    }

    fn validate(&self) -> Result<(), BundleError> {
        for scaler in &self.numerical {
            if !scaler.mean.is_finite() || !scaler.scale.is_finite() {
                return Err(BundleError::Invalid(format!(
                    "scaler for '{}' has non-finite parameters",
                    scaler.column
                )));
            }
        }
        for encoder in &self.categorical {
            if encoder.categories.is_empty() {
                return Err(BundleError::Invalid(format!(
                    "encoder for '{}' has no categories",
                    encoder.column
                )));
            }
        }
        Ok(())
    }
}

fn missing_column(column: &str) -> PredictorError {
    PredictorError::prediction(format!("input is missing column '{}'", column))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Route `x` from the root to a leaf and return its class distribution.
    ///
    /// A walk visits at most `nodes.len()` nodes, so a malformed tree that
    /// was not checked by [`Pipeline::validate`] errors instead of cycling.
    fn leaf_distribution(&self, x: &[f64]) -> PredictorResult<Vec<f64>> {
        let mut idx = 0;
        for _ in 0..self.nodes.len() {
            match self.nodes.get(idx) {
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = x.get(*feature).copied().ok_or_else(|| {
                        PredictorError::prediction(format!("feature index {} out of range", feature))
                    })?;
                    idx = if value <= *threshold { *left } else { *right };
                }
                Some(TreeNode::Leaf { value }) => {
                    let total: f64 = value.iter().sum();
                    return Ok(value.iter().map(|v| v / total).collect());
                }
                None => {
                    return Err(PredictorError::prediction(format!(
                        "tree node {} does not exist",
                        idx
                    )))
                }
            }
        }
        Err(PredictorError::prediction(format!(
            "tree walk did not reach a leaf within {} nodes",
            self.nodes.len()
        )))
    }

    fn validate(&self, tree_idx: usize, n_features: usize, n_classes: usize) -> Result<(), BundleError> {
        if self.nodes.is_empty() {
            return Err(BundleError::Invalid(format!("tree {} has no nodes", tree_idx)));
        }
        let invalid = |msg: String| Err(BundleError::Invalid(format!("tree {}: {}", tree_idx, msg)));
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return invalid(format!("node {} splits on feature {} of {}", idx, feature, n_features));
                    }
                    if !threshold.is_finite() {
                        return invalid(format!("node {} has a non-finite threshold", idx));
                    }
                    // Children must come after their parent so every walk terminates.
                    for child in [left, right] {
                        if *child <= idx || *child >= self.nodes.len() {
                            return invalid(format!("node {} has invalid child {}", idx, child));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if value.len() != n_classes {
                        return invalid(format!(
                            "leaf {} has {} values for {} classes",
                            idx,
                            value.len(),
                            n_classes
                        ));
                    }
                    if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                        return invalid(format!("leaf {} has negative or non-finite values", idx));
                    }
                    if value.iter().sum::<f64>() <= 0.0 {
                        return invalid(format!("leaf {} is empty", idx));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Bagged ensemble of decision trees; probabilities are averaged over trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub classes: Vec<i64>,
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn predict_proba(&self, x: &[f64]) -> PredictorResult<Vec<f64>> {
        if x.len() != self.n_features {
            return Err(PredictorError::prediction(format!(
                "expected {} transformed features, got {}",
                self.n_features,
                x.len()
            )));
        }
        let mut acc = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let dist = tree.leaf_distribution(x)?;
            for (slot, p) in acc.iter_mut().zip(dist) {
                *slot += p;
            }
        }
        let n_trees = self.trees.len() as f64;
        Ok(acc.into_iter().map(|p| p / n_trees).collect())
    }

    fn validate(&self) -> Result<(), BundleError> {
        if self.classes.len() < 2 {
            return Err(BundleError::Invalid(format!(
                "classifier needs at least two classes, found {}",
                self.classes.len()
            )));
        }
        if self.trees.is_empty() {
            return Err(BundleError::Invalid("random forest has no trees".to_string()));
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(idx, self.n_features, self.classes.len())?;
        }
        Ok(())
    }
}

/// Preprocessor and forest evaluated together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub preprocessor: Preprocessor,
    pub classifier: RandomForest,
}

impl Pipeline {
    /// Check internal consistency of a deserialized pipeline.
    pub fn validate(&self) -> Result<(), BundleError> {
        self.preprocessor.validate()?;
        self.classifier.validate()?;
        let produced = self.preprocessor.n_output_features();
        if produced != self.classifier.n_features {
            return Err(BundleError::Invalid(format!(
                "preprocessor produces {} features but the classifier expects {}",
                produced, self.classifier.n_features
            )));
        }
        Ok(())
    }
}

impl Classifier for Pipeline {
    fn classes(&self) -> &[i64] {
        &self.classifier.classes
    }

    fn predict_proba(&self, row: &FeatureRow<'_>) -> PredictorResult<Vec<f64>> {
        let x = self.preprocessor.transform(row)?;
        self.classifier.predict_proba(&x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> DecisionTree {
        DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 0.0,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf {
                    value: vec![8.0, 2.0],
                },
                TreeNode::Leaf {
                    value: vec![1.0, 3.0],
                },
            ],
        }
    }

    fn pipeline(handle_unknown: UnknownCategory) -> Pipeline {
        Pipeline {
            preprocessor: Preprocessor {
                numerical: vec![NumericScaler {
                    column: "Age".to_string(),
                    mean: 50.0,
                    scale: 10.0,
                }],
                categorical: vec![OneHotColumn {
                    column: "Gender".to_string(),
                    categories: vec!["Female".to_string(), "Male".to_string()],
                }],
                handle_unknown,
            },
            classifier: RandomForest {
                classes: vec![0, 1],
                n_features: 3,
                trees: vec![
                    stump(),
                    DecisionTree {
                        nodes: vec![
                            TreeNode::Split {
                                feature: 2,
                                threshold: 0.5,
                                left: 1,
                                right: 2,
                            },
                            TreeNode::Leaf {
                                value: vec![1.0, 0.0],
                            },
                            TreeNode::Leaf {
                                value: vec![0.0, 1.0],
                            },
                        ],
                    },
                ],
            },
        }
    }

    #[test]
    fn test_argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.5, 0.5]), Some((0, 0.5)));
        assert_eq!(argmax(&[0.2, 0.8]), Some((1, 0.8)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_transform_scales_and_encodes() {
        let p = pipeline(UnknownCategory::Error);
        let row = FeatureRow::new(vec![
            ("Age", FeatureValue::Number(70.0)),
            ("Gender", FeatureValue::Category("Male")),
        ]);
        assert_eq!(p.preprocessor.transform(&row).unwrap(), vec![2.0, 0.0, 1.0]);
    }

    #[test]
    fn test_forest_averages_tree_distributions() {
        let p = pipeline(UnknownCategory::Error);
        let row = FeatureRow::new(vec![
            ("Age", FeatureValue::Number(70.0)),
            ("Gender", FeatureValue::Category("Male")),
        ]);
        // Tree 1 goes right (0.25, 0.75); tree 2 goes right (0, 1).
        let proba = p.predict_proba(&row).unwrap();
        assert!((proba[0] - 0.125).abs() < 1e-12);
        assert!((proba[1] - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_category_policy() {
        let row = FeatureRow::new(vec![
            ("Age", FeatureValue::Number(30.0)),
            ("Gender", FeatureValue::Category("Unknown")),
        ]);

        let err = pipeline(UnknownCategory::Error).predict_proba(&row).unwrap_err();
        assert!(err.to_string().contains("'Unknown' in column 'Gender'"));

        let p = pipeline(UnknownCategory::Ignore);
        assert_eq!(p.preprocessor.transform(&row).unwrap(), vec![-2.0, 0.0, 0.0]);
        assert!(p.predict_proba(&row).is_ok());
    }

    #[test]
    fn test_cyclic_tree_fails_instead_of_looping() {
        let tree = DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 0.0,
                    left: 0,
                    right: 1,
                },
                TreeNode::Leaf {
                    value: vec![1.0, 1.0],
                },
            ],
        };
        let forest = RandomForest {
            classes: vec![0, 1],
            n_features: 1,
            trees: vec![tree],
        };
        assert!(forest.validate().is_err());

        let err = forest.predict_proba(&[-1.0]).unwrap_err();
        assert!(matches!(err, PredictorError::Prediction(ref m) if m.contains("did not reach a leaf")));
        assert_eq!(forest.predict_proba(&[1.0]).unwrap(), vec![0.5, 0.5]);
    }

    #[test]
    fn test_validate_rejects_backward_child() {
        let mut p = pipeline(UnknownCategory::Error);
        p.classifier.trees[0].nodes[0] = TreeNode::Split {
            feature: 0,
            threshold: 0.0,
            left: 0,
            right: 2,
        };
        assert!(matches!(p.validate(), Err(BundleError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_feature_count_mismatch() {
        let mut p = pipeline(UnknownCategory::Error);
        p.classifier.n_features = 4;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_tree_node_json_shape() {
        let node: TreeNode =
            serde_json::from_str(r#"{"kind": "split", "feature": 1, "threshold": 0.5, "left": 1, "right": 2}"#)
                .unwrap();
        assert!(matches!(node, TreeNode::Split { feature: 1, .. }));
    }
}
