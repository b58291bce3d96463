use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::{error::ServiceError, error::StartupError, features::FEATURE_ORDER};

/// Anything that maps an `(N, F)` feature matrix to `N` predictions.
///
/// Implementations are shared read-only across requests.
pub trait Regressor: Send + Sync {
    fn n_features(&self) -> usize;

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, ServiceError>;
}

/// Serialized regression pipeline: optional standardisation followed by an estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPipeline {
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
    pub estimator: Estimator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    Linear {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    GradientBoosting {
        init: f64,
        learning_rate: f64,
        trees: Vec<RegressionTree>,
    },
}

impl Estimator {
    pub fn kind(&self) -> &'static str {
        match self {
            Estimator::Linear { .. } => "linear",
            Estimator::GradientBoosting { .. } => "gradient_boosting",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Leaf {
        leaf: f64,
    },
    /// Rows with `x[feature] <= threshold` descend left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

impl RegressionTree {
    fn evaluate(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut index = 0;
        // children always point forward (checked at load), so this terminates
        loop {
            match self.nodes[index] {
                TreeNode::Leaf { leaf } => return leaf,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    fn check(&self, tree: usize, n_features: usize) -> Result<(), StartupError> {
        if self.nodes.is_empty() {
            return Err(StartupError::IncompatibleModel(format!("tree {tree} has no nodes")));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = *node
            {
                let child_ok = |child: usize| child > index && child < self.nodes.len();
                if feature >= n_features || !child_ok(left) || !child_ok(right) {
                    return Err(StartupError::IncompatibleModel(format!(
                        "tree {tree} node {index} references an invalid feature or child"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn check_len(what: &str, len: usize, expected: usize) -> Result<(), StartupError> {
    if len == expected {
        Ok(())
    } else {
        Err(StartupError::IncompatibleModel(format!(
            "{what} has {len} entries, expected {expected}"
        )))
    }
}

impl ModelPipeline {
    /// Checks the artifact against the feature contract before it serves traffic.
    pub fn check(&self) -> Result<(), StartupError> {
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_ORDER) {
            return Err(StartupError::IncompatibleModel(format!(
                "feature_names {:?} do not match {:?}",
                self.feature_names, FEATURE_ORDER
            )));
        }
        let n = self.feature_names.len();

        if let Some(scaler) = &self.scaler {
            check_len("scaler.mean", scaler.mean.len(), n)?;
            check_len("scaler.scale", scaler.scale.len(), n)?;
            if scaler.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
                return Err(StartupError::IncompatibleModel(
                    "scaler.scale must be finite and non-zero".into(),
                ));
            }
        }

        match &self.estimator {
            Estimator::Linear { coefficients, .. } => {
                check_len("coefficients", coefficients.len(), n)?;
            }
            Estimator::GradientBoosting { trees, .. } => {
                for (i, tree) in trees.iter().enumerate() {
                    tree.check(i, n)?;
                }
            }
        }
        Ok(())
    }
}

impl Regressor for ModelPipeline {
    fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, ServiceError> {
        if features.ncols() != self.n_features() {
            return Err(ServiceError::Inference(format!(
                "expected {} features per row, got {}",
                self.n_features(),
                features.ncols()
            )));
        }

        let scaled = match &self.scaler {
            Some(scaler) => {
                let mean = ArrayView1::from(scaler.mean.as_slice());
                let scale = ArrayView1::from(scaler.scale.as_slice());
                (&features - &mean) / &scale
            }
            None => features.to_owned(),
        };

        let predictions = match &self.estimator {
            Estimator::Linear {
                coefficients,
                intercept,
            } => scaled.dot(&ArrayView1::from(coefficients.as_slice())) + *intercept,
            Estimator::GradientBoosting {
                init,
                learning_rate,
                trees,
            } => scaled
                .rows()
                .into_iter()
                .map(|row| {
                    let boost: f64 = trees.iter().map(|tree| tree.evaluate(row)).sum();
                    init + learning_rate * boost
                })
                .collect(),
        };

        if predictions.iter().any(|p| !p.is_finite()) {
            return Err(ServiceError::Inference(
                "model produced a non-finite prediction".into(),
            ));
        }
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    fn names() -> Vec<String> {
        FEATURE_ORDER.iter().map(|s| s.to_string()).collect()
    }

    fn linear(scaler: Option<StandardScaler>) -> ModelPipeline {
        ModelPipeline {
            feature_names: names(),
            scaler,
            estimator: Estimator::Linear {
                coefficients: vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0],
                intercept: 0.5,
            },
        }
    }

    fn row(values: [f64; 8]) -> Array2<f64> {
        Array2::from_shape_vec((1, 8), values.to_vec()).unwrap()
    }

    #[test]
    fn linear_estimator_is_affine() {
        let model = linear(None);
        model.check().unwrap();
        let out = model
            .predict(row([2.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, -1.0]).view())
            .unwrap();
        assert_eq!(out, array![0.5]);
    }

    #[test]
    fn scaler_is_applied_before_estimator() {
        let model = linear(Some(StandardScaler {
            mean: vec![1.0; 8],
            scale: vec![2.0; 8],
        }));
        model.check().unwrap();
        // (5 - 1) / 2 = 2 and (3 - 1) / 2 = 1
        let out = model
            .predict(row([5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 3.0]).view())
            .unwrap();
        assert_eq!(out, array![4.5]);
    }

    #[test]
    fn gradient_boosting_walks_trees() {
        let model = ModelPipeline {
            feature_names: names(),
            scaler: None,
            estimator: Estimator::GradientBoosting {
                init: 2.0,
                learning_rate: 0.5,
                trees: vec![RegressionTree {
                    nodes: vec![
                        TreeNode::Split {
                            feature: 0,
                            threshold: 3.0,
                            left: 1,
                            right: 2,
                        },
                        TreeNode::Leaf { leaf: -1.0 },
                        TreeNode::Leaf { leaf: 4.0 },
                    ],
                }],
            },
        };
        model.check().unwrap();
        let mut batch = Array2::zeros((2, 8));
        batch[[0, 0]] = 3.0;
        batch[[1, 0]] = 3.5;
        assert_eq!(model.predict(batch.view()).unwrap(), array![1.5, 4.0]);
    }

    #[test]
    fn rejects_wrong_feature_order() {
        let mut model = linear(None);
        model.feature_names.swap(6, 7);
        assert!(matches!(model.check(), Err(StartupError::IncompatibleModel(_))));
    }

    #[test]
    fn rejects_backward_tree_edges() {
        let model = ModelPipeline {
            feature_names: names(),
            scaler: None,
            estimator: Estimator::GradientBoosting {
                init: 0.0,
                learning_rate: 1.0,
                trees: vec![RegressionTree {
                    nodes: vec![TreeNode::Split {
                        feature: 0,
                        threshold: 0.0,
                        left: 0,
                        right: 0,
                    }],
                }],
            },
        };
        assert!(model.check().is_err());
    }

    #[test]
    fn shape_mismatch_is_an_inference_error() {
        let model = linear(None);
        let narrow = Array2::<f64>::zeros((1, 3));
        assert!(matches!(
            model.predict(narrow.view()),
            Err(ServiceError::Inference(_))
        ));
    }

    #[test]
    fn estimator_kind_is_tagged_in_json() {
        let raw = r#"{"kind": "linear", "coefficients": [1, 2], "intercept": 0.0}"#;
        let estimator: Estimator = serde_json::from_str(raw).unwrap();
        assert_eq!(estimator.kind(), "linear");
    }
}
