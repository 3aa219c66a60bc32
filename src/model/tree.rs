//! Decision tree and random forest classifiers.
//!
//! Trees are stored flattened: node `i` is described by the `i`-th entry
//! of each array and node 0 is the root. A node whose left child is `-1`
//! is a leaf.

use serde::{Deserialize, Serialize};

use crate::{EvalError, Label};

/// Child index marking a leaf
pub const LEAF: i64 = -1;

/// A single binary decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Expected row width; rows are only checked against the features the
    /// tree actually splits on when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_features: Option<usize>,
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    /// Split feature per node; ignored on leaves
    pub feature: Vec<i64>,
    /// Samples with `x[feature] <= threshold` go left
    pub threshold: Vec<f64>,
    /// Per-class sample weight `[negative, positive]` reaching each node
    pub value: Vec<[f64; 2]>,
}

impl DecisionTree {
    pub fn node_count(&self) -> usize {
        self.children_left.len()
    }

    fn is_leaf(&self, node: usize) -> bool {
        self.children_left[node] == LEAF
    }

    /// Index of the leaf `x` lands in
    fn leaf_of(&self, x: &[f64]) -> Result<usize, EvalError> {
        let mut node = 0;
        while !self.is_leaf(node) {
            let feature = self.feature[node] as usize;
            let value = x.get(feature).ok_or(EvalError::FeatureMismatch {
                expected: feature + 1,
                found: x.len(),
            })?;
            let child = if *value <= self.threshold[node] {
                self.children_left[node]
            } else {
                self.children_right[node]
            };
            node = child as usize;
        }
        Ok(node)
    }

    /// Normalised `[negative, positive]` probabilities at the leaf `x` reaches
    pub(crate) fn proba_one(&self, x: &[f64]) -> Result<[f64; 2], EvalError> {
        let [neg, pos] = self.value[self.leaf_of(x)?];
        let total = neg + pos;
        Ok([neg / total, pos / total])
    }

    /// Argmax of the leaf value; a tie predicts 0
    pub(crate) fn predict_one(&self, x: &[f64]) -> Result<Label, EvalError> {
        let [neg, pos] = self.value[self.leaf_of(x)?];
        Ok((pos > neg) as Label)
    }

    pub(crate) fn validate(&self, n_features: Option<usize>) -> Result<(), EvalError> {
        let n = self.node_count();
        if n == 0 {
            return Err(EvalError::InvalidModel("tree has no nodes".into()));
        }
        let lengths = [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ];
        if lengths.iter().any(|len| *len != n) {
            return Err(EvalError::InvalidModel(format!(
                "tree arrays have mismatched lengths: {} nodes, others {:?}",
                n, lengths
            )));
        }

        for node in 0..n {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == LEAF {
                if right != LEAF {
                    return Err(EvalError::InvalidModel(format!(
                        "node {} has a right child but no left child",
                        node
                    )));
                }
                let [neg, pos] = self.value[node];
                if !(neg.is_finite() && pos.is_finite() && neg >= 0.0 && pos >= 0.0 && neg + pos > 0.0) {
                    return Err(EvalError::InvalidModel(format!(
                        "leaf {} has unusable value [{}, {}]",
                        node, neg, pos
                    )));
                }
                continue;
            }

            // children come after their parent, which also rules out cycles
            for child in [left, right] {
                if child <= node as i64 || child >= n as i64 {
                    return Err(EvalError::InvalidModel(format!(
                        "node {} has child index {} outside {}..{}",
                        node,
                        child,
                        node + 1,
                        n
                    )));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || n_features.is_some_and(|width| feature as usize >= width) {
                return Err(EvalError::InvalidModel(format!(
                    "node {} splits on feature {} of {:?}",
                    node, feature, n_features
                )));
            }
            if self.threshold[node].is_nan() {
                return Err(EvalError::InvalidModel(format!("node {} has a NaN threshold", node)));
            }
        }
        Ok(())
    }
}

/// Trees whose averaged class probabilities decide the label. A tie
/// predicts 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_features: Option<usize>,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Declared width of the forest, or of its first tree that declares one
    pub fn width(&self) -> Option<usize> {
        self.n_features
            .or_else(|| self.trees.iter().find_map(|tree| tree.n_features))
    }

    /// Mean `[negative, positive]` probabilities over all trees
    pub(crate) fn proba_one(&self, x: &[f64]) -> Result<[f64; 2], EvalError> {
        let mut sum = [0.0, 0.0];
        for tree in &self.trees {
            let [neg, pos] = tree.proba_one(x)?;
            sum[0] += neg;
            sum[1] += pos;
        }
        let n = self.trees.len() as f64;
        Ok([sum[0] / n, sum[1] / n])
    }

    pub(crate) fn predict_one(&self, x: &[f64]) -> Result<Label, EvalError> {
        let [neg, pos] = self.proba_one(x)?;
        Ok((pos > neg) as Label)
    }

    pub(crate) fn validate(&self) -> Result<(), EvalError> {
        if self.trees.is_empty() {
            return Err(EvalError::InvalidModel("forest has no trees".into()));
        }
        let width = self.width();
        for tree in &self.trees {
            if tree.n_features.is_some() && tree.n_features != width {
                return Err(EvalError::InvalidModel(format!(
                    "tree expects {:?} features, forest {:?}",
                    tree.n_features, width
                )));
            }
            tree.validate(width)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Single-leaf tree with the given class weights
    pub(crate) fn leaf(neg: f64, pos: f64) -> DecisionTree {
        DecisionTree {
            n_features: None,
            children_left: vec![LEAF],
            children_right: vec![LEAF],
            feature: vec![-2],
            threshold: vec![-2.0],
            value: vec![[neg, pos]],
        }
    }

    /// One split on `feature`: `left` class at or below `threshold`, `right` above
    pub(crate) fn stump(feature: i64, threshold: f64, left: Label, right: Label) -> DecisionTree {
        let weights = |label: Label| if label == 1 { [0.0, 3.0] } else { [3.0, 0.0] };
        DecisionTree {
            n_features: None,
            children_left: vec![1, LEAF, LEAF],
            children_right: vec![2, LEAF, LEAF],
            feature: vec![feature, -2, -2],
            threshold: vec![threshold, -2.0, -2.0],
            value: vec![[3.0, 3.0], weights(left), weights(right)],
        }
    }

    #[test]
    fn test_tree_walk() {
        // x0 <= 1 ? (x1 <= 0 ? 0 : 1) : 1
        let tree = DecisionTree {
            n_features: Some(2),
            children_left: vec![1, 2, LEAF, LEAF, LEAF],
            children_right: vec![4, 3, LEAF, LEAF, LEAF],
            feature: vec![0, 1, -2, -2, -2],
            threshold: vec![1.0, 0.0, -2.0, -2.0, -2.0],
            value: vec![[2.0, 3.0], [2.0, 1.0], [2.0, 0.0], [0.0, 1.0], [0.0, 2.0]],
        };
        tree.validate(tree.n_features).unwrap();

        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.predict_one(&[1.0, 0.0]).unwrap(), 0);
        assert_eq!(tree.predict_one(&[1.0, 0.5]).unwrap(), 1);
        assert_eq!(tree.predict_one(&[2.0, -4.0]).unwrap(), 1);
    }

    #[test]
    fn test_leaf_argmax() {
        assert_eq!(leaf(1.0, 4.0).predict_one(&[]).unwrap(), 1);
        assert_eq!(leaf(4.0, 1.0).predict_one(&[]).unwrap(), 0);
        assert_eq!(leaf(2.0, 2.0).predict_one(&[]).unwrap(), 0);
        assert_eq!(leaf(1.0, 3.0).proba_one(&[]).unwrap(), [0.25, 0.75]);
    }

    #[test]
    fn test_short_row_is_an_error() {
        let tree = stump(2, 0.0, 0, 1);
        assert!(matches!(
            tree.predict_one(&[1.0]),
            Err(EvalError::FeatureMismatch { expected: 3, found: 1 })
        ));
    }

    #[test]
    fn test_tree_validate() {
        assert!(stump(0, 0.0, 0, 1).validate(Some(1)).is_ok());
        assert!(stump(1, 0.0, 0, 1).validate(Some(1)).is_err());
        assert!(stump(1, 0.0, 0, 1).validate(None).is_ok());

        let mut short = stump(0, 0.0, 0, 1);
        short.threshold.pop();
        assert!(matches!(short.validate(None), Err(EvalError::InvalidModel(_))));

        let mut out_of_range = stump(0, 0.0, 0, 1);
        out_of_range.children_right[0] = 3;
        assert!(out_of_range.validate(None).is_err());

        let mut cycle = stump(0, 0.0, 0, 1);
        cycle.children_left[0] = 0;
        assert!(cycle.validate(None).is_err());

        let mut half_leaf = stump(0, 0.0, 0, 1);
        half_leaf.children_right[1] = 2;
        assert!(half_leaf.validate(None).is_err());

        assert!(leaf(0.0, 0.0).validate(None).is_err());
    }

    #[test]
    fn test_forest_averages_probabilities() {
        // two weakly positive trees and one confident negative: a hard
        // vote says 1, the mean positive probability is only 0.4
        let forest = RandomForest {
            n_features: None,
            trees: vec![leaf(4.0, 6.0), leaf(4.0, 6.0), leaf(10.0, 0.0)],
        };
        let hard_votes = forest
            .trees
            .iter()
            .map(|tree| tree.predict_one(&[]).unwrap())
            .sum::<Label>();

        assert_eq!(hard_votes, 2);
        assert_eq!(forest.predict_one(&[]).unwrap(), 0);
        assert!((forest.proba_one(&[]).unwrap()[1] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_forest_tie_is_negative() {
        let forest = RandomForest {
            n_features: None,
            trees: vec![leaf(1.0, 3.0), leaf(3.0, 1.0)],
        };
        assert_eq!(forest.predict_one(&[0.0]).unwrap(), 0);
    }

    #[test]
    fn test_forest_validate() {
        let empty = RandomForest {
            n_features: Some(1),
            trees: vec![],
        };
        assert!(empty.validate().is_err());

        let mut tree = stump(0, 0.0, 0, 1);
        tree.n_features = Some(2);
        let disagreeing = RandomForest {
            n_features: Some(1),
            trees: vec![tree],
        };
        assert!(disagreeing.validate().is_err());

        let inherited = RandomForest {
            n_features: None,
            trees: vec![leaf(1.0, 0.0), DecisionTree { n_features: Some(3), ..stump(2, 0.0, 0, 1) }],
        };
        assert_eq!(inherited.width(), Some(3));
        assert!(inherited.validate().is_ok());
    }
}
