//! Linear decision-function classifier

use serde::{Deserialize, Serialize};

use crate::{EvalError, Label};

/// Weighted sum of features plus intercept, compared against a threshold.
///
/// ```text
/// label = 1  iff  intercept + Σ(coef[i] × x[i]) > threshold
/// ```
///
/// This covers logistic regression (threshold 0 on the log-odds) and
/// linear SVMs alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// One weight per feature
    pub coef: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub threshold: f64,
}

impl LinearModel {
    pub fn new(coef: Vec<f64>, intercept: f64) -> Self {
        Self {
            coef,
            intercept,
            threshold: 0.0,
        }
    }

    /// Raw decision value for a row of exactly `coef.len()` features
    pub(crate) fn decision(&self, x: &[f64]) -> f64 {
        self.intercept + self.coef.iter().zip(x).map(|(w, v)| w * v).sum::<f64>()
    }

    pub(crate) fn predict_one(&self, x: &[f64]) -> Label {
        (self.decision(x) > self.threshold) as Label
    }

    pub(crate) fn validate(&self) -> Result<(), EvalError> {
        if self.coef.is_empty() {
            return Err(EvalError::InvalidModel("linear model has no coefficients".into()));
        }
        if !self.coef.iter().chain([&self.intercept, &self.threshold]).all(|v| v.is_finite()) {
            return Err(EvalError::InvalidModel("linear model has non-finite weights".into()));
        }
        Ok(())
    }
}
