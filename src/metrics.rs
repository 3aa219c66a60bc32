//! Binary classification metrics.
//!
//! accuracy = (TP + TN) / total, precision = TP / (TP + FP),
//! recall = TP / (TP + FN). Counts are taken over the whole set.

use std::fmt;

use log::warn;

use crate::{EvalError, Label};

/// Confusion counts for a binary classifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub true_pos: usize,
    pub true_neg: usize,
    pub false_pos: usize,
    pub false_neg: usize,
}

impl Confusion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one outcome
    pub fn record(&mut self, target: bool, predicted: bool) {
        match (target, predicted) {
            (true, true) => self.true_pos += 1,
            (false, false) => self.true_neg += 1,
            (false, true) => self.false_pos += 1,
            (true, false) => self.false_neg += 1,
        }
    }

    /// Build counts from aligned label vectors.
    pub fn from_labels(targets: &[Label], predictions: &[Label]) -> Result<Self, EvalError> {
        if targets.len() != predictions.len() {
            return Err(EvalError::LengthMismatch {
                expected: targets.len(),
                found: predictions.len(),
            });
        }
        let mut confusion = Self::new();
        for (t, p) in targets.iter().zip(predictions) {
            confusion.record(*t == 1, *p == 1);
        }
        Ok(confusion)
    }

    pub fn total(&self) -> usize {
        self.true_pos + self.true_neg + self.false_pos + self.false_neg
    }

    pub fn correct(&self) -> usize {
        self.true_pos + self.true_neg
    }

    pub fn accuracy(&self) -> Result<f64, EvalError> {
        ratio(self.correct(), self.total(), "accuracy")
    }

    pub fn precision(&self) -> Result<f64, EvalError> {
        ratio(self.true_pos, self.true_pos + self.false_pos, "precision")
    }

    pub fn recall(&self) -> Result<f64, EvalError> {
        ratio(self.true_pos, self.true_pos + self.false_neg, "recall")
    }

    /// All three scores; any zero denominator is an error.
    pub fn scores(&self) -> Result<Scores, EvalError> {
        Ok(Scores {
            accuracy: self.accuracy()?,
            recall: self.recall()?,
            precision: self.precision()?,
        })
    }

    /// All three scores, reporting 0.0 (with a warning) for an ill-defined
    /// ratio instead of failing.
    pub fn scores_or_zero(&self) -> Scores {
        let or_zero = |score: Result<f64, EvalError>| {
            score.unwrap_or_else(|e| {
                warn!("{}; reporting 0.0", e);
                0.0
            })
        };
        Scores {
            accuracy: or_zero(self.accuracy()),
            recall: or_zero(self.recall()),
            precision: or_zero(self.precision()),
        }
    }
}

fn ratio(num: usize, den: usize, metric: &'static str) -> Result<f64, EvalError> {
    if den == 0 {
        return Err(EvalError::ZeroDivision { metric });
    }
    Ok(num as f64 / den as f64)
}

/// Accuracy, recall and precision of one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores {
    pub accuracy: f64,
    pub recall: f64,
    pub precision: f64,
}

impl fmt::Display for Scores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A:R:P = {:.6}:{:.6}:{:.6}",
            self.accuracy, self.recall, self.precision
        )
    }
}
