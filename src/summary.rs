//! Ensemble decision and aggregate metrics.
//!
//! A row is an ensemble positive iff its vote total reaches the threshold,
//! which defaults to the number of models (a unanimous vote).

use log::{debug, info};

use crate::dataset::Dataset;
use crate::metrics::{Confusion, Scores};
use crate::{ErrorKind, ErrorMap, EvalError};

/// Aggregate outcome of the ensemble
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub confusion: Confusion,
    pub scores: Scores,
    /// Misclassified addresses
    pub errors: ErrorMap,
}

/// Check that `threshold` is reachable with `models` voters.
pub fn check_threshold(threshold: u32, models: usize) -> Result<(), EvalError> {
    if threshold == 0 || threshold as usize > models {
        return Err(EvalError::InvalidThreshold { threshold, models });
    }
    Ok(())
}

/// Turn vote totals into ensemble decisions, print the aggregate metrics,
/// each error, and the resulting error map.
///
/// # Errors
/// `LengthMismatch` when `votes` is not row-aligned with `dataset`, and
/// `ZeroDivision` when recall or precision is undefined.
pub fn summarize(votes: &[u32], dataset: &Dataset, threshold: u32) -> Result<Summary, EvalError> {
    if votes.len() != dataset.len() {
        return Err(EvalError::LengthMismatch {
            expected: dataset.len(),
            found: votes.len(),
        });
    }

    let mut confusion = Confusion::new();
    let mut errors = ErrorMap::new();

    for (row, total) in dataset.rows().iter().zip(votes) {
        let predicted = *total >= threshold;
        confusion.record(row.is_positive(), predicted);

        if let Some(kind) = ErrorKind::classify(row.is_positive(), predicted) {
            errors.insert(row.addr, kind);
            println!("Address: {}, Error: {}", row.address, kind);
        }
    }
    debug!("Ensemble confusion: {:?}", confusion);

    let scores = confusion.scores()?;
    println!("{}", scores);
    println!("{}", errors);
    info!(
        "Ensemble flagged {} false positives and {} false negatives",
        errors.count(ErrorKind::FalsePositive),
        errors.count(ErrorKind::FalseNegative)
    );

    Ok(Summary {
        confusion,
        scores,
        errors,
    })
}
