//! Per-model scoring and ensemble vote accumulation.

use log::debug;

use crate::dataset::Dataset;
use crate::metrics::{Confusion, Scores};
use crate::{Classifier, ErrorKind, ErrorMap, EvalError, Label};

/// One reported disagreement: the address as written in the dataset, and
/// its kind.
pub type Disagreement = (String, ErrorKind);

/// Outcome of running one classifier over the dataset
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReport {
    /// One label per dataset row, in row order
    pub predictions: Vec<Label>,
    pub confusion: Confusion,
    pub scores: Scores,
    /// Every disagreement in row order, duplicates included
    pub disagreements: Vec<Disagreement>,
    /// Disagreements keyed by decoded address, marking both kinds
    pub errors: ErrorMap,
}

/// Run `classifier` over `features`, print its metrics and every
/// disagreement with `targets`, and return its predictions.
///
/// `features` and `targets` must be row-aligned with `dataset`.
pub fn score_one(
    classifier: &dyn Classifier,
    dataset: &Dataset,
    features: &[Vec<f64>],
    targets: &[Label],
) -> Result<ModelReport, EvalError> {
    let predictions = classifier.predict(features)?;
    if predictions.len() != dataset.len() {
        return Err(EvalError::LengthMismatch {
            expected: dataset.len(),
            found: predictions.len(),
        });
    }

    let confusion = Confusion::from_labels(targets, &predictions)?;
    let scores = confusion.scores_or_zero();
    println!("{}", scores);

    let mut disagreements = Vec::new();
    let mut errors = ErrorMap::new();
    for (row, predicted) in dataset.rows().iter().zip(&predictions) {
        // true negatives are never reported
        if !row.is_positive() && *predicted != 1 {
            continue;
        }
        if let Some(kind) = ErrorKind::classify(row.is_positive(), *predicted == 1) {
            errors.insert(row.addr, kind);
            println!("Address: {}, Error: {}", row.address, kind);
            disagreements.push((row.address.clone(), kind));
        }
    }
    debug!(
        "{} disagreements over {} rows ({} distinct addresses)",
        disagreements.len(),
        dataset.len(),
        errors.len()
    );

    Ok(ModelReport {
        predictions,
        confusion,
        scores,
        disagreements,
        errors,
    })
}

/// Running per-row count of positive votes.
///
/// Threaded by value through each model evaluation:
///
/// ```rust
/// use decay_verdict::ensemble::VoteTally;
///
/// let tally = VoteTally::new().add(&[1, 0, 1]).unwrap().add(&[1, 1, 0]).unwrap();
/// assert_eq!(tally.votes(), &[2, 1, 1]);
/// assert_eq!(tally.models(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteTally {
    votes: Vec<u32>,
    models: usize,
}

impl VoteTally {
    /// An empty tally; the first `add` fixes the row count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one model's predictions into the tally.
    pub fn add(mut self, predictions: &[Label]) -> Result<Self, EvalError> {
        if self.models == 0 {
            self.votes = vec![0; predictions.len()];
        } else if predictions.len() != self.votes.len() {
            return Err(EvalError::LengthMismatch {
                expected: self.votes.len(),
                found: predictions.len(),
            });
        }

        for (vote, label) in self.votes.iter_mut().zip(predictions) {
            *vote += u32::from(*label);
        }
        self.models += 1;
        Ok(self)
    }

    /// Per-row vote totals; each lies in `0..=models()`.
    pub fn votes(&self) -> &[u32] {
        &self.votes
    }

    /// Number of prediction vectors folded in
    pub fn models(&self) -> usize {
        self.models
    }
}
