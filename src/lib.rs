//! Core types, traits, and error handling for the Decay Verdict evaluator.
//!
//! This library scores one or more pre-trained code/data classifiers against a
//! labeled table of disassembled addresses, combines their votes into an
//! ensemble decision, and marks the misclassified addresses in an
//! `objdump -d` style listing.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use decay_verdict::{
//!     dataset::Dataset,
//!     ensemble::{score_one, VoteTally},
//!     listing::{annotate, MarkPolicy},
//!     model::SavedModel,
//!     summary::summarize,
//! };
//!
//! // Load the labeled rows once
//! let dataset = Dataset::load("features.csv", None).unwrap();
//! let features = dataset.feature_matrix();
//! let targets = dataset.targets();
//!
//! // Score every model and accumulate its votes
//! let mut tally = VoteTally::new();
//! for path in ["a.json", "b.json"] {
//!     let model = SavedModel::load(path).unwrap();
//!     let report = score_one(&model, &dataset, &features, &targets).unwrap();
//!     tally = tally.add(&report.predictions).unwrap();
//! }
//!
//! // Unanimous vote, then mark the listing
//! let summary = summarize(tally.votes(), &dataset, tally.models() as u32).unwrap();
//! annotate("prog.asm", &summary.errors, "prog.marked.asm", MarkPolicy::FalsePositivesOnly).unwrap();
//! ```

pub mod listing;
pub mod dataset;
pub mod model;
pub mod metrics;
pub mod ensemble;
pub mod summary;
pub mod format;
pub mod pipeline;
#[cfg(test)]
mod pipeline_tests;

/// Represents an address in the disassembled image
pub type Address = u64;

/// Binary class label: 1 for code, 0 for everything else
pub type Label = u8;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Kind of misclassification recorded against an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Predicted positive, labeled negative
    #[serde(rename = "FP")]
    FalsePositive,
    /// Labeled positive, predicted negative
    #[serde(rename = "FN")]
    FalseNegative,
}

impl ErrorKind {
    /// Short tag used in reports and listing markers.
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorKind::FalsePositive => "FP",
            ErrorKind::FalseNegative => "FN",
        }
    }

    /// Classify one (target, prediction) pair. `None` when they agree.
    pub fn classify(target: bool, predicted: bool) -> Option<Self> {
        match (target, predicted) {
            (true, false) => Some(ErrorKind::FalseNegative),
            (false, true) => Some(ErrorKind::FalsePositive),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Decoded address to error kind. Only misclassified rows are present.
///
/// A later row with the same address overwrites an earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorMap {
    entries: BTreeMap<Address, ErrorKind>,
}

impl ErrorMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `kind` for `addr`, returning the kind it replaced, if any.
    pub fn insert(&mut self, addr: Address, kind: ErrorKind) -> Option<ErrorKind> {
        self.entries.insert(addr, kind)
    }

    pub fn get(&self, addr: Address) -> Option<ErrorKind> {
        self.entries.get(&addr).copied()
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.entries.contains_key(&addr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending address order
    pub fn iter(&self) -> impl Iterator<Item = (Address, ErrorKind)> + '_ {
        self.entries.iter().map(|(addr, kind)| (*addr, *kind))
    }

    /// Number of entries of a given kind
    pub fn count(&self, kind: ErrorKind) -> usize {
        self.entries.values().filter(|k| **k == kind).count()
    }
}

impl FromIterator<(Address, ErrorKind)> for ErrorMap {
    fn from_iter<I: IntoIterator<Item = (Address, ErrorKind)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ErrorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (addr, kind)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "0x{:x}: {}", addr, kind)?;
        }
        write!(f, "}}")
    }
}

/// Classifier trait: a trained binary model over numeric feature vectors.
pub trait Classifier {
    /// Number of features the model was trained on, if it knows.
    fn n_features(&self) -> Option<usize>;

    /// Predict the label of a single feature vector.
    ///
    /// Implementations reject a row of the wrong width instead of reading
    /// past it, usually through [`Classifier::check_width`].
    fn predict_row(&self, row: &[f64]) -> Result<Label, EvalError>;

    /// `FeatureMismatch` unless `row` has [`Classifier::n_features`] entries.
    fn check_width(&self, row: &[f64]) -> Result<(), EvalError> {
        match self.n_features() {
            Some(expected) if row.len() != expected => Err(EvalError::FeatureMismatch {
                expected,
                found: row.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Predict one label per row, in row order.
    ///
    /// # Returns
    /// A vector the same length as `features`, or the first row's error.
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Label>, EvalError> {
        features.iter().map(|row| self.predict_row(row)).collect()
    }
}

/// Error type for evaluation operations
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Address text is not a base-16 integer
    #[error("Invalid hexadecimal address: {0:?}")]
    BadAddress(String),

    /// Dataset is missing a required column
    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),

    /// Target column holds something other than 0 or 1
    #[error("Invalid target label {value:?} at row {row}")]
    BadTarget { row: usize, value: String },

    /// Feature cell could not be read as a number
    #[error("Non-numeric value {value:?} in column {column:?} at row {row}")]
    BadFeature {
        row: usize,
        column: String,
        value: String,
    },

    /// Dataset holds no rows
    #[error("Dataset contains no rows")]
    EmptyDataset,

    /// Model and dataset disagree on the feature count
    #[error("Model expects {expected} features, dataset provides {found}")]
    FeatureMismatch { expected: usize, found: usize },

    /// A prediction vector does not line up with the dataset
    #[error("Prediction length {found} does not match {expected} rows")]
    LengthMismatch { expected: usize, found: usize },

    /// Serialized model is structurally invalid
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Vote threshold outside `1..=models`
    #[error("Vote threshold {threshold} is outside 1..={models}")]
    InvalidThreshold { threshold: u32, models: usize },

    /// Metric denominator is zero
    #[error("Division by zero computing {metric}")]
    ZeroDivision { metric: &'static str },

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
