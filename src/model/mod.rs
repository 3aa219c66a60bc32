//! Serialized classifier artifacts.
//!
//! A saved model is a JSON document tagged by `kind`:
//!
//! ```json
//! {"kind": "linear", "coef": [0.4, -1.2], "intercept": 0.1}
//! {"kind": "tree", "children_left": [1, -1, -1], "children_right": [2, -1, -1],
//!  "feature": [0, -2, -2], "threshold": [0.5, -2.0, -2.0],
//!  "value": [[5, 5], [1, 4], [4, 1]]}
//! {"kind": "forest", "n_features": 2, "trees": [ ... ]}
//! {"kind": "constant", "label": 0}
//! ```

mod linear;
mod tree;

pub use self::linear::*;
pub use self::tree::*;

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::{Classifier, EvalError, Label};

/// Any classifier that can be loaded from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SavedModel {
    Linear(LinearModel),
    Tree(DecisionTree),
    Forest(RandomForest),
    /// Baseline that ignores its input
    Constant { label: Label },
}

impl SavedModel {
    /// Load and validate a model file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EvalError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let model: SavedModel = serde_json::from_reader(reader)?;
        model.validate()?;
        info!("Loaded {} from {}", model, path.display());
        Ok(model)
    }

    /// Parse and validate a model from JSON text.
    pub fn from_json(text: &str) -> Result<Self, EvalError> {
        let model: SavedModel = serde_json::from_str(text)?;
        model.validate()?;
        Ok(model)
    }

    /// Check structural invariants the deserializer cannot express.
    pub fn validate(&self) -> Result<(), EvalError> {
        match self {
            SavedModel::Linear(m) => m.validate(),
            SavedModel::Tree(m) => m.validate(m.n_features),
            SavedModel::Forest(m) => m.validate(),
            SavedModel::Constant { label } if *label > 1 => Err(EvalError::InvalidModel(
                format!("constant label {} is not binary", label),
            )),
            SavedModel::Constant { .. } => Ok(()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SavedModel::Linear(_) => "linear",
            SavedModel::Tree(_) => "tree",
            SavedModel::Forest(_) => "forest",
            SavedModel::Constant { .. } => "constant",
        }
    }
}

impl fmt::Display for SavedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SavedModel::Linear(m) => write!(f, "linear model ({} features)", m.coef.len()),
            SavedModel::Tree(m) => write!(f, "decision tree ({} nodes)", m.node_count()),
            SavedModel::Forest(m) => write!(f, "random forest ({} trees)", m.trees.len()),
            SavedModel::Constant { label } => write!(f, "constant model ({})", label),
        }
    }
}

impl Classifier for SavedModel {
    fn n_features(&self) -> Option<usize> {
        match self {
            SavedModel::Linear(m) => Some(m.coef.len()),
            SavedModel::Tree(m) => m.n_features,
            SavedModel::Forest(m) => m.width(),
            SavedModel::Constant { .. } => None,
        }
    }

    fn predict_row(&self, row: &[f64]) -> Result<Label, EvalError> {
        self.check_width(row)?;
        match self {
            SavedModel::Linear(m) => Ok(m.predict_one(row)),
            SavedModel::Tree(m) => m.predict_one(row),
            SavedModel::Forest(m) => m.predict_one(row),
            SavedModel::Constant { label } => Ok(*label),
        }
    }
}
