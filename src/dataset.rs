//! Labeled feature table loading.
//!
//! Each row carries an identifier block (`module name`, `address`,
//! `target`) followed by numeric feature columns. Rows are decoded once
//! into [`Row`] values; nothing downstream looks columns up by name.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use clap::ValueEnum;
use log::{debug, info};
use serde_json::{Map, Value};

use crate::listing::parse_hex;
use crate::{Address, EvalError, Label};

pub const MODULE_COLUMN: &str = "module name";
pub const ADDRESS_COLUMN: &str = "address";
pub const TARGET_COLUMN: &str = "target";
/// Stray row-index column left behind by some exporters; never a feature
pub const INDEX_COLUMN: &str = "index";

/// On-disk encoding of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatasetFormat {
    /// Comma-separated values with a header row
    Csv,
    /// One JSON object per line
    Jsonl,
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetFormat::Csv => write!(f, "csv"),
            DatasetFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

impl DatasetFormat {
    /// Guess the format from a file extension, defaulting to CSV.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .as_deref()
        {
            Some("jsonl") | Some("json") | Some("ndjson") => DatasetFormat::Jsonl,
            _ => DatasetFormat::Csv,
        }
    }
}

/// One labeled sample
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Module the address belongs to
    pub module: String,
    /// Address exactly as written in the dataset
    pub address: String,
    /// Decoded address
    pub addr: Address,
    /// Ground truth
    pub target: Label,
    /// Feature values in column order
    pub features: Vec<f64>,
}

impl Row {
    pub fn is_positive(&self) -> bool {
        self.target == 1
    }
}

/// An immutable, ordered set of rows sharing one feature layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    feature_names: Vec<String>,
    rows: Vec<Row>,
}

/// Positions of the identifier columns within a header
struct Layout {
    module: usize,
    address: usize,
    target: usize,
    features: Vec<(usize, String)>,
}

impl Layout {
    fn from_header<'a, I: IntoIterator<Item = &'a str>>(header: I) -> Result<Self, EvalError> {
        let mut module = None;
        let mut address = None;
        let mut target = None;
        let mut features = Vec::new();

        for (idx, name) in header.into_iter().enumerate() {
            match name {
                MODULE_COLUMN => module = Some(idx),
                ADDRESS_COLUMN => address = Some(idx),
                TARGET_COLUMN => target = Some(idx),
                INDEX_COLUMN => {}
                other => features.push((idx, other.to_string())),
            }
        }

        Ok(Self {
            module: module.ok_or(EvalError::MissingColumn(MODULE_COLUMN))?,
            address: address.ok_or(EvalError::MissingColumn(ADDRESS_COLUMN))?,
            target: target.ok_or(EvalError::MissingColumn(TARGET_COLUMN))?,
            features,
        })
    }
}

/// Read a 0/1 label. Float spellings such as `1.0` are accepted.
fn parse_target(row: usize, text: &str) -> Result<Label, EvalError> {
    let bad = || EvalError::BadTarget {
        row,
        value: text.to_string(),
    };
    let value: f64 = text.trim().parse().map_err(|_| bad())?;
    if value == 0.0 {
        Ok(0)
    } else if value == 1.0 {
        Ok(1)
    } else {
        Err(bad())
    }
}

fn parse_feature(row: usize, column: &str, text: &str) -> Result<f64, EvalError> {
    text.trim().parse().map_err(|_| EvalError::BadFeature {
        row,
        column: column.to_string(),
        value: text.to_string(),
    })
}

/// Render a JSON scalar the way it would appear in a CSV cell.
fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => (*b as u8).to_string(),
        other => other.to_string(),
    }
}

impl Dataset {
    /// Build a dataset from already decoded rows.
    ///
    /// Every row must carry `feature_names.len()` features.
    pub fn new(feature_names: Vec<String>, rows: Vec<Row>) -> Result<Self, EvalError> {
        if rows.is_empty() {
            return Err(EvalError::EmptyDataset);
        }
        if let Some(row) = rows.iter().find(|r| r.features.len() != feature_names.len()) {
            return Err(EvalError::FeatureMismatch {
                expected: feature_names.len(),
                found: row.features.len(),
            });
        }
        Ok(Self { feature_names, rows })
    }

    /// Load a dataset file. When `format` is `None` it is guessed from the
    /// file extension.
    pub fn load<P: AsRef<Path>>(path: P, format: Option<DatasetFormat>) -> Result<Self, EvalError> {
        let path = path.as_ref();
        let format = format.unwrap_or_else(|| DatasetFormat::from_path(path));
        info!("Loading {} dataset from {}", format, path.display());

        let file = File::open(path)?;
        let dataset = match format {
            DatasetFormat::Csv => Self::from_csv_reader(file)?,
            DatasetFormat::Jsonl => Self::from_jsonl_reader(BufReader::new(file))?,
        };

        info!(
            "Loaded {} rows with {} features ({} positive)",
            dataset.len(),
            dataset.n_features(),
            dataset.positives()
        );
        Ok(dataset)
    }

    /// Decode CSV with a header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, EvalError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let layout = Layout::from_header(rdr.headers()?.iter())?;

        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record?;
            let cell = |idx: usize| record.get(idx).unwrap_or("");

            let address = cell(layout.address).to_string();
            let features = layout
                .features
                .iter()
                .map(|(idx, name)| parse_feature(i, name, cell(*idx)))
                .collect::<Result<Vec<_>, _>>()?;

            rows.push(Row {
                module: cell(layout.module).to_string(),
                addr: parse_hex(&address)?,
                address,
                target: parse_target(i, cell(layout.target))?,
                features,
            });
        }
        debug!("Decoded {} CSV records", rows.len());

        let names = layout.features.into_iter().map(|(_, name)| name).collect();
        Self::new(names, rows)
    }

    /// Decode JSON Lines. The first object's key order fixes the feature
    /// order; blank lines are skipped.
    pub fn from_jsonl_reader<R: BufRead>(reader: R) -> Result<Self, EvalError> {
        let mut names: Option<Vec<String>> = None;
        let mut rows = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let i = rows.len();
            let object: Map<String, Value> = serde_json::from_str(&line)?;

            let names = names.get_or_insert_with(|| {
                object
                    .keys()
                    .filter(|k| {
                        ![MODULE_COLUMN, ADDRESS_COLUMN, TARGET_COLUMN, INDEX_COLUMN]
                            .contains(&k.as_str())
                    })
                    .cloned()
                    .collect()
            });

            let field = |name: &'static str| {
                object
                    .get(name)
                    .map(json_text)
                    .ok_or(EvalError::MissingColumn(name))
            };

            let address = field(ADDRESS_COLUMN)?;
            let mut features = Vec::with_capacity(names.len());
            for name in names.iter() {
                let value = object.get(name).map(json_text).unwrap_or_default();
                features.push(parse_feature(i, name, &value)?);
            }

            rows.push(Row {
                module: field(MODULE_COLUMN)?,
                addr: parse_hex(&address)?,
                address,
                target: parse_target(i, &field(TARGET_COLUMN)?)?,
                features,
            });
        }
        debug!("Decoded {} JSON records", rows.len());

        Self::new(names.unwrap_or_default(), rows)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Always false for a constructed dataset
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Count of rows labeled positive
    pub fn positives(&self) -> usize {
        self.rows.iter().filter(|r| r.is_positive()).count()
    }

    /// Feature matrix X, one vector per row in row order.
    pub fn feature_matrix(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|r| r.features.clone()).collect()
    }

    /// Label vector Y in row order.
    pub fn targets(&self) -> Vec<Label> {
        self.rows.iter().map(|r| r.target).collect()
    }
}
