//! End-to-end evaluation run: load the dataset, score each model, combine
//! the votes, and mark the listing.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::dataset::{Dataset, DatasetFormat};
use crate::ensemble::{score_one, ModelReport, VoteTally};
use crate::format::ReportFormat;
use crate::listing::{annotate, annotate_listing, MarkPolicy};
use crate::model::SavedModel;
use crate::summary::{check_threshold, summarize, Summary};

/// Everything one run needs
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Labeled feature table
    pub input_file: PathBuf,
    /// Encoding of `input_file`; guessed from the extension when `None`
    pub dataset_format: Option<DatasetFormat>,
    /// One serialized classifier per ensemble member
    pub saved_models: Vec<PathBuf>,
    /// Listing to annotate
    pub asm_source: PathBuf,
    /// Where the annotated listing goes
    pub marked_asm: PathBuf,
    /// Votes needed for an ensemble positive; all models when `None`
    pub threshold: Option<u32>,
    /// Optional extra copy of the ensemble error map
    pub report: Option<PathBuf>,
    pub report_format: ReportFormat,
    /// Directory for one annotated listing per model
    pub per_model_marks: Option<PathBuf>,
}

impl EvalConfig {
    /// Minimal configuration; optional outputs disabled.
    pub fn new<P: Into<PathBuf>>(
        input_file: P,
        saved_models: Vec<PathBuf>,
        asm_source: P,
        marked_asm: P,
    ) -> Self {
        Self {
            input_file: input_file.into(),
            dataset_format: None,
            saved_models,
            asm_source: asm_source.into(),
            marked_asm: marked_asm.into(),
            threshold: None,
            report: None,
            report_format: ReportFormat::default(),
            per_model_marks: None,
        }
    }

    /// The threshold actually applied
    pub fn effective_threshold(&self) -> u32 {
        self.threshold
            .unwrap_or(self.saved_models.len() as u32)
    }
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// One report per model, in the order given
    pub models: Vec<ModelReport>,
    pub summary: Summary,
    /// Number of listing lines that received a marker
    pub marked_lines: usize,
}

/// Annotated per-model listing path: `<dir>/<model stem>.asm`
fn per_model_path(dir: &Path, model: &Path, index: usize) -> PathBuf {
    let stem = model
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("model{}", index));
    dir.join(format!("{}.asm", stem))
}

/// Run the whole evaluation described by `config`.
pub fn run(config: &EvalConfig) -> Result<RunOutcome> {
    let threshold = config.effective_threshold();
    check_threshold(threshold, config.saved_models.len())?;

    let dataset = Dataset::load(&config.input_file, config.dataset_format)
        .with_context(|| format!("Failed to load dataset {}", config.input_file.display()))?;
    let features = dataset.feature_matrix();
    let targets = dataset.targets();

    let listing = match &config.per_model_marks {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            Some(fs::read_to_string(&config.asm_source).with_context(|| {
                format!("Failed to read listing {}", config.asm_source.display())
            })?)
        }
        None => None,
    };

    let mut tally = VoteTally::new();
    let mut models = Vec::with_capacity(config.saved_models.len());

    for (index, path) in config.saved_models.iter().enumerate() {
        println!("##### predict with model: {} ########", path.display());

        let model = SavedModel::load(path)
            .with_context(|| format!("Failed to load model {}", path.display()))?;
        let report = score_one(&model, &dataset, &features, &targets)
            .with_context(|| format!("Failed to score model {}", path.display()))?;

        if let (Some(dir), Some(text)) = (&config.per_model_marks, &listing) {
            let out = per_model_path(dir, path, index);
            let annotated = annotate_listing(text, &report.errors, MarkPolicy::AllKinds)?;
            fs::write(&out, &annotated.text)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Wrote {} marked lines to {}", annotated.marked.len(), out.display());
        }

        tally = tally.add(&report.predictions)?;
        models.push(report);
    }

    println!("##### start summary: ########");
    let summary = summarize(tally.votes(), &dataset, threshold)
        .context("Failed to summarize ensemble votes")?;

    let marked_lines = annotate(
        &config.asm_source,
        &summary.errors,
        &config.marked_asm,
        MarkPolicy::FalsePositivesOnly,
    )
    .with_context(|| format!("Failed to annotate {}", config.asm_source.display()))?;
    if marked_lines == 0 && !summary.errors.is_empty() {
        warn!(
            "{} misclassified addresses but no listing line matched any of them",
            summary.errors.len()
        );
    }

    if let Some(path) = &config.report {
        let text = config.report_format.get_formatter().format(&summary.errors)?;
        fs::write(path, text).with_context(|| format!("Failed to write report {}", path.display()))?;
        info!("Wrote {} report to {}", config.report_format, path.display());
    }

    Ok(RunOutcome {
        models,
        summary,
        marked_lines,
    })
}
