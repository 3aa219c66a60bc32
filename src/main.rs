use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use env_logger::Env;

use decay_verdict::dataset::DatasetFormat;
use decay_verdict::format::ReportFormat;
use decay_verdict::pipeline::{self, EvalConfig};

/// Score code/data classifiers against a labeled dataset and mark their
/// mistakes in a disassembly listing.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// The file to be predicted
    input_file: PathBuf,

    /// The trained models used for prediction
    #[arg(long = "saved_models", required = true, num_args = 1..)]
    saved_models: Vec<PathBuf>,

    /// The listing generated by `llvm-objdump -d`
    #[arg(long = "asm_source")]
    asm_source: PathBuf,

    /// Where to write the listing with prediction marks
    #[arg(long = "marked_asm")]
    marked_asm: PathBuf,

    /// Votes needed for a positive [default: number of models]
    #[arg(long)]
    threshold: Option<u32>,

    /// Dataset encoding [default: guessed from the extension]
    #[arg(long = "dataset_format", value_enum)]
    dataset_format: Option<DatasetFormat>,

    /// Also write the ensemble error map here
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(long = "report_format", value_enum, default_value_t = ReportFormat::Text)]
    report_format: ReportFormat,

    /// Write one listing per model, marked with that model's own errors
    #[arg(long = "per_model_marks")]
    per_model_marks: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl From<Cli> for EvalConfig {
    fn from(cli: Cli) -> Self {
        EvalConfig {
            input_file: cli.input_file,
            dataset_format: cli.dataset_format,
            saved_models: cli.saved_models,
            asm_source: cli.asm_source,
            marked_asm: cli.marked_asm,
            threshold: cli.threshold,
            report: cli.report,
            report_format: cli.report_format,
            per_model_marks: cli.per_model_marks,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    pipeline::run(&cli.into())?;
    Ok(())
}
