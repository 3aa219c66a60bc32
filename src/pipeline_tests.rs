use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::format::ReportFormat;
use crate::pipeline::{run, EvalConfig};
use crate::{ErrorKind, EvalError};

const DATASET: &str = "\
module name,address,target,n
prog,0x10,1,0
prog,0x20,0,1
prog,0x30,1,2
prog,0x40,0,3
";

const LISTING: &str = "
prog:\tfile format elf64-x86-64

Disassembly of section .text:

10 <first>:
   10: 55                           pushq   %rbp
   11: c3                           retq

20 <second>:
   20: 90                           nop
   21: c3                           retq

30 <third>:
   30: c3                           retq

40 <fourth>:
   40: c3                           retq
";

/// Predicts [1, 1, 1, 0]
const FIRST_THREE: &str = r#"{"kind": "linear", "coef": [-1.0], "intercept": 2.5}"#;

/// Predicts [1, 0, 1, 0] via a depth-3 tree
const EXACT: &str = r#"{
    "kind": "tree",
    "n_features": 1,
    "children_left":  [1, -1, 3, -1, 5, -1, -1],
    "children_right": [2, -1, 4, -1, 6, -1, -1],
    "feature":   [0, -2, 0, -2, 0, -2, -2],
    "threshold": [0.5, -2.0, 1.5, -2.0, 2.5, -2.0, -2.0],
    "value": [[2, 2], [0, 1], [2, 1], [1, 0], [1, 1], [0, 1], [1, 0]]
}"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        ws.write("features.csv", DATASET);
        ws.write("prog.asm", LISTING);
        ws
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn config(&self, models: &[(&str, &str)]) -> EvalConfig {
        let models = models
            .iter()
            .map(|(name, body)| self.write(name, body))
            .collect();
        EvalConfig::new(
            self.path("features.csv"),
            models,
            self.path("prog.asm"),
            self.path("prog.marked.asm"),
        )
    }

    fn read(&self, path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }
}

#[test]
fn test_two_identical_models() {
    let ws = Workspace::new();
    let config = ws.config(&[("a.json", FIRST_THREE), ("b.json", FIRST_THREE)]);

    let outcome = run(&config).unwrap();

    assert_eq!(outcome.models.len(), 2);
    assert_eq!(outcome.summary.scores.accuracy, 0.75);
    assert_eq!(outcome.summary.scores.recall, 1.0);
    assert_eq!(outcome.summary.scores.precision, 2.0 / 3.0);
    assert_eq!(
        outcome.summary.errors.iter().collect::<Vec<_>>(),
        vec![(0x20, ErrorKind::FalsePositive)]
    );

    // header and first instruction of `second`
    assert_eq!(outcome.marked_lines, 2);
    let marked = ws.read(&config.marked_asm);
    assert!(marked.contains("\n20 <second>: #<FP>\n"));
    assert!(marked.contains("   20: 90                           nop #<FP>\n"));
    assert!(marked.contains("   21: c3                           retq\n"));
    assert!(marked.contains("\n10 <first>:\n"));
    assert_eq!(marked.lines().count(), LISTING.lines().count());
}

#[test]
fn test_unanimity_hides_single_dissent() {
    let ws = Workspace::new();
    let config = ws.config(&[("a.json", FIRST_THREE), ("b.json", EXACT)]);

    let outcome = run(&config).unwrap();

    assert_eq!(outcome.models[1].predictions, vec![1, 0, 1, 0]);
    assert!(outcome.models[1].errors.is_empty());
    assert!(outcome.summary.errors.is_empty());
    assert_eq!(outcome.summary.scores.precision, 1.0);
    assert_eq!(outcome.marked_lines, 0);
    assert_eq!(ws.read(&config.marked_asm), LISTING);
}

#[test]
fn test_lower_threshold_admits_single_vote() {
    let ws = Workspace::new();
    let mut config = ws.config(&[("a.json", FIRST_THREE), ("b.json", EXACT)]);
    config.threshold = Some(1);

    // votes are [2, 1, 2, 0]; one vote is enough
    let outcome = run(&config).unwrap();

    assert_eq!(outcome.summary.confusion.true_pos, 2);
    assert_eq!(
        outcome.summary.errors.iter().collect::<Vec<_>>(),
        vec![(0x20, ErrorKind::FalsePositive)]
    );
    assert_eq!(outcome.marked_lines, 2);
}

#[test]
fn test_false_negative_marks_header_only() {
    let ws = Workspace::new();
    // predicts [1, 0, 0, 0]
    let only_first = r#"{"kind": "tree", "n_features": 1,
        "children_left": [1, -1, -1], "children_right": [2, -1, -1],
        "feature": [0, -2, -2], "threshold": [0.5, -2.0, -2.0],
        "value": [[3, 1], [0, 1], [3, 0]]}"#;
    let config = ws.config(&[("tree.json", only_first)]);
    let outcome = run(&config).unwrap();

    assert_eq!(outcome.summary.errors.get(0x30), Some(ErrorKind::FalseNegative));
    let marked = ws.read(&config.marked_asm);
    assert!(marked.contains("\n30 <third>: #<FN>\n"));
    assert!(marked.contains("   30: c3                           retq\n"));
    assert!(!marked.contains("retq #<FN>"));
}

#[test]
fn test_per_model_marks_and_report() {
    let ws = Workspace::new();
    let mut config = ws.config(&[("first_three.json", FIRST_THREE), ("exact.json", EXACT)]);
    config.threshold = Some(1);
    config.per_model_marks = Some(ws.path("marks"));
    config.report = Some(ws.path("report.csv"));
    config.report_format = ReportFormat::Csv;

    run(&config).unwrap();

    let first = ws.read(&ws.path("marks").join("first_three.asm"));
    assert!(first.contains("20 <second>: #<FP>"));
    assert!(first.contains("   21: c3                           retq\n"));
    let exact = ws.read(&ws.path("marks").join("exact.asm"));
    assert_eq!(exact, LISTING);

    assert_eq!(
        ws.read(&ws.path("report.csv")),
        "address,error\n0x20,FP\n"
    );
}

#[test]
fn test_invalid_threshold() {
    let ws = Workspace::new();
    let mut config = ws.config(&[("a.json", FIRST_THREE)]);
    config.threshold = Some(2);

    let err = run(&config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EvalError>(),
        Some(EvalError::InvalidThreshold { threshold: 2, models: 1 })
    ));
    assert!(!config.marked_asm.exists());
}

#[test]
fn test_missing_model_is_fatal() {
    let ws = Workspace::new();
    let mut config = ws.config(&[("a.json", FIRST_THREE)]);
    config.saved_models.push(ws.path("missing.json"));

    let err = run(&config).unwrap_err();
    assert!(err.to_string().contains("missing.json"));
    assert!(!config.marked_asm.exists());
}

#[test]
fn test_zero_precision_is_fatal() {
    let ws = Workspace::new();
    let config = ws.config(&[("zero.json", r#"{"kind": "constant", "label": 0}"#)]);

    let err = run(&config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EvalError>(),
        Some(EvalError::ZeroDivision { metric: "precision" })
    ));
}

#[test]
fn test_jsonl_dataset() {
    let ws = Workspace::new();
    ws.write(
        "features.jsonl",
        concat!(
            "{\"module name\": \"prog\", \"address\": \"10\", \"target\": 1, \"n\": 0}\n",
            "{\"module name\": \"prog\", \"address\": \"20\", \"target\": 0, \"n\": 1}\n",
            "{\"module name\": \"prog\", \"address\": \"30\", \"target\": 1, \"n\": 2}\n",
            "{\"module name\": \"prog\", \"address\": \"40\", \"target\": 0, \"n\": 3}\n",
        ),
    );
    let mut config = ws.config(&[("a.json", FIRST_THREE)]);
    config.input_file = ws.path("features.jsonl");

    let outcome = run(&config).unwrap();
    assert_eq!(outcome.models[0].disagreements, vec![("20".to_string(), ErrorKind::FalsePositive)]);
}
