//! Error report output formats

mod json;
mod csv;

use crate::{ErrorMap, EvalError};
use std::fmt;
use clap::ValueEnum;

/// Supported output formats for an error report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// The same `Address: .., Error: ..` lines printed while scoring
    #[default]
    Text,
    /// JSON array of address/error objects
    Json,
    /// CSV with an `address,error` header
    Csv,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Text => write!(f, "text"),
            ReportFormat::Json => write!(f, "json"),
            ReportFormat::Csv => write!(f, "csv"),
        }
    }
}

impl ReportFormat {
    /// Get a formatter for this report format
    pub fn get_formatter(&self) -> Box<dyn ReportFormatter> {
        match self {
            ReportFormat::Text => Box::new(TextFormatter),
            ReportFormat::Json => Box::new(JsonFormatter),
            ReportFormat::Csv => Box::new(CsvFormatter),
        }
    }
}

/// Formatter trait for error reports. Entries come out in ascending
/// address order.
pub trait ReportFormatter {
    fn format(&self, errors: &ErrorMap) -> Result<String, EvalError>;
}

/// Format a report as plain text
pub struct TextFormatter;

/// Format a report as JSON
pub struct JsonFormatter;

/// Format a report as CSV
pub struct CsvFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, errors: &ErrorMap) -> Result<String, EvalError> {
        let mut output = String::new();
        for (addr, kind) in errors.iter() {
            output.push_str(&format!("Address: 0x{:x}, Error: {}\n", addr, kind));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    pub(super) fn sample() -> ErrorMap {
        [
            (0x4010a0, ErrorKind::FalseNegative),
            (0x20, ErrorKind::FalsePositive),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_text_formatter() {
        let out = TextFormatter.format(&sample()).unwrap();
        assert_eq!(out, "Address: 0x20, Error: FP\nAddress: 0x4010a0, Error: FN\n");
    }

    #[test]
    fn test_json_formatter() {
        let out = JsonFormatter.format(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(
            value,
            serde_json::json!([
                {"address": "0x20", "error": "FP"},
                {"address": "0x4010a0", "error": "FN"}
            ])
        );
    }

    #[test]
    fn test_csv_formatter() {
        let out = CsvFormatter.format(&sample()).unwrap();
        assert_eq!(out, "address,error\n0x20,FP\n0x4010a0,FN\n");
    }

    #[test]
    fn test_empty_report() {
        let empty = ErrorMap::new();
        assert_eq!(TextFormatter.format(&empty).unwrap(), "");
        assert_eq!(JsonFormatter.format(&empty).unwrap(), "[]");
        assert_eq!(CsvFormatter.format(&empty).unwrap(), "address,error\n");
    }

    #[test]
    fn test_format_selection() {
        for format in ReportFormat::value_variants() {
            let parsed = ReportFormat::from_str(&format.to_string(), false).unwrap();
            assert_eq!(parsed, *format);
            assert!(format.get_formatter().format(&sample()).is_ok());
        }
        assert!(ReportFormat::from_str("yaml", false).is_err());
    }
}
