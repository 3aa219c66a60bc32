//! JSON report formatter

use serde::Serialize;

use crate::{ErrorKind, ErrorMap, EvalError};
use super::ReportFormatter;

/// Serializable report entry
#[derive(Serialize)]
struct EntryJson {
    /// Address as `0x`-prefixed hex
    address: String,
    error: ErrorKind,
}

impl ReportFormatter for super::JsonFormatter {
    fn format(&self, errors: &ErrorMap) -> Result<String, EvalError> {
        let entries: Vec<EntryJson> = errors
            .iter()
            .map(|(addr, kind)| EntryJson {
                address: format!("0x{:x}", addr),
                error: kind,
            })
            .collect();

        Ok(serde_json::to_string_pretty(&entries)?)
    }
}
