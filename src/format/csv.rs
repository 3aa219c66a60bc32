//! CSV report formatter

use crate::{ErrorMap, EvalError};
use super::ReportFormatter;

impl ReportFormatter for super::CsvFormatter {
    fn format(&self, errors: &ErrorMap) -> Result<String, EvalError> {
        let mut writer = ::csv::Writer::from_writer(Vec::new());
        writer.write_record(["address", "error"])?;

        for (addr, kind) in errors.iter() {
            writer.write_record([format!("0x{:x}", addr).as_str(), kind.tag()])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| EvalError::IoError(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
