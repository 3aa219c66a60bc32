//! Disassembly listing codec and error annotation.
//!
//! Recognizes the two line shapes `llvm-objdump -d` emits that carry an
//! address, a function header and an instruction body line:
//!
//! ```text
//! 0000000000401000 <_start>:
//!   401000: 31 ed                        xorl    %ebp, %ebp
//! ```
//!
//! Both patterns are anchored at both ends, so partial matches are rejected.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use log::{debug, info};
use regex::Regex;

use crate::{Address, ErrorKind, ErrorMap, EvalError};

const HEADER_PATTERN: &str = r"^[0-9a-f]+ <[_.0-9a-zA-Z]*>:$";
const BODY_PATTERN: &str = r"^   [0-9a-f]+: [0-9a-f]{2} .*$";

/// Width of the indent in front of a body line's address
const BODY_INDENT: usize = 3;

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(HEADER_PATTERN).expect("valid header pattern"))
}

fn body_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(BODY_PATTERN).expect("valid body pattern"))
}

/// Parse a base-16 address. A `0x`/`0X` prefix and surrounding whitespace
/// are tolerated.
pub fn parse_hex(text: &str) -> Result<Address, EvalError> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    Address::from_str_radix(digits, 16).map_err(|_| EvalError::BadAddress(text.to_string()))
}

/// True iff `line` is exactly `<hex> <symbol>:`.
pub fn is_function_header(line: &str) -> bool {
    header_regex().is_match(line)
}

/// True iff `line` is three spaces, `<hex>: `, one byte of hex, a space,
/// then anything.
pub fn is_function_body(line: &str) -> bool {
    body_regex().is_match(line)
}

/// Address of a function header line: the token before the first space.
pub fn decode_header_address(line: &str) -> Result<Address, EvalError> {
    let token = line.split(' ').next().unwrap_or(line);
    parse_hex(token)
}

/// Address of an instruction body line: the text between the indent and
/// the first colon.
pub fn decode_body_address(line: &str) -> Result<Address, EvalError> {
    let rest = line
        .get(BODY_INDENT..)
        .ok_or_else(|| EvalError::BadAddress(line.to_string()))?;
    let token = rest.split(':').next().unwrap_or(rest);
    parse_hex(token)
}

/// Shape of a single listing line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineShape {
    /// Function header at the given address
    Header(Address),
    /// Instruction line at the given address
    Body(Address),
    /// Anything else; passed through untouched
    Other,
}

impl LineShape {
    /// Classify and decode a line
    pub fn of(line: &str) -> Result<Self, EvalError> {
        if is_function_header(line) {
            Ok(LineShape::Header(decode_header_address(line)?))
        } else if is_function_body(line) {
            Ok(LineShape::Body(decode_body_address(line)?))
        } else {
            Ok(LineShape::Other)
        }
    }
}

/// Which error kinds get marked on instruction body lines.
///
/// Header lines are always marked with whatever kind the map holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkPolicy {
    /// Only false positives are marked at instruction granularity
    #[default]
    FalsePositivesOnly,
    /// Every recorded kind is marked at instruction granularity
    AllKinds,
}

impl MarkPolicy {
    fn marks_body(&self, kind: ErrorKind) -> bool {
        match self {
            MarkPolicy::FalsePositivesOnly => kind == ErrorKind::FalsePositive,
            MarkPolicy::AllKinds => true,
        }
    }
}

/// Append the error marker for `kind` to `line`.
pub fn marker(line: &str, kind: ErrorKind) -> String {
    format!("{} #<{}>", line, kind)
}

/// Return the annotated form of `line`, or `None` when it stays unchanged.
pub fn mark_line(
    line: &str,
    errors: &ErrorMap,
    policy: MarkPolicy,
) -> Result<Option<String>, EvalError> {
    let kind = match LineShape::of(line)? {
        LineShape::Header(addr) => errors.get(addr),
        LineShape::Body(addr) => errors.get(addr).filter(|kind| policy.marks_body(*kind)),
        LineShape::Other => None,
    };
    Ok(kind.map(|kind| marker(line, kind)))
}

/// Result of annotating a listing in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedListing {
    /// Full rewritten listing text
    pub text: String,
    /// The lines that received a marker, in listing order
    pub marked: Vec<String>,
}

/// Annotate listing text.
///
/// Lines are split on `\n` or `\r\n` and rejoined with `\n`. A trailing
/// newline is emitted iff `source` ended with one, so re-annotating the
/// output with an empty map reproduces it exactly.
pub fn annotate_listing(
    source: &str,
    errors: &ErrorMap,
    policy: MarkPolicy,
) -> Result<AnnotatedListing, EvalError> {
    let mut lines = Vec::new();
    let mut marked = Vec::new();

    for (lineno, line) in source.lines().enumerate() {
        match mark_line(line, errors, policy)? {
            Some(annotated) => {
                debug!("line {}: {}", lineno + 1, annotated);
                marked.push(annotated.clone());
                lines.push(annotated);
            }
            None => lines.push(line.to_string()),
        }
    }

    let mut text = lines.join("\n");
    if source.ends_with('\n') {
        text.push('\n');
    }

    Ok(AnnotatedListing { text, marked })
}

/// Rewrite the listing at `source` into `output`, marking every line whose
/// address appears in `errors`. Each marked line is echoed to stdout.
///
/// # Returns
/// The number of marked lines.
pub fn annotate<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    errors: &ErrorMap,
    output: Q,
    policy: MarkPolicy,
) -> Result<usize, EvalError> {
    let text = fs::read_to_string(source.as_ref())?;
    let annotated = annotate_listing(&text, errors, policy)?;

    for line in &annotated.marked {
        println!("{}", line);
    }

    fs::write(output.as_ref(), &annotated.text)?;
    info!(
        "Marked {} lines of {} into {}",
        annotated.marked.len(),
        source.as_ref().display(),
        output.as_ref().display()
    );

    Ok(annotated.marked.len())
}
