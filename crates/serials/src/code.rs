use serde::{Deserialize, Serialize};

use serialtrack_core::{DomainError, DomainResult, ValueObject};

/// Minimum digit width of generated suffixes (`ABC-001`).
pub const MIN_SUFFIX_WIDTH: usize = 3;

/// Normalized serial code: trimmed and uppercased, never empty.
///
/// Uniqueness is global (across all products) and enforced by storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerialCode(String);

impl ValueObject for SerialCode {}

impl SerialCode {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let code = raw.trim();
        if code.is_empty() {
            return Err(DomainError::validation("serial code cannot be empty"));
        }
        Ok(Self(code.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl core::fmt::Display for SerialCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric suffix of a generated code.
///
/// `code` must start with `"{base}-"`; the suffix is the longest run of ASCII
/// digits at the end of the code. Returns `None` when the prefix does not match,
/// when there are no trailing digits, or when the number does not fit in `u64`.
///
/// ```text
/// parse_suffix("ABC-007", "ABC")   == Some(7)
/// parse_suffix("ABC-X12", "ABC")   == Some(12)
/// parse_suffix("ABC-1000", "ABC")  == Some(1000)
/// parse_suffix("ABCD-001", "ABC")  == None
/// parse_suffix("ABC-", "ABC")      == None
/// ```
pub fn parse_suffix(code: &str, base: &str) -> Option<u64> {
    let rest = code.strip_prefix(base)?.strip_prefix('-')?;

    let digits_at = rest
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;

    rest[digits_at..].parse().ok()
}

/// Generated code for suffix `n`, zero-padded to [`MIN_SUFFIX_WIDTH`] digits.
pub fn format_code(base: &str, n: u64) -> SerialCode {
    SerialCode(format!("{base}-{n:0width$}", width = MIN_SUFFIX_WIDTH))
}
