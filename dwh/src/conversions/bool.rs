use crate::bail;
use crate::error::{DwhResult, ErrorKind};

/// Parses the boolean spellings found in raw tables: `t`/`f`, `true`/`false`, `yes`/`no`
/// and `1`/`0`, case-insensitively.
pub fn parse_bool(s: &str) -> DwhResult<bool> {
    match s.trim().to_lowercase().as_str() {
        "t" | "true" | "yes" | "y" | "1" => Ok(true),
        "f" | "false" | "no" | "n" | "0" => Ok(false),
        _ => bail!(
            ErrorKind::ConversionError,
            "Invalid boolean value",
            format!("Boolean value must be true or false (received: {s})")
        ),
    }
}
