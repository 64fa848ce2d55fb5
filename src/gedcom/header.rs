use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Characters permitted inside an `@...@` cross-reference.
pub const REGEX_XREF: &str = "[A-Za-z0-9:_.-]{1,20}";

/// Record and fact tags, including `_` extension tags.
pub const REGEX_TAG: &str = "[_A-Z][_A-Z0-9]*";

static LEVEL_ZERO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^0(?: @({REGEX_XREF})@)? ([_A-Z0-9]+)(?: .*)?$"))
        .expect("level-0 pattern is a valid regex")
});

/// The first line of an encoded record is not `0 [@xref@ ]TAG`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid GEDCOM record: {first_line:?}")]
pub struct MalformedRecordError {
    pub first_line: String,
}

impl MalformedRecordError {
    fn new(gedcom: &str) -> Self {
        Self {
            first_line: first_line(gedcom).to_string(),
        }
    }
}

/// Parsed level-0 line of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader<'a> {
    pub xref: Option<&'a str>,
    pub tag: &'a str,
}

fn first_line(gedcom: &str) -> &str {
    gedcom.lines().next().unwrap_or("").trim_end_matches('\r')
}

pub fn parse_header(gedcom: &str) -> Result<RecordHeader<'_>, MalformedRecordError> {
    let line = first_line(gedcom);
    let captures = LEVEL_ZERO
        .captures(line)
        .ok_or_else(|| MalformedRecordError::new(gedcom))?;

    match captures.get(2) {
        Some(tag) => Ok(RecordHeader {
            xref: captures.get(1).map(|m| m.as_str()),
            tag: tag.as_str(),
        }),
        None => Err(MalformedRecordError::new(gedcom)),
    }
}

/// Extract the record type tag from the first line of a record.
pub fn extract_type(gedcom: &str) -> Result<String, MalformedRecordError> {
    parse_header(gedcom).map(|header| header.tag.to_string())
}

/// The xref embedded in the first line, or `default` when the line has none
/// or cannot be parsed.
pub fn extract_xref(gedcom: &str, default: &str) -> String {
    parse_header(gedcom)
        .ok()
        .and_then(|header| header.xref)
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_type_with_and_without_xref() {
        assert_eq!(extract_type("0 @X123@ INDI").unwrap(), "INDI");
        assert_eq!(extract_type("0 INDI").unwrap(), "INDI");
        assert_eq!(extract_type("0 @X1@ INDI\n1 NAME John /Doe/").unwrap(), "INDI");
        assert_eq!(extract_type("0 @N1@ NOTE Some text\r\n1 CONT more").unwrap(), "NOTE");
    }

    #[test]
    fn test_extract_type_extension_tag() {
        assert_eq!(extract_type("0 @L1@ _LOC").unwrap(), "_LOC");
        assert_eq!(extract_type("0 @X9@ _CUSTOM_TAG").unwrap(), "_CUSTOM_TAG");
    }

    #[test]
    fn test_extract_type_malformed() {
        assert!(extract_type("").is_err());
        assert!(extract_type("garbage").is_err());
        assert!(extract_type("0 @X1@").is_err());
        assert!(extract_type("1 NAME John").is_err());
        assert!(extract_type("0 @X1 INDI").is_err());
        assert!(extract_type("0 indi").is_err());

        let err = extract_type("garbage\n1 NAME x").unwrap_err();
        assert_eq!(err.first_line, "garbage");
        assert!(err.to_string().contains("Invalid GEDCOM record"));
    }

    #[test]
    fn test_extract_xref() {
        assert_eq!(extract_xref("0 @I42@ INDI", "X"), "I42");
        assert_eq!(extract_xref("0 HEAD", "HEAD"), "HEAD");
        assert_eq!(extract_xref("", "fallback"), "fallback");
    }
}
