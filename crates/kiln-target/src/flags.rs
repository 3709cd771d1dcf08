//! Attribute flag tokens of a raw target string.
//!
//! After the kind name, a raw target string is a sequence of
//! `-key=value`, `-key value` or bare `-flag` tokens.

use crate::error::{Result, TargetError};

/// A key/value pair recovered from one or two flag tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagPair {
    /// Attribute key, without leading dashes.
    pub key: String,
    /// Raw, still-quoted attribute value.
    pub value: String,
    /// Number of tokens consumed (1 or 2).
    pub consumed: usize,
}

/// Strip the leading run of `-` from an attribute token.
///
/// Tokens without a leading dash, or consisting only of dashes, are
/// rejected.
pub fn strip_dashes(token: &str) -> Result<&str> {
    let rest = token.trim_start_matches('-');
    if rest.len() == token.len() {
        return Err(TargetError::value_error(format!(
            "Attribute keys should start with '-', not an attribute key: {token}"
        )));
    }
    if rest.is_empty() {
        return Err(TargetError::value_error(format!(
            "Not an attribute key: {token}"
        )));
    }
    Ok(rest)
}

/// Decide how the dash-stripped token `s` pairs with the next raw token.
///
/// - `key=value` consumes one token; both halves must be non-empty.
/// - `key value` consumes two tokens when `next` is present and is not
///   itself a flag.
/// - otherwise `key` is a boolean flag with value `"1"`.
pub fn parse_kv_pair(s: &str, next: &str) -> Result<FlagPair> {
    if let Some((key, value)) = s.split_once('=') {
        if key.is_empty() || value.is_empty() {
            return Err(TargetError::value_error(format!(
                "Empty attribute key or value in \"{s}\""
            )));
        }
        return Ok(FlagPair {
            key: key.to_string(),
            value: value.to_string(),
            consumed: 1,
        });
    }
    if !next.is_empty() && !next.starts_with('-') {
        return Ok(FlagPair {
            key: s.to_string(),
            value: next.to_string(),
            consumed: 2,
        });
    }
    Ok(FlagPair {
        key: s.to_string(),
        value: "1".into(),
        consumed: 1,
    })
}
