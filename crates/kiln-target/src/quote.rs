//! Quoting and escaping rules for target flag strings.
//!
//! Two characters are reserved: the quote `'` and the escape `\`. An escape
//! always protects exactly the character after it. A quote opens or closes a
//! quoted region in which separators lose their meaning.
//!
//! Interpretation peels off one level of quoting. A string that is entirely
//! enclosed in quotes has them stripped first. Escape sequences outside a
//! quoted region collapse to the escaped character; inside a quoted region
//! they are kept verbatim so that the region can be interpreted again at
//! the next nesting level. [`uninterpret`] is the exact inverse of
//! [`interpret`] on every string.

use crate::error::{Result, TargetError};

/// Quote character.
pub const QUOTE: char = '\'';
/// Escape character.
pub const ESCAPE: char = '\\';

/// Whether `s` is enclosed in a single pair of unescaped quotes.
///
/// The string must start and end with `'` and contain no unescaped `'` in
/// between. A final quote preceded by a dangling escape does not count as
/// closing.
pub fn is_quoted(s: &str) -> bool {
    let chars: Vec<char> = s.chars().collect();
    let n = chars.len();
    if n < 2 || chars[0] != QUOTE || chars[n - 1] != QUOTE {
        return false;
    }
    let mut escaping = false;
    for &c in &chars[1..n - 1] {
        if escaping {
            escaping = false;
        } else if c == ESCAPE {
            escaping = true;
        } else if c == QUOTE {
            return false;
        }
    }
    !escaping
}

/// Wrap `s` in quotes without touching its contents.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push(QUOTE);
    out.push_str(s);
    out.push(QUOTE);
    out
}

/// Escape every quote and escape character in `s`.
///
/// `interpret(&uninterpret(s)) == s` for all `s`.
pub fn uninterpret(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == QUOTE || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Remove one level of quoting from `s`.
///
/// Examples:
///
/// ```text
/// blah             -> blah
/// 'blah'           -> blah        enclosing quotes removed
/// 'bl'ah           -> 'bl'ah      non-enclosing quotes remain
/// '\'blah\''       -> 'blah'
/// ```
///
/// A trailing escape with nothing to protect is a value error.
pub fn interpret(s: &str) -> Result<String> {
    let body = if is_quoted(s) { &s[1..s.len() - 1] } else { s };

    let mut out = String::with_capacity(body.len());
    let mut inside_quote = false;
    let mut escaping = false;
    for c in body.chars() {
        if escaping {
            escaping = false;
        } else if c == ESCAPE {
            escaping = true;
            if !inside_quote {
                continue;
            }
        } else if c == QUOTE {
            inside_quote = !inside_quote;
        }
        out.push(c);
    }
    if escaping {
        return Err(TargetError::value_error(format!(
            "Trailing escape character in \"{s}\""
        )));
    }
    Ok(out)
}

/// Split `s` on `separator`, ignoring separators inside quoted regions.
///
/// An escape and the character after it are copied through as a unit.
/// Quotes are kept in the output tokens. Empty tokens are dropped.
///
/// # Panics
///
/// Panics if a quoted region is left open at the end of the string.
pub fn split_string(s: &str, separator: char) -> Vec<String> {
    let mut output = Vec::new();
    let mut word = String::new();
    let mut quoted = false;

    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == separator && !quoted {
            if !word.is_empty() {
                output.push(std::mem::take(&mut word));
            }
        } else if c == ESCAPE && chars.peek().is_some() {
            word.push(c);
            if let Some(next) = chars.next() {
                word.push(next);
            }
        } else {
            if c == QUOTE {
                quoted = !quoted;
            }
            word.push(c);
        }
    }

    assert!(!quoted, "Mismatched quotes '' in string: {s}");

    if !word.is_empty() {
        output.push(word);
    }
    output
}

/// Join `tokens` with `separator`.
///
/// # Panics
///
/// Panics if `separator` is the quote or escape character.
pub fn join_string<S: AsRef<str>>(tokens: &[S], separator: char) -> String {
    assert!(
        separator != QUOTE && separator != ESCAPE,
        "string join separator cannot be {QUOTE} or {ESCAPE}"
    );
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.push(separator);
        }
        out.push_str(token.as_ref());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_quoted_detection() {
        assert!(is_quoted(r"'a\'b'"));
        assert!(!is_quoted("'a'b'"));
        assert!(is_quoted("''"));
        assert!(!is_quoted("'"));
        assert!(!is_quoted("abc"));
        // closing quote is escaped
        assert!(!is_quoted(r"'abc\'"));
        assert!(is_quoted(r"'abc\\'"));
    }

    #[test]
    fn quote_wraps_verbatim() {
        assert_eq!(quote(r"a\'b"), r"'a\'b'");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn interpret_examples() {
        assert_eq!(interpret("blah").unwrap(), "blah");
        assert_eq!(interpret("'blah'").unwrap(), "blah");
        assert_eq!(interpret("'bl'ah").unwrap(), "'bl'ah");
        assert_eq!(interpret(r"'\'blah\''").unwrap(), "'blah'");
        assert_eq!(interpret(r"'\'\\\'blah\\\'\''").unwrap(), r"'\'blah\''");
        assert_eq!(interpret("").unwrap(), "");
    }

    #[test]
    fn interpret_keeps_escapes_inside_inner_quotes() {
        assert_eq!(interpret(r"'a,\'b',c").unwrap(), r"'a,\'b',c");
    }

    #[test]
    fn interpret_rejects_trailing_escape() {
        let err = interpret(r"abc\").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Value);
    }

    #[test]
    fn uninterpret_escapes_reserved() {
        assert_eq!(uninterpret(r"it's a \ test"), r"it\'s a \\ test");
        for s in ["", "'", "\\", r"\'", r"'\", "a'b\\c", "''\\\\"] {
            assert_eq!(interpret(&uninterpret(s)).unwrap(), s);
        }
    }

    #[test]
    fn split_respects_quotes() {
        assert_eq!(split_string("a,'b,c',d", ','), vec!["a", "'b,c'", "d"]);
        assert_eq!(split_string("llvm  -a=1 ", ' '), vec!["llvm", "-a=1"]);
        assert_eq!(split_string(r"a\,b,c", ','), vec![r"a\,b", "c"]);
        assert_eq!(split_string(r"-x='a \'b c' -y", ' '), vec![r"-x='a \'b c'", "-y"]);
        assert!(split_string("", ',').is_empty());
    }

    #[test]
    #[should_panic(expected = "Mismatched quotes")]
    fn split_unterminated_quote_panics() {
        split_string("a,'b,c", ',');
    }

    #[test]
    fn join_tokens() {
        assert_eq!(join_string(&["a", "b", "c"], ','), "a,b,c");
        assert_eq!(join_string::<&str>(&[], ','), "");
    }

    #[test]
    #[should_panic(expected = "separator cannot be")]
    fn join_rejects_quote_separator() {
        join_string(&["a"], '\'');
    }
}
