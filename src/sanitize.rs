//! Parameter value sanitization
//!
//! Values are only ever echoed into cookies and URLs when they consist
//! entirely of ASCII letters, digits, `-` and `_`. Anything else is replaced
//! by [`REDACTED`] to prevent HTTP Parameter Pollution and injection.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Sentinel written in place of an unsanitary value
pub const REDACTED: &str = "redacted";

fn clean_value_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap())
}

/// True if `value` is non-empty and made only of allowed characters
pub fn is_clean(value: &str) -> bool {
    clean_value_regex().is_match(value)
}

/// Return `value` unchanged if clean, otherwise [`REDACTED`]
pub fn sanitize(value: &str) -> Cow<'_, str> {
    if is_clean(value) {
        Cow::Borrowed(value)
    } else {
        Cow::Borrowed(REDACTED)
    }
}
