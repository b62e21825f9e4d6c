//! Shared helpers for the opcall crates.
//!
//! - [`block_on_future`] drives async transport code from the synchronous
//!   dispatch path.
//! - [`build_path`] expands `{placeholder}` path templates with percent-encoded
//!   values.
//! - [`redact_sensitive`] masks credentials before they reach log output.
//! - [`expand_tilde`] resolves `~` in user supplied file paths.

pub mod async_runtime;
pub mod path_processing;
pub mod path_template;

pub use async_runtime::block_on_future;
pub use path_processing::expand_tilde;
pub use path_template::{build_path, encode_path_placeholder_value};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(authorization:\s*)(basic|bearer)?\s*([\w\-\.=:/+]+)",
        r"(?i)([A-Z0-9_]*?(KEY|TOKEN|SECRET|PASSWORD)=)([^\s]+)",
        r#"(?i)("(?:password|token)"\s*:\s*")([^"]*)"#,
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Redacts values that look like secrets in a string.
///
/// # Example
/// ```rust
/// use opcall_util::redact_sensitive;
///
/// let line = redact_sensitive("authorization: Bearer abc.def");
/// assert_eq!(line, "authorization: <redacted>");
///
/// let env = redact_sensitive("IONOS_TOKEN=abc123 other=1");
/// assert_eq!(env, "IONOS_TOKEN=<redacted> other=1");
/// ```
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for pattern in SENSITIVE_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &Captures| {
                let prefix = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                format!("{prefix}<redacted>")
            })
            .to_string();
    }
    redacted
}
