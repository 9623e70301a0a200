//! `${name}` placeholder expansion for SQL templates.
//!
//! SQL text is trimmed, then every `${key}` is replaced with the matching
//! variable. Positional SQL parameters (`?1`, `?`) are left untouched.

use crate::{CoreError, CoreResult};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// `${key}` with optional blanks around the key, or a `${` that is never
/// closed.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\{ \s* ([^}]*?) \s* \}     # ${key} (capture group 1)
        |
        \$\{ [^}]* $                 # unterminated ${
        ",
    )
    .expect("Invalid placeholder pattern")
});

/// Expand `${key}` placeholders in `template` using `vars`.
///
/// Fails with [`CoreError::UnknownVariable`] when a key has no value and
/// with [`CoreError::Config`] on an unterminated placeholder. When several
/// keys are missing the first one is reported.
pub fn expand(template: &str, vars: &BTreeMap<String, String>) -> CoreResult<String> {
    let template = template.trim();
    let mut errors = Vec::new();

    let expanded = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        let Some(key) = caps.get(1) else {
            errors.push(CoreError::Config(format!(
                "Unterminated placeholder in '{}'",
                template
            )));
            return String::new();
        };

        match vars.get(key.as_str()) {
            Some(value) => value.clone(),
            None => {
                errors.push(CoreError::UnknownVariable(key.as_str().to_string()));
                String::new()
            }
        }
    });

    match errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(expanded.into_owned()),
    }
}
