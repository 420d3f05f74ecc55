//! Parameterized relational statements.
//!
//! Values are never formatted into statement text. A statement carries a
//! template with client-variable placeholders and a list of bindings that
//! the executor hands to the client as `-v name=value` arguments:
//!
//! - `:'name'` expands to `value` as a quoted, escaped string literal
//! - `:"name"` expands to `value` as a quoted identifier
//!
//! The client performs the quoting, so a value containing quotes or
//! semicolons can only ever be data.

/// A single statement plus its parameter bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    text: String,
    params: Vec<(&'static str, String)>,
}

impl Statement {
    /// Create a statement from a template.
    ///
    /// A trailing `;` is dropped; the executor adds its own terminator.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let trimmed = text.trim().trim_end_matches(';').trim_end();
        Self {
            text: trimmed.to_owned(),
            params: Vec::new(),
        }
    }

    /// Bind `value` to the placeholder `name`.
    #[must_use]
    pub fn bind(mut self, name: &'static str, value: impl ToString) -> Self {
        self.params.push((name, value.to_string()));
        self
    }

    /// The template text exactly as written (minus any trailing `;`).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Bound parameters in binding order.
    pub fn params(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.params.iter().map(|(name, value)| (*name, value.as_str()))
    }

    /// The first parameter name that is not a plain identifier, if any.
    ///
    /// Valid names start with an ASCII letter or `_` and continue with
    /// ASCII alphanumerics or `_`.
    pub fn invalid_parameter(&self) -> Option<&'static str> {
        self.params
            .iter()
            .map(|(name, _)| *name)
            .find(|name| !is_identifier(name))
    }

    /// The script fed to the client on standard input.
    pub fn script(&self) -> String {
        format!("{};\n", self.text)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
