//! Protected-context policy
//!
//! Pages whose address starts with one of these prefixes never get a
//! detector and never receive fullscreen commands.

/// Built-in privileged scheme prefixes (compared case-insensitively)
pub const PROTECTED_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "devtools://",
    "view-source:",
    "about:",
    "edge://",
    "brave://",
];

/// Protected-context matcher with optional extra prefixes from configuration
#[derive(Debug, Clone, Default)]
pub struct ProtectedContexts {
    extra: Vec<String>,
}

impl ProtectedContexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add prefixes on top of the built-in list
    pub fn with_extra<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra.extend(
            prefixes
                .into_iter()
                .map(|p| p.as_ref().trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty()),
        );
        self
    }

    /// Check whether an address is excluded from all automated behavior
    pub fn is_protected(&self, url: &str) -> bool {
        let url = url.trim_start().to_ascii_lowercase();
        PROTECTED_PREFIXES
            .iter()
            .copied()
            .chain(self.extra.iter().map(String::as_str))
            .any(|prefix| url.starts_with(prefix))
    }
}
