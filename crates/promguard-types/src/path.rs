use camino::Utf8Path;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Canonical rule-file path used in problems and reports.
///
/// Multiple source paths (e.g. symlinks) may report under one `RulePath`.
/// Normalization rules are intentionally simple and deterministic:
/// - always forward slashes (`/`)
/// - no leading `./`
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct RulePath(String);

impl Default for RulePath {
    fn default() -> Self {
        RulePath::new(".")
    }
}

impl RulePath {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        let mut v = s.as_ref().replace('\\', "/");
        while v.starts_with("./") {
            v = v.trim_start_matches("./").to_string();
        }
        if v.is_empty() {
            v = ".".to_string();
        }
        Self(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RulePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Utf8Path> for RulePath {
    fn from(value: &Utf8Path) -> Self {
        RulePath::new(value.as_str())
    }
}
