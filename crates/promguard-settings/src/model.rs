use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `promguard.toml` schema v1.
///
/// This is a *user-facing* config model: it is intentionally permissive
/// so forward-compat is easy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PromguardConfigV1 {
    /// Optional schema string for tooling (`promguard.config.v1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// When to fail the lint: `bug` (default) or `warning`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_on: Option<String>,

    /// How many problems to emit before truncating the list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_problems: Option<u32>,

    /// Which rule files to read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parser: Option<ParserConfig>,

    /// Prometheus servers to probe.
    #[serde(default)]
    pub prometheus: Vec<PrometheusServerConfig>,

    /// Map of check name -> config.
    #[serde(default)]
    pub checks: BTreeMap<String, CheckConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParserConfig {
    /// Rule-file globs, relative to the lint root.
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PrometheusServerConfig {
    pub name: String,
    pub uri: String,

    /// Per-request timeout, e.g. `30s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Range-query window for the series check, e.g. `1w`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookback: Option<String>,

    /// Metric probed to tell whether the server is responding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_metric: Option<String>,

    /// Rule-file globs deployed to this server; empty means all.
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CheckConfig {
    /// Override preset enable/disable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}
