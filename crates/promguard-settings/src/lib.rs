//! Config parsing and profile/preset resolution.
//!
//! This crate is intentionally IO-free: it parses and resolves
//! configuration provided as strings.

#![forbid(unsafe_code)]

mod model;
mod presets;
mod resolve;

pub use model::{CheckConfig, ParserConfig, PromguardConfigV1, PrometheusServerConfig};
pub use resolve::{Overrides, ResolvedConfig, ServerSettings};

/// Parse `promguard.toml` (or equivalent) into a typed model.
pub fn parse_config_toml(input: &str) -> anyhow::Result<PromguardConfigV1> {
    let cfg: PromguardConfigV1 = toml::from_str(input)?;
    Ok(cfg)
}

/// Resolve the effective config used by the runner (profiles + overrides
/// + per-check and per-server config).
pub fn resolve_config(
    cfg: PromguardConfigV1,
    overrides: Overrides,
) -> anyhow::Result<ResolvedConfig> {
    resolve::resolve_config(cfg, overrides)
}
