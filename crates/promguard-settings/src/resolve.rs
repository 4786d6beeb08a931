use crate::{model::PromguardConfigV1, presets};
use anyhow::Context;
use globset::Glob;
use promguard_checks::{CheckPolicy, EffectiveConfig, FailOn};
use promguard_types::parse_duration;
use std::collections::BTreeSet;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_LOOKBACK: Duration = Duration::from_secs(7 * 24 * 3600);
const DEFAULT_UPTIME_METRIC: &str = "up";
const DEFAULT_INCLUDE: &str = "**/*.{yml,yaml}";

#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub profile: Option<String>,
    pub fail_on: Option<String>,
    pub max_problems: Option<u32>,
}

/// A fully validated Prometheus server definition.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerSettings {
    pub name: String,
    pub uri: String,
    pub timeout: Duration,
    pub lookback: Duration,
    pub uptime_metric: String,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ResolvedConfig {
    pub effective: EffectiveConfig,
    pub servers: Vec<ServerSettings>,
    /// Rule-file globs for discovery.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

pub fn resolve_config(
    cfg: PromguardConfigV1,
    overrides: Overrides,
) -> anyhow::Result<ResolvedConfig> {
    let profile = overrides
        .profile
        .clone()
        .or(cfg.profile.clone())
        .unwrap_or_else(|| "strict".to_string());

    let mut effective = presets::preset(&profile);

    if let Some(mp) = overrides.max_problems.or(cfg.max_problems) {
        effective.max_problems = mp as usize;
    }

    // per-check overrides
    for (check_id, cc) in cfg.checks.iter() {
        let entry = effective
            .checks
            .entry(check_id.clone())
            .or_insert_with(CheckPolicy::disabled);
        if let Some(enabled) = cc.enabled {
            entry.enabled = enabled;
        }
    }

    // fail_on: CLI override wins over config.
    if let Some(fail_on) = overrides.fail_on.as_deref().or(cfg.fail_on.as_deref()) {
        effective.fail_on = parse_fail_on(fail_on)?;
    }

    let mut servers = Vec::new();
    let mut names: BTreeSet<&str> = BTreeSet::new();
    for server in &cfg.prometheus {
        if server.name.is_empty() {
            anyhow::bail!("prometheus server with empty name");
        }
        if !names.insert(server.name.as_str()) {
            anyhow::bail!("duplicate prometheus server name: {}", server.name);
        }
        validate_globs(&server.name, &server.include)?;
        validate_globs(&server.name, &server.exclude)?;
        servers.push(ServerSettings {
            name: server.name.clone(),
            uri: server.uri.clone(),
            timeout: parse_optional_duration(&server.timeout, DEFAULT_TIMEOUT)
                .with_context(|| format!("invalid timeout for prometheus {}", server.name))?,
            lookback: parse_optional_duration(&server.lookback, DEFAULT_LOOKBACK)
                .with_context(|| format!("invalid lookback for prometheus {}", server.name))?,
            uptime_metric: server
                .uptime_metric
                .clone()
                .unwrap_or_else(|| DEFAULT_UPTIME_METRIC.to_string()),
            include: server.include.clone(),
            exclude: server.exclude.clone(),
        });
    }

    let parser = cfg.parser.unwrap_or_default();
    let include = if parser.include.is_empty() {
        vec![DEFAULT_INCLUDE.to_string()]
    } else {
        parser.include
    };
    validate_globs("parser", &include)?;
    validate_globs("parser", &parser.exclude)?;

    Ok(ResolvedConfig {
        effective,
        servers,
        include,
        exclude: parser.exclude,
    })
}

fn parse_optional_duration(
    value: &Option<String>,
    default: Duration,
) -> anyhow::Result<Duration> {
    match value {
        Some(text) => Ok(parse_duration(text)?),
        None => Ok(default),
    }
}

fn validate_globs(what: &str, patterns: &[String]) -> anyhow::Result<()> {
    for pattern in patterns {
        Glob::new(pattern).with_context(|| format!("invalid glob for {what}: {pattern}"))?;
    }
    Ok(())
}

fn parse_fail_on(v: &str) -> anyhow::Result<FailOn> {
    match v {
        "bug" => Ok(FailOn::Bug),
        "warning" | "warn" => Ok(FailOn::Warning),
        other => anyhow::bail!("unknown fail_on: {other} (expected bug|warning)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_config_toml;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved =
            resolve_config(PromguardConfigV1::default(), Overrides::default()).expect("resolve");
        assert_eq!(resolved.effective.profile, "strict");
        assert_eq!(resolved.effective.fail_on, FailOn::Bug);
        assert!(resolved.effective.check_enabled("promql/series"));
        assert!(resolved.effective.check_enabled("rule/dependency"));
        assert!(resolved.servers.is_empty());
        assert_eq!(resolved.include, vec![DEFAULT_INCLUDE.to_string()]);
    }

    #[test]
    fn parses_and_resolves_a_full_config() {
        let cfg = parse_config_toml(
            r#"
schema = "promguard.config.v1"
profile = "warn"
max_problems = 50

[parser]
include = ["rules/**/*.yaml"]
exclude = ["rules/generated/**"]

[[prometheus]]
name = "prod"
uri = "https://prom.example.com"
timeout = "1m"
lookback = "2w"
uptime_metric = "prometheus_build_info"
exclude = ["rules/dev/**"]

[[prometheus]]
name = "dev"
uri = "https://prom-dev.example.com"

[checks."rule/dependency"]
enabled = false
"#,
        )
        .expect("parse");

        let resolved = resolve_config(cfg, Overrides::default()).expect("resolve");
        assert_eq!(resolved.effective.profile, "warn");
        assert_eq!(resolved.effective.fail_on, FailOn::Warning);
        assert_eq!(resolved.effective.max_problems, 50);
        assert!(resolved.effective.check_enabled("promql/series"));
        assert!(!resolved.effective.check_enabled("rule/dependency"));

        assert_eq!(resolved.servers.len(), 2);
        let prod = &resolved.servers[0];
        assert_eq!(prod.name, "prod");
        assert_eq!(prod.timeout, Duration::from_secs(60));
        assert_eq!(prod.lookback, Duration::from_secs(14 * 24 * 3600));
        assert_eq!(prod.uptime_metric, "prometheus_build_info");
        let dev = &resolved.servers[1];
        assert_eq!(dev.timeout, DEFAULT_TIMEOUT);
        assert_eq!(dev.lookback, DEFAULT_LOOKBACK);
        assert_eq!(dev.uptime_metric, "up");
    }

    #[test]
    fn overrides_win_over_config() {
        let cfg = parse_config_toml("profile = \"warn\"\nfail_on = \"warning\"\n").expect("parse");
        let resolved = resolve_config(
            cfg,
            Overrides {
                profile: Some("strict".to_string()),
                fail_on: Some("bug".to_string()),
                max_problems: Some(10),
            },
        )
        .expect("resolve");
        assert_eq!(resolved.effective.profile, "strict");
        assert_eq!(resolved.effective.fail_on, FailOn::Bug);
        assert_eq!(resolved.effective.max_problems, 10);
    }

    #[test]
    fn rejects_duplicate_server_names() {
        let cfg = parse_config_toml(
            "[[prometheus]]\nname = \"prod\"\nuri = \"http://a\"\n[[prometheus]]\nname = \"prod\"\nuri = \"http://b\"\n",
        )
        .expect("parse");
        let err = resolve_config(cfg, Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("duplicate prometheus server name"));
    }

    #[test]
    fn rejects_invalid_durations_and_globs() {
        let cfg = parse_config_toml(
            "[[prometheus]]\nname = \"prod\"\nuri = \"http://a\"\nlookback = \"bogus\"\n",
        )
        .expect("parse");
        let err = resolve_config(cfg, Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("invalid lookback"));

        let cfg =
            parse_config_toml("[parser]\ninclude = [\"[\"]\n").expect("parse");
        assert!(resolve_config(cfg, Overrides::default()).is_err());
    }

    #[test]
    fn unknown_fail_on_is_rejected() {
        let cfg = parse_config_toml("fail_on = \"never\"\n").expect("parse");
        let err = resolve_config(cfg, Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("unknown fail_on"));
    }
}
