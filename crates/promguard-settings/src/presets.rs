use promguard_checks::{CheckPolicy, EffectiveConfig, FailOn};
use promguard_types::ids;
use std::collections::BTreeMap;

/// Preset profiles are opinionated defaults.
///
/// Keep these small and readable. Anything complex should go into repo
/// config.
pub fn preset(profile: &str) -> EffectiveConfig {
    match profile {
        "warn" => warn_profile(),
        // default
        _ => strict_profile(),
    }
}

fn strict_profile() -> EffectiveConfig {
    EffectiveConfig {
        profile: "strict".to_string(),
        fail_on: FailOn::Bug,
        max_problems: 200,
        checks: default_checks(),
    }
}

/// CI posture where warnings also break the run.
fn warn_profile() -> EffectiveConfig {
    EffectiveConfig {
        profile: "warn".to_string(),
        fail_on: FailOn::Warning,
        max_problems: 200,
        checks: default_checks(),
    }
}

fn default_checks() -> BTreeMap<String, CheckPolicy> {
    let mut m = BTreeMap::new();
    for check in ids::ALL_CHECKS {
        m.insert(check.to_string(), CheckPolicy::enabled());
    }
    m
}
