//! dcd-config
//!
//! Layered YAML configuration.
//! - Later layers override earlier ones (deep merge of mappings)
//! - Canonical JSON + SHA-256 hash identifies a run's effective config
//! - Literal secrets are rejected; keys are referenced by env var name
//! - Unused-key report flags leaves no command reads

mod secrets;
mod strategy;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

pub use secrets::{resolve_api_key, ResolvedApiKey};
pub use strategy::{DataSource, StrategyConfig, SweepSpec};

/// Secret-like prefixes. A leaf string starting with one of these aborts the
/// load with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",
    "sk_live",
    "sk_test",
    "AKIA",
    "-----BEGIN",
    "ghp_",
    "gho_",
    "glpat-",
    "xoxb-",
    "xoxp-",
];

/// Which command is reading the config; decides the consumed-key registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Backtest,
    Sweep,
    Rank,
    Fetch,
}

impl ConfigMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigMode::Backtest => "BACKTEST",
            ConfigMode::Sweep => "SWEEP",
            ConfigMode::Rank => "RANK",
            ConfigMode::Fetch => "FETCH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub mode: String,
    pub consumed_prefixes: Vec<String>,
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

const UNIVERSE_AND_DATA: &[&str] = &["/universe", "/data"];

/// JSON-pointer prefixes each mode actually reads.
///
/// Keep in sync with `StrategyConfig::from_config_json` and the CLI.
pub fn consumed_pointers_for_mode(mode: ConfigMode) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = UNIVERSE_AND_DATA.to_vec();
    match mode {
        ConfigMode::Backtest => out.extend(["/strategy", "/baseline"]),
        ConfigMode::Sweep => out.extend(["/strategy", "/sweep"]),
        ConfigMode::Rank | ConfigMode::Fetch => {}
    }
    out
}

/// Report config leaves outside every prefix `mode` reads.
/// With `UnusedKeyPolicy::Fail`, any such leaf is an error.
pub fn report_unused_keys(
    mode: ConfigMode,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<&str> = consumed_pointers_for_mode(mode).into_iter().collect();

    let unused: BTreeSet<String> = leaves(config_json)
        .into_iter()
        .map(|(ptr, _)| ptr)
        .filter(|ptr| !consumed.iter().any(|c| covers(c, ptr)))
        .collect();

    let report = UnusedKeyReport {
        mode: mode.as_str().to_string(),
        consumed_prefixes: consumed.iter().map(|c| c.to_string()).collect(),
        unused_leaf_pointers: unused.into_iter().collect(),
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let shown: Vec<&String> = report.unused_leaf_pointers.iter().take(12).collect();
        bail!(
            "CONFIG_UNUSED_KEYS (mode={}): {} config key(s) not read by this command: {:?}",
            report.mode,
            report.unused_leaf_pointers.len(),
            shown
        );
    }

    Ok(report)
}

/// `"/a/b"` covers `"/a/b"` and `"/a/b/c"` but not `"/a/bc"`.
fn covers(prefix: &str, leaf: &str) -> bool {
    prefix == "/"
        || leaf == prefix
        || leaf
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Every scalar leaf as (JSON pointer, value), in document order.
fn leaves(v: &Value) -> Vec<(String, &Value)> {
    fn walk<'a>(v: &'a Value, at: String, out: &mut Vec<(String, &'a Value)>) {
        match v {
            Value::Object(map) => map.iter().for_each(|(k, child)| {
                let token = k.replace('~', "~0").replace('/', "~1");
                walk(child, format!("{at}/{token}"), out)
            }),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .for_each(|(i, child)| walk(child, format!("{at}/{i}"), out)),
            leaf if at.is_empty() => out.push(("/".to_string(), leaf)),
            leaf => out.push((at, leaf)),
        }
    }
    let mut out = Vec::new();
    walk(v, String::new(), &mut out);
    out
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml<P: AsRef<std::path::Path>>(paths: &[P]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            fs::read_to_string(p).with_context(|| format!("read config failed: {}", p.display()))
        })
        .collect::<Result<Vec<String>>>()?;
    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());
    for (i, raw) in yaml_docs.iter().enumerate() {
        let layer: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml in layer {i}"))?;
        let layer = serde_json::to_value(layer)
            .with_context(|| format!("layer {i} is not representable as json"))?;
        merge_into(&mut merged, layer);
    }

    reject_secret_literals(&merged)?;

    // serde_json's default map is ordered by key, so this is canonical.
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Mappings merge key by key; anything else in `layer` replaces `base`.
fn merge_into(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base_map), Value::Object(layer_map)) => {
            for (k, v) in layer_map {
                merge_into(base_map.entry(k).or_insert(Value::Null), v);
            }
        }
        (slot, layer) => *slot = layer,
    }
}

fn reject_secret_literals(v: &Value) -> Result<()> {
    for (ptr, leaf) in leaves(v) {
        if leaf.as_str().is_some_and(looks_like_secret) {
            bail!("CONFIG_SECRET_DETECTED leaf={ptr} value=REDACTED");
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    t.len() >= 8 && SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_pointer_respects_segment_boundary() {
        assert!(covers("/data", "/data/dir"));
        assert!(covers("/data", "/data"));
        assert!(!covers("/data", "/database/url"));
        assert!(covers("/", "/anything"));
    }

    #[test]
    fn merge_overrides_leaves_and_keeps_siblings() {
        let mut m = serde_json::json!({"strategy": {"num_pools": 5, "initial_capital": 1000}});
        merge_into(&mut m, serde_json::json!({"strategy": {"num_pools": 3}}));
        assert_eq!(m["strategy"]["num_pools"], 3);
        assert_eq!(m["strategy"]["initial_capital"], 1000);
    }
}
