//! API key resolution.
//!
//! Config stores only the env var NAME. The value is read once, by the
//! caller that needs it, and never appears in `Debug` output or errors.

use anyhow::{bail, Result};

#[derive(Clone)]
pub struct ResolvedApiKey {
    env_name: String,
    value: String,
}

impl ResolvedApiKey {
    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for ResolvedApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedApiKey")
            .field("env_name", &self.env_name)
            .field("value", &"<REDACTED>")
            .finish()
    }
}

/// Read the key named by `env_name`. Absent or blank is an error that names
/// the variable, not its value.
pub fn resolve_api_key(env_name: &str) -> Result<ResolvedApiKey> {
    resolve_with(env_name, |k| std::env::var(k).ok())
}

fn resolve_with<F>(env_name: &str, lookup: F) -> Result<ResolvedApiKey>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(env_name) {
        Some(v) if !v.trim().is_empty() => Ok(ResolvedApiKey {
            env_name: env_name.to_string(),
            value: v.trim().to_string(),
        }),
        _ => bail!("SECRET_MISSING env var {env_name} is not set"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_value() {
        let k = resolve_with("EODHD_API_KEY", |_| Some("abc123".into())).unwrap();
        let dbg = format!("{k:?}");
        assert!(dbg.contains("EODHD_API_KEY"));
        assert!(!dbg.contains("abc123"));
        assert_eq!(k.expose(), "abc123");
    }

    #[test]
    fn blank_is_missing() {
        let err = resolve_with("EODHD_API_KEY", |_| Some("  ".into())).unwrap_err();
        assert!(err.to_string().contains("EODHD_API_KEY"));
        assert!(resolve_with("X", |_| None).is_err());
    }
}
