//! Runtime configuration, read from the environment (and `.env`).

pub mod policy;

pub use policy::{BootstrapPolicy, OrphanPolicy, TeamPolicy};

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::error::{AppError, Result};

/// Local Supabase CLI stack; hosted projects override it
pub const DEFAULT_SUPABASE_URL: &str = "http://localhost:54321";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";

/// Hosted backend project
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. https://xyz.supabase.co
    pub url: String,
    /// Published (anon) API key; not a secret
    pub anon_key: String,
    pub timeout: Duration,
}

impl SupabaseConfig {
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url.trim_end_matches('/'))
    }

    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.url.trim_end_matches('/'))
    }
}

/// Generative model used for strategy advice
#[derive(Debug, Clone)]
pub struct AdvisoryConfig {
    /// `None` when unset, empty, or the literal "undefined"
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// Web server configuration
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    pub bind: String,
    pub port: u16,
    /// Certificate PEM; HTTPS is served only when both paths are set
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    /// Periodic full reload of the cache; `None` disables it
    pub refresh_interval: Option<Duration>,
}

impl WebServerConfig {
    pub fn tls_paths(&self) -> Option<(&PathBuf, &PathBuf)> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) => Some((cert, key)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase: SupabaseConfig,
    pub advisory: AdvisoryConfig,
    pub web: WebServerConfig,
    pub policy: TeamPolicy,
}

impl AppConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = get("SUPABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SUPABASE_URL.to_string());
        let anon_key = get("SUPABASE_ANON_KEY").unwrap_or_default();
        if anon_key.is_empty() {
            warn!("SUPABASE_ANON_KEY is not set; requests to {} will be rejected", url);
        }

        let supabase = SupabaseConfig {
            url,
            anon_key,
            timeout: Duration::from_secs(parse_or(&get, "HTTP_TIMEOUT_SECS", 15)?),
        };

        let advisory = AdvisoryConfig {
            api_key: get("API_KEY")
                .or_else(|| get("GEMINI_API_KEY"))
                .and_then(credential),
            model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            timeout: Duration::from_secs(parse_or(&get, "ADVISORY_TIMEOUT_SECS", 60)?),
        };

        let refresh_secs: u64 = parse_or(&get, "REFRESH_INTERVAL_SECS", 300)?;
        let web = WebServerConfig {
            bind: get("WEB_BIND").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "WEB_PORT", 3000)?,
            cert_path: get("TLS_CERT_PATH").map(PathBuf::from),
            key_path: get("TLS_KEY_PATH").map(PathBuf::from),
            refresh_interval: (refresh_secs > 0).then(|| Duration::from_secs(refresh_secs)),
        };

        let policy = TeamPolicy {
            bootstrap: get("TEAM_ADMIN_BOOTSTRAP")
                .unwrap_or_default()
                .parse()
                .map_err(|message| AppError::Config { message })?,
            orphans: get("TEAM_ORPHAN_ATTENDANCE")
                .unwrap_or_default()
                .parse()
                .map_err(|message| AppError::Config { message })?,
        };

        Ok(Self {
            supabase,
            advisory,
            web,
            policy,
        })
    }
}

/// Treat unset-looking credentials as missing
fn credential(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "undefined" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| AppError::Config {
            message: format!("{} must be a number, got '{}'", key, raw),
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.supabase.rest_url(), "http://localhost:54321/rest/v1");
        assert_eq!(config.advisory.api_key, None);
        assert_eq!(config.advisory.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.web.port, 3000);
        assert_eq!(config.web.refresh_interval, Some(Duration::from_secs(300)));
        assert_eq!(config.policy, TeamPolicy::default());
        assert!(config.web.tls_paths().is_none());
    }

    #[test]
    fn test_undefined_api_key_is_missing() {
        let config = AppConfig::from_lookup(lookup(&[("API_KEY", "undefined")])).unwrap();
        assert_eq!(config.advisory.api_key, None);

        let config = AppConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "abc")])).unwrap();
        assert_eq!(config.advisory.api_key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_overrides_and_policies() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://team.supabase.co/"),
            ("WEB_PORT", "8080"),
            ("REFRESH_INTERVAL_SECS", "0"),
            ("TEAM_ADMIN_BOOTSTRAP", "first-admin"),
            ("TEAM_ORPHAN_ATTENDANCE", "cascade"),
        ]))
        .unwrap();

        assert_eq!(config.supabase.auth_url(), "https://team.supabase.co/auth/v1");
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.web.refresh_interval, None);
        assert_eq!(config.policy.bootstrap, BootstrapPolicy::FirstAdmin);
        assert_eq!(config.policy.orphans, OrphanPolicy::Cascade);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[("WEB_PORT", "eighty")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("TEAM_ORPHAN_ATTENDANCE", "shred")])).is_err());
    }
}
