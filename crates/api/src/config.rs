use anyhow::{Context, Result};
use cache::{CacheConfig, QueryOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: OperationMode,
    pub backend: BackendConfig,
    pub query: QueryConfig,
    pub cache: CacheSettings,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Fast,     // Serve cached rows longer, fail fast
    Fresh,    // Always revalidate, refetch on refocus
    Balanced, // Default dashboard policy
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub stale_time_ms: u64,
    pub retry_count: usize,
    pub retry_delay_ms: u64,
    pub refetch_on_refocus: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub gc_time_ms: u64,
    pub gc_interval_secs: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperationMode::Balanced,
            backend: BackendConfig {
                url: String::new(),
                anon_key: String::new(),
                request_timeout_secs: 30,
            },
            query: QueryConfig {
                stale_time_ms: 300_000,
                retry_count: 1,
                retry_delay_ms: 1000,
                refetch_on_refocus: false,
            },
            cache: CacheSettings {
                gc_time_ms: 300_000,
                gc_interval_secs: 60,
                max_entries: 1000,
            },
            server: ServerConfig {
                bind: "0.0.0.0:3000".to_string(),
            },
        }
    }
}

impl AppConfig {
    pub fn fast_mode() -> Self {
        let defaults = Self::default();
        Self {
            mode: OperationMode::Fast,
            backend: BackendConfig {
                request_timeout_secs: 10,
                ..defaults.backend
            },
            query: QueryConfig {
                stale_time_ms: 900_000,
                retry_count: 0,
                retry_delay_ms: 0,
                refetch_on_refocus: false,
            },
            cache: CacheSettings {
                gc_time_ms: 1_800_000,
                gc_interval_secs: 120,
                max_entries: 5000,
            },
            server: defaults.server,
        }
    }

    pub fn fresh_mode() -> Self {
        let defaults = Self::default();
        Self {
            mode: OperationMode::Fresh,
            backend: BackendConfig {
                request_timeout_secs: 60,
                ..defaults.backend
            },
            query: QueryConfig {
                stale_time_ms: 0,
                retry_count: 3,
                retry_delay_ms: 1000,
                refetch_on_refocus: true,
            },
            cache: CacheSettings {
                gc_time_ms: 60_000,
                gc_interval_secs: 30,
                max_entries: 500,
            },
            server: defaults.server,
        }
    }

    pub fn for_mode(mode: &str) -> Self {
        match mode.to_ascii_lowercase().as_str() {
            "fast" => Self::fast_mode(),
            "fresh" => Self::fresh_mode(),
            _ => Self::default(),
        }
    }

    /// The JSON file named by `DASHBOARD_CONFIG`, or the preset named by
    /// `DASHBOARD_MODE`, then environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("DASHBOARD_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::for_mode(&std::env::var("DASHBOARD_MODE").unwrap_or_default()),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SUPABASE_URL") {
            self.backend.url = url;
        }
        if let Some(key) = lookup("SUPABASE_ANON_KEY") {
            self.backend.anon_key = key;
        }
        if let Some(bind) = lookup("DASHBOARD_BIND") {
            self.server.bind = bind;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.url.trim().is_empty() {
            anyhow::bail!("Backend url is not configured (set SUPABASE_URL)");
        }
        if self.backend.anon_key.trim().is_empty() {
            anyhow::bail!("Backend key is not configured (set SUPABASE_ANON_KEY)");
        }
        Ok(())
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::default()
            .stale_time(Duration::from_millis(self.query.stale_time_ms))
            .retry_count(self.query.retry_count)
            .retry_delay(Duration::from_millis(self.query.retry_delay_ms))
            .refetch_on_refocus(self.query.refetch_on_refocus)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            gc_time: Duration::from_millis(self.cache.gc_time_ms),
            max_entries: self.cache.max_entries,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.cache.gc_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_dashboard_policy() {
        let config = AppConfig::default();
        let options = config.query_options();
        assert_eq!(options.stale_time, Duration::from_secs(300));
        assert_eq!(options.retry_count, 1);
        assert!(options.enabled);
        assert!(!options.refetch_on_refocus);
        assert_eq!(config.cache_config().gc_time, Duration::from_secs(300));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SUPABASE_URL", "https://demo.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("DASHBOARD_BIND", "127.0.0.1:8080"),
        ]);
        let mut config = AppConfig::default();
        assert!(config.validate().is_err());

        config.apply_env(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(config.backend.url, "https://demo.supabase.co");
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_file_keeps_defaults() {
        let path = std::env::temp_dir().join(format!("dashboard-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"mode": "fresh", "server": {"bind": "127.0.0.1:9000"}}"#).unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.mode, OperationMode::Fresh);
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.query.retry_count, 1);
    }

    #[test]
    fn test_presets() {
        assert!(AppConfig::fresh_mode().query_options().refetch_on_refocus);
        assert_eq!(AppConfig::fresh_mode().query.stale_time_ms, 0);
        assert_eq!(AppConfig::fast_mode().query_options().retry_count, 0);
        assert_eq!(AppConfig::for_mode("FAST").mode, OperationMode::Fast);
        assert_eq!(AppConfig::for_mode("").mode, OperationMode::Balanced);
    }
}
