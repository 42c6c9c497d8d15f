use serde::Deserialize;
use std::path::Path;

/// Global configuration for the edge proxy
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Backend origin configuration
    pub backend: BackendConfig,

    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Listen port (default: 8080)
    #[serde(default = "default_listen_port")]
    pub port: u16,

    /// Bind address (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_listen_port(),
            bind: default_bind_address(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Base URL of the backend origin, e.g. "https://your-server.com".
    /// Scheme and host of every inbound request are replaced with this;
    /// path and query are forwarded verbatim.
    pub base_url: String,

    /// Optional total request timeout in seconds. When unset, a request
    /// waits on the backend indefinitely (matching the behavior of running
    /// behind a host environment that enforces its own execution limit).
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Enable the cached forwarding path (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Max age recorded on stored responses, in seconds (default: 3600)
    #[serde(default = "default_cache_max_age")]
    pub max_age_secs: u64,

    /// Only responses whose request path contains this substring are stored
    /// (default: "/info")
    #[serde(default = "default_cache_path_marker")]
    pub path_marker: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_age_secs: default_cache_max_age(),
            path_marker: default_cache_path_marker(),
        }
    }
}

fn default_listen_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_cache_max_age() -> u64 {
    3600
}

fn default_cache_path_marker() -> String {
    "/info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        let base = self.backend.base_url.trim();
        if base.is_empty() {
            errors.push("backend.base_url must not be empty".to_string());
        } else if !base.starts_with("http://") && !base.starts_with("https://") {
            errors.push(format!(
                "backend.base_url must start with http:// or https:// (got '{}')",
                base
            ));
        }
        if base.len() > "https://".len() && base.ends_with('/') {
            errors.push(format!(
                "backend.base_url must not end with a slash (got '{}')",
                base
            ));
        }

        if self.cache.enabled && self.cache.path_marker.is_empty() {
            errors.push("cache.path_marker must not be empty when cache is enabled".to_string());
        }
        if self.cache.enabled && self.cache.max_age_secs == 0 {
            errors.push("cache.max_age_secs must be greater than zero".to_string());
        }

        if let Some(0) = self.backend.request_timeout_secs {
            errors.push("backend.request_timeout_secs must be greater than zero".to_string());
        }

        if !errors.is_empty() {
            anyhow::bail!("Configuration errors:\n  - {}", errors.join("\n  - "));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        toml::from_str(toml).expect("valid test config")
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = parse(
            r#"
            [backend]
            base_url = "https://your-server.com"
            "#,
        );

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.backend.base_url, "https://your-server.com");
        assert_eq!(config.backend.request_timeout_secs, None);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.max_age_secs, 3600);
        assert_eq!(config.cache.path_marker, "/info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse(
            r#"
            [server]
            port = 9090
            bind = "127.0.0.1"

            [backend]
            base_url = "http://10.0.0.5:3000"
            request_timeout_secs = 30

            [cache]
            enabled = true
            max_age_secs = 600
            path_marker = "/api/info"
            "#,
        );

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.backend.base_url, "http://10.0.0.5:3000");
        assert_eq!(config.backend.request_timeout_secs, Some(30));
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_age_secs, 600);
        assert_eq!(config.cache.path_marker, "/api/info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let config = parse(
            r#"
            [backend]
            base_url = "your-server.com"
            "#,
        );
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("http://"), "unexpected error: {}", err);

        let config = parse(
            r#"
            [backend]
            base_url = "https://your-server.com/"
            "#,
        );
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("slash"), "unexpected error: {}", err);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = parse(
            r#"
            [backend]
            base_url = "https://your-server.com"
            request_timeout_secs = 0
            "#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [server]
            port = 8888

            [backend]
            base_url = "https://your-server.com"
            "#,
        )
        .expect("write config");

        let config = Config::load(&path).expect("load config");
        assert_eq!(config.server.port, 8888);
    }
}
