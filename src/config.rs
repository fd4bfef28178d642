//! Configuration loading
//!
//! Sources are merged in this order, later ones overriding earlier ones:
//!
//! 1. `CourierConfig::default()`
//! 2. a TOML file (the explicit path, or `courier.toml` in the working
//!    directory when present)
//! 3. environment variables prefixed with `COURIER_`, nested with `__`
//!    (for example `COURIER_HTTP__TIMEOUT=30` or
//!    `COURIER_CLIENTS__BILLING=https://billing.example.test/`)
//!
//! ```toml
//! [http]
//! timeout = 30
//! user_agent = "checkout/1.4"
//!
//! [json]
//! key_case = "camel_case"
//!
//! [log]
//! level = "debug"
//!
//! [clients]
//! billing = "https://billing.example.test/api/"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::error::{CourierError, Result};
use crate::json::JsonOptions;
use crate::telemetry::LogConfig;
use crate::transport::HttpConfig;

/// Default environment variable prefix.
pub const CONFIG_ENV_PREFIX: &str = "COURIER";

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILENAME: &str = "courier.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Transport settings.
    pub http: HttpConfig,
    /// Default options for the JSON helpers.
    pub json: JsonOptions,
    /// Subscriber settings for `telemetry::init_subscriber`.
    pub log: LogConfig,
    /// Named clients, `name -> base address`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clients: Option<BTreeMap<String, String>>,
}

/// Configuration loader
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: CONFIG_ENV_PREFIX.to_string(),
        }
    }

    /// Use this TOML file. It must exist when [`load`](Self::load) runs.
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Environment prefix without the trailing underscore.
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Merge all sources and extract a [`CourierConfig`].
    pub fn load(&self) -> Result<CourierConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(CourierConfig::default()));

        match &self.config_path {
            Some(path) if path.exists() => {
                figment = figment.merge(Toml::file(path));
                tracing::debug!(path = %path.display(), "loaded configuration file");
            }
            Some(path) => {
                return Err(CourierError::Configuration(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILENAME);
                if default_path.exists() {
                    figment = figment.merge(Toml::file(default_path));
                    tracing::debug!(path = %default_path.display(), "loaded configuration file");
                }
            }
        }

        figment = figment.merge(Env::prefixed(&format!("{}_", self.env_prefix)).split("__"));

        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::KeyCase;
    use crate::telemetry::{LogLevel, OutputFormat};
    use figment::Jail;
    use std::time::Duration;

    #[test]
    fn defaults_have_no_clients_table() {
        Jail::expect_with(|_jail| {
            let config = ConfigLoader::new().load().map_err(|e| e.to_string())?;
            assert_eq!(config, CourierConfig::default());
            assert!(config.clients.is_none());
            Ok(())
        });
    }

    #[test]
    fn toml_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "courier.toml",
                r#"
                [http]
                timeout = 10

                [json]
                key_case = "camel_case"

                [log]
                level = "debug"
                format = "json"

                [clients]
                billing = "https://billing.example.test/"
                "#,
            )?;
            jail.set_env("COURIER_HTTP__TIMEOUT", "30");
            jail.set_env("COURIER_LOG__FORMAT", "json-compact");
            jail.set_env("COURIER_CLIENTS__SEARCH", "https://search.example.test/");

            let config = ConfigLoader::new().load().map_err(|e| e.to_string())?;
            assert_eq!(config.http.timeout, Some(Duration::from_secs(30)));
            assert_eq!(config.json.key_case, KeyCase::CamelCase);
            assert_eq!(config.log.level, LogLevel::Debug);
            assert_eq!(config.log.format, OutputFormat::JsonCompact);
            let clients = config.clients.unwrap_or_default();
            assert_eq!(
                clients.get("billing").map(String::as_str),
                Some("https://billing.example.test/")
            );
            assert_eq!(
                clients.get("search").map(String::as_str),
                Some("https://search.example.test/")
            );
            Ok(())
        });
    }

    #[test]
    fn missing_explicit_file_is_a_configuration_error() {
        Jail::expect_with(|_jail| {
            let err = ConfigLoader::new()
                .with_config_path("absent.toml")
                .load()
                .unwrap_err();
            assert!(matches!(err, CourierError::Configuration(_)));
            Ok(())
        });
    }

    #[test]
    fn custom_prefix_is_honoured() {
        Jail::expect_with(|jail| {
            jail.set_env("CHECKOUT_HTTP__USER_AGENT", "checkout/2");
            let config = ConfigLoader::new()
                .with_env_prefix("CHECKOUT")
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.http.user_agent.as_deref(), Some("checkout/2"));
            Ok(())
        });
    }
}
