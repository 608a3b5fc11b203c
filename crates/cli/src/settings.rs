//! Relay configuration: an optional file layered under environment variables.
//!
//! | Source | Example |
//! |--------|---------|
//! | File named by `MESHGATE_CONFIG` (TOML, JSON, YAML by extension) | `MESHGATE_CONFIG=/etc/meshgate.toml` |
//! | `MESHGATE__*` environment variables, `__` between path segments | `MESHGATE__CLIENT__REQUEST_TIMEOUT_MS=5000` |
//!
//! Environment values win over file values. Every setting has a default.

use std::net::SocketAddr;

use client::ClientConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "MESHGATE_CONFIG";

const ENV_PREFIX: &str = "MESHGATE";
const ENV_SEPARATOR: &str = "__";

/// Everything the `meshgate` binary needs to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the relay server binds to.
    pub listen_addr: SocketAddr,

    /// OTLP/gRPC collector endpoint. Spans are only exported when set.
    pub otlp_endpoint: Option<String>,

    /// Outbound client settings.
    pub client: ClientConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            otlp_endpoint: None,
            client: ClientConfig::default(),
        }
    }
}

/// Loads the configuration from the process environment.
pub fn load() -> Result<RelayConfig, ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV).ok();
    load_from(path.as_deref(), environment())
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("client.denied_hosts")
}

fn load_from(path: Option<&str>, environment: Environment) -> Result<RelayConfig, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::with_name(path));
    }
    builder.add_source(environment).build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn nothing_configured_yields_defaults() {
        let config = load_from(None, env(&[])).unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn environment_overrides_nested_settings() {
        let config = load_from(
            None,
            env(&[
                ("MESHGATE__LISTEN_ADDR", "0.0.0.0:9000"),
                ("MESHGATE__CLIENT__REQUEST_TIMEOUT_MS", "5000"),
                ("MESHGATE__CLIENT__CORRELATION_IDS", "false"),
                ("MESHGATE__CLIENT__DENIED_HOSTS", "legacy-gateway,old-billing"),
            ]),
        )
        .unwrap();
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.client.request_timeout_ms, 5000);
        assert!(!config.client.correlation_ids);
        assert_eq!(config.client.denied_hosts, vec!["legacy-gateway", "old-billing"]);
    }

    #[test]
    fn file_settings_sit_under_the_environment() {
        let dir = std::env::temp_dir().join(format!("meshgate-settings-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("meshgate.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
otlp_endpoint = "http://collector:4317"

[client]
request_timeout_ms = 1000

[client.services]
billing-service = ["http://10.0.0.1:8081"]
"#
        )
        .unwrap();

        let config = load_from(
            path.to_str(),
            env(&[("MESHGATE__CLIENT__REQUEST_TIMEOUT_MS", "2500")]),
        )
        .unwrap();
        assert_eq!(config.otlp_endpoint.as_deref(), Some("http://collector:4317"));
        assert_eq!(config.client.request_timeout_ms, 2500);
        assert_eq!(
            config.client.services["billing-service"],
            vec!["http://10.0.0.1:8081"]
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
