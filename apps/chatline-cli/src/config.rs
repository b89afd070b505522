use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use chatline_client::ClientConfig;
use chatline_transport_websocket::WebSocketConnectorConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct CliConfig {
    pub socket_base: String,
    pub api_base: Option<String>,
    pub token: Option<String>,
    pub channel: Option<String>,
    pub history_limit: usize,
    #[serde(with = "humantime_serde")]
    pub backoff_base: Duration,
    #[serde(with = "humantime_serde")]
    pub backoff_ceiling: Duration,
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub close_timeout: Duration,
}

impl CliConfig {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("socket_base", "ws://127.0.0.1:8080/ws")?
            .set_default("history_limit", 50)?
            .set_default("backoff_base", "1s")?
            .set_default("backoff_ceiling", "30s")?
            .set_default("max_attempts", 5)?
            .set_default("connect_timeout", "10s")?
            .set_default("close_timeout", "2s")?;

        if let Some(path) = config_path {
            if path.extension().and_then(|ext| ext.to_str()) == Some("env") {
                // Picked up by the CHATLINE_ environment source below.
                match dotenvy::from_path(&path) {
                    Ok(_) => tracing::info!("loaded environment from {}", path.display()),
                    Err(err) => {
                        tracing::warn!("failed to load .env from {}: {}", path.display(), err)
                    }
                }
            } else {
                builder = builder.add_source(File::from(path));
            }
        }

        builder = builder.add_source(Environment::with_prefix("CHATLINE").try_parsing(true));

        builder.build()?.try_deserialize()
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            socket_base: self.socket_base.clone(),
            history_limit: self.history_limit,
            backoff_base: self.backoff_base,
            backoff_ceiling: self.backoff_ceiling,
            max_attempts: self.max_attempts,
            ..ClientConfig::default()
        }
    }

    pub fn connector_config(&self) -> WebSocketConnectorConfig {
        WebSocketConnectorConfig {
            connect_timeout: self.connect_timeout,
            close_timeout: self.close_timeout,
            ..WebSocketConnectorConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<F>(vars: &[(&str, &str)], test: F)
    where
        F: FnOnce(),
    {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut old = Vec::new();
        for (k, v) in vars {
            old.push((k.to_string(), env::var(k).ok()));
            env::set_var(k, v);
        }

        test();

        for (k, maybe_old) in old {
            match maybe_old {
                Some(val) => env::set_var(k, val),
                None => env::remove_var(k),
            }
        }
    }

    #[test]
    fn defaults_are_applied() {
        with_env(&[], || {
            let cfg = CliConfig::new(None).expect("failed to build config");
            assert_eq!(cfg.socket_base, "ws://127.0.0.1:8080/ws");
            assert_eq!(cfg.history_limit, 50);
            assert_eq!(cfg.backoff_base, Duration::from_secs(1));
            assert_eq!(cfg.backoff_ceiling, Duration::from_secs(30));
            assert_eq!(cfg.max_attempts, 5);
            assert_eq!(cfg.connect_timeout, Duration::from_secs(10));
            assert_eq!(cfg.close_timeout, Duration::from_secs(2));
        });
    }

    #[test]
    fn env_vars_override_defaults() {
        with_env(
            &[
                ("CHATLINE_SOCKET_BASE", "wss://chat.example/ws"),
                ("CHATLINE_API_BASE", "https://chat.example/api"),
                ("CHATLINE_MAX_ATTEMPTS", "3"),
                ("CHATLINE_BACKOFF_BASE", "250ms"),
            ],
            || {
                let cfg = CliConfig::new(None).expect("failed to build config");
                assert_eq!(cfg.socket_base, "wss://chat.example/ws");
                assert_eq!(cfg.api_base.as_deref(), Some("https://chat.example/api"));
                assert_eq!(cfg.max_attempts, 3);
                assert_eq!(cfg.backoff_base, Duration::from_millis(250));

                let policy = cfg.client_config().backoff_policy();
                assert_eq!(policy.max_attempts(), 3);
                assert_eq!(policy.delay(2), Duration::from_secs(1));
            },
        );
    }

    #[test]
    fn toml_file_is_layered_under_env() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(
            file,
            "socket_base = \"wss://file.example/ws\"\nchannel = \"general\"\nclose_timeout = \"500ms\""
        )
        .expect("write config");

        with_env(&[("CHATLINE_CHANNEL", "random")], || {
            let cfg = CliConfig::new(Some(file.path().to_path_buf())).expect("config");
            assert_eq!(cfg.socket_base, "wss://file.example/ws");
            assert_eq!(cfg.channel.as_deref(), Some("random"));
            assert_eq!(
                cfg.connector_config().close_timeout,
                Duration::from_millis(500)
            );
        });
    }
}
