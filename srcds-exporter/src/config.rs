use crate::models::Target;
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "exporter.yaml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExporterConfig {
    pub listen: ListenConf,
    pub single_server: Option<Target>,
    pub rcon: RconConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ListenConf {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RconConf {
    pub connect_timeout_ms: u64,
    /// Bounds connect + authenticate, all attempts included
    pub handshake_timeout_ms: u64,
    pub command_timeout_ms: u64,
    pub reconnect_attempts: u32,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("single server address is empty")]
    EmptyServerAddress,
    #[error("single server port must be between 1 and 65535")]
    InvalidServerPort,
    #[error("single server mode needs a non-empty password")]
    EmptyServerPassword,
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

impl Default for ListenConf {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            port: 9591,
        }
    }
}

impl Default for RconConf {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 1000,
            handshake_timeout_ms: 2000,
            command_timeout_ms: 2000,
            reconnect_attempts: 2,
        }
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen: ListenConf::default(),
            single_server: None,
            rcon: RconConf::default(),
        }
    }
}

impl RconConf {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Command line, every flag also readable from the environment
#[derive(Debug, Clone, Parser)]
#[command(
    name = "srcds-exporter",
    version,
    about = "srcds_exporter, a prometheus exporter for SRCDS based games like CSGO, L4D2 and TF2"
)]
pub struct Args {
    /// The address to which the exporter binds
    #[arg(long, env = "SRCDS_EXPORTER_ADDRESS")]
    pub address: Option<String>,

    /// The port to which the exporter binds
    #[arg(long, env = "SRCDS_EXPORTER_PORT")]
    pub port: Option<u16>,

    /// RCON password, enables single server mode
    #[arg(long, env = "SRCDS_EXPORTER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Game server queried in single server mode
    #[arg(long, env = "SRCDS_EXPORTER_SERVER_ADDRESS", default_value = "localhost")]
    pub server_address: String,

    /// RCON port queried in single server mode
    #[arg(long, env = "SRCDS_EXPORTER_SERVER_PORT", default_value_t = 27015)]
    pub server_port: u16,

    /// YAML configuration file
    #[arg(long, env = "SRCDS_EXPORTER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

impl ExporterConfig {
    /// Flags win over the file
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(address) = &args.address {
            self.listen.address = address.clone();
        }
        if let Some(port) = args.port {
            self.listen.port = port;
        }
        if let Some(password) = &args.password {
            self.single_server = Some(Target {
                address: args.server_address.clone(),
                port: args.server_port,
                password: password.clone(),
            });
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(target) = &self.single_server {
            if target.address.trim().is_empty() {
                return Err(ConfigError::EmptyServerAddress);
            }
            if target.port == 0 {
                return Err(ConfigError::InvalidServerPort);
            }
            if target.password.is_empty() {
                return Err(ConfigError::EmptyServerPassword);
            }
        }

        let rcon = &self.rcon;
        for (name, value) in [
            ("connect_timeout_ms", rcon.connect_timeout_ms),
            ("handshake_timeout_ms", rcon.handshake_timeout_ms),
            ("command_timeout_ms", rcon.command_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroTimeout(name));
            }
        }
        Ok(())
    }

    pub fn is_single_server(&self) -> bool {
        self.single_server.is_some()
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen.address, self.listen.port)
    }
}

/// Missing or empty file means defaults, an unreadable one is an error
pub async fn load_config(path: &Path) -> Result<ExporterConfig> {
    if !path.exists() {
        info!("no config file at {}, using defaults", path.display());
        return Ok(ExporterConfig::default());
    }

    let txt = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    if txt.trim().is_empty() {
        warn!("config file {} is empty, using defaults", path.display());
        return Ok(ExporterConfig::default());
    }

    serde_yaml::from_str(&txt).with_context(|| format!("invalid config in {}", path.display()))
}

/// File, then flags, then validation
pub async fn resolve_config(args: &Args) -> Result<ExporterConfig> {
    let mut cfg = load_config(&args.config).await?;
    cfg.apply_args(args);
    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["srcds-exporter", "--config", "/nonexistent/exporter.yaml"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let cfg = ExporterConfig::default();
        assert_eq!(cfg.listen_addr(), "127.0.0.1:9591");
        assert_eq!(cfg.rcon.connect_timeout(), Duration::from_secs(1));
        assert_eq!(cfg.rcon.command_timeout(), Duration::from_secs(2));
        assert_eq!(cfg.rcon.reconnect_attempts, 2);
        assert!(!cfg.is_single_server());
    }

    #[test]
    fn test_password_flag_enables_single_server() {
        let mut cfg = ExporterConfig::default();
        cfg.apply_args(&args(&["--password", "rcon", "--server-port", "27016"]));

        let target = cfg.single_server.unwrap();
        assert_eq!(target.address, "localhost");
        assert_eq!(target.port, 27016);
        assert_eq!(target.password, "rcon");
    }

    #[test]
    fn test_listen_flags_override() {
        let mut cfg = ExporterConfig::default();
        cfg.apply_args(&args(&["--address", "0.0.0.0", "--port", "9000"]));
        assert_eq!(cfg.listen_addr(), "0.0.0.0:9000");
        assert!(!cfg.is_single_server());
    }

    #[test]
    fn test_validation() {
        let mut cfg = ExporterConfig::default();
        cfg.single_server = Some(Target {
            address: "localhost".into(),
            port: 27015,
            password: String::new(),
        });
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyServerPassword));

        let mut cfg = ExporterConfig::default();
        cfg.rcon.command_timeout_ms = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTimeout("command_timeout_ms")));
    }

    #[tokio::test]
    async fn test_load_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "listen:\n  port: 9100\nrcon:\n  command_timeout_ms: 5000\nsingle_server:\n  address: 10.0.0.2\n  port: 27015\n  password: secret"
        )
        .unwrap();

        let cfg = load_config(file.path()).await.unwrap();
        assert_eq!(cfg.listen.address, "127.0.0.1");
        assert_eq!(cfg.listen.port, 9100);
        assert_eq!(cfg.rcon.command_timeout_ms, 5000);
        assert_eq!(cfg.rcon.connect_timeout_ms, 1000);
        assert_eq!(cfg.single_server.unwrap().address, "10.0.0.2");
    }

    #[tokio::test]
    async fn test_missing_and_invalid_files() {
        let cfg = load_config(Path::new("/nonexistent/exporter.yaml")).await.unwrap();
        assert_eq!(cfg, ExporterConfig::default());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen: [not, a, map]").unwrap();
        assert!(load_config(file.path()).await.is_err());
    }
}
