use aaisp_chaos::{Auth, DEFAULT_ENDPOINT};
use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::logging::LogOutput;

pub const LOGIN_VAR: &str = "CHAOS_CONTROL_LOGIN";
pub const PASSWORD_VAR: &str = "CHAOS_CONTROL_PASSWORD";

/// Command line flags. Anything given here wins over the config file.
#[derive(Debug, Default, Parser)]
#[command(
    name = "aaisp-exporter",
    version,
    about = "Prometheus exporter for Andrews & Arnold broadband lines",
    after_help = "The environment variables CHAOS_CONTROL_LOGIN and CHAOS_CONTROL_PASSWORD must be set."
)]
pub struct Cli {
    /// Listen address
    #[arg(long = "listen", value_name = "address")]
    pub listen: Option<String>,

    /// Log level
    #[arg(long = "log.level", value_name = "level")]
    pub log_level: Option<String>,

    /// Log output style
    #[arg(long = "log.output", value_name = "style", value_enum)]
    pub log_output: Option<LogOutput>,

    /// Also write daily log files to this directory
    #[arg(long = "log.dir", value_name = "path")]
    pub log_dir: Option<PathBuf>,

    /// CHAOS API endpoint
    #[arg(long = "chaos.endpoint", value_name = "url")]
    pub endpoint: Option<String>,

    /// TOML config file
    #[arg(long = "config", value_name = "path")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_output: LogOutput,

    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_listen() -> String {
    ":8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_level: default_log_level(),
            log_output: LogOutput::default(),
            log_dir: None,
            endpoint: default_endpoint(),
        }
    }
}

impl ExporterConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config: ExporterConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
        Ok(config)
    }

    /// Config file (if any) overlaid with the command line.
    pub fn load(cli: Cli) -> anyhow::Result<Self> {
        let base = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(base.merge(cli))
    }

    fn merge(mut self, cli: Cli) -> Self {
        if let Some(listen) = cli.listen {
            self.listen = listen;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        if let Some(output) = cli.log_output {
            self.log_output = output;
        }
        if cli.log_dir.is_some() {
            self.log_dir = cli.log_dir;
        }
        if let Some(endpoint) = cli.endpoint {
            self.endpoint = endpoint;
        }
        self
    }

    /// Address to hand to the listener. A bare ":port" means every interface.
    pub fn bind_address(&self) -> String {
        if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("CHAOS_CONTROL_LOGIN and CHAOS_CONTROL_PASSWORD must be set in the environment")]
    MissingCredentials,
    #[error("CHAOS_CONTROL_LOGIN is not set")]
    MissingLogin,
    #[error("CHAOS_CONTROL_PASSWORD is not set")]
    MissingPassword,
}

pub fn credentials_from_env() -> Result<Auth, ConfigError> {
    credentials_from(|key| std::env::var(key).ok())
}

/// Control credentials from a variable lookup. Empty values count as unset.
pub fn credentials_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Auth, ConfigError> {
    let get = |key: &str| lookup(key).filter(|v: &String| !v.is_empty());
    match (get(LOGIN_VAR), get(PASSWORD_VAR)) {
        (Some(login), Some(password)) => Ok(Auth::control(login, password)),
        (None, None) => Err(ConfigError::MissingCredentials),
        (None, Some(_)) => Err(ConfigError::MissingLogin),
        (Some(_), None) => Err(ConfigError::MissingPassword),
    }
}
