use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Top-level configuration for the data instrument core.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataInstrumentConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub rolling: RollingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_postgres_port")]
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "ssl_mode")]
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
    #[serde(rename = "max_connections")]
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(rename = "connection_timeout_seconds")]
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
}

impl DatabaseConfig {
    /// Build the `postgres://` connection URL, percent-encoding credentials.
    pub fn connection_url(&self) -> anyhow::Result<String> {
        let mut url = Url::parse(&format!(
            "postgres://{}:{}/{}",
            self.host, self.port, self.database
        ))?;

        url.set_username(&self.username)
            .map_err(|_| anyhow::anyhow!("cannot set username on database url"))?;
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|_| anyhow::anyhow!("cannot set password on database url"))?;
        }
        url.query_pairs_mut().append_pair("sslmode", &self.ssl_mode);

        Ok(url.into())
    }
}

/// How a contract month code is tested against the caller's month universe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthMatch {
    /// The month must equal one of the parsed universe tokens.
    #[default]
    Exact,
    /// The month must occur anywhere inside the raw universe string.
    Substring,
}

impl fmt::Display for MonthMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonthMatch::Exact => write!(f, "exact"),
            MonthMatch::Substring => write!(f, "substring"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RollingConfig {
    #[serde(rename = "month_match")]
    #[serde(default)]
    pub month_match: MonthMatch,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(rename = "service_name")]
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            format: default_log_format(),
        }
    }
}
