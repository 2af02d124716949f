//! Connection settings.
//!
//! A [`PgConfig`] is read from a `postgres://` URL. Query parameters the
//! driver understands (`sslmode`, `connect_timeout`, `application_name`)
//! configure the connection; every other parameter becomes a server setting
//! sent at startup, which is how `search_path` and `statement_timeout` reach
//! the session.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{PgError, PgResult};

const DEFAULT_PORT: u16 = 5432;
const DEFAULT_USER: &str = "postgres";

/// The server and database a pool connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

/// SSL negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
}

impl SslMode {
    fn parse(value: &str) -> PgResult<Self> {
        match value {
            "disable" => Ok(Self::Disable),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            other => Err(PgError::config(format!("unsupported sslmode '{}'", other))),
        }
    }
}

impl From<SslMode> for tokio_postgres::config::SslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => Self::Disable,
            SslMode::Prefer => Self::Prefer,
            SslMode::Require => Self::Require,
        }
    }
}

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct PgConfig {
    pub endpoint: Endpoint,
    pub password: Option<String>,
    pub ssl_mode: SslMode,
    /// Limit on opening a single connection.
    pub connect_timeout: Option<Duration>,
    /// Reported in `pg_stat_activity`.
    pub application_name: Option<String>,
    /// Server settings applied to every session, e.g. `search_path`.
    pub settings: BTreeMap<String, String>,
}

impl PgConfig {
    /// Parse a `postgres://` or `postgresql://` URL.
    pub fn from_url(url: impl AsRef<str>) -> PgResult<Self> {
        let parsed = Url::parse(url.as_ref()).map_err(|e| PgError::config(format!("invalid database URL: {}", e)))?;
        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(PgError::config(format!(
                "unsupported URL scheme '{}', use postgres:// or postgresql://",
                parsed.scheme()
            )));
        }

        let endpoint = Endpoint {
            host: parsed
                .host_str()
                .filter(|h| !h.is_empty())
                .ok_or_else(|| PgError::config("database URL has no host"))?
                .to_string(),
            port: parsed.port().unwrap_or(DEFAULT_PORT),
            database: match parsed.path().trim_start_matches('/') {
                "" => return Err(PgError::config("database URL has no database name")),
                name => name.to_string(),
            },
            user: Some(parsed.username())
                .filter(|u| !u.is_empty())
                .unwrap_or(DEFAULT_USER)
                .to_string(),
        };

        let mut config = Self {
            endpoint,
            password: parsed.password().map(str::to_string),
            ssl_mode: SslMode::default(),
            connect_timeout: None,
            application_name: None,
            settings: BTreeMap::new(),
        };
        for (key, value) in parsed.query_pairs() {
            config.apply_param(&key, &value)?;
        }
        Ok(config)
    }

    /// Parse a URL and resolve unqualified names in `schema`.
    pub fn for_schema(url: impl AsRef<str>, schema: &str) -> PgResult<Self> {
        let mut config = Self::from_url(url)?;
        config.settings.insert("search_path".into(), schema.into());
        Ok(config)
    }

    fn apply_param(&mut self, key: &str, value: &str) -> PgResult<()> {
        match key {
            "sslmode" => self.ssl_mode = SslMode::parse(value)?,
            "connect_timeout" => {
                let secs = value
                    .parse()
                    .map_err(|_| PgError::config(format!("connect_timeout must be whole seconds, got '{}'", value)))?;
                self.connect_timeout = Some(Duration::from_secs(secs));
            }
            "application_name" => self.application_name = Some(value.to_string()),
            "statement_timeout" => {
                value
                    .parse::<u64>()
                    .map_err(|_| PgError::config(format!("statement_timeout must be milliseconds, got '{}'", value)))?;
                self.settings.insert(key.into(), value.into());
            }
            _ => {
                self.settings.insert(key.into(), value.into());
            }
        }
        Ok(())
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = mode;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Cancel statements running longer than `timeout`.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.settings
            .insert("statement_timeout".into(), timeout.as_millis().to_string());
        self
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Startup options string, `-c key=value` per setting.
    pub fn server_options(&self) -> Option<String> {
        if self.settings.is_empty() {
            return None;
        }
        let options: Vec<String> = self
            .settings
            .iter()
            .map(|(key, value)| format!("-c {}={}", key, value))
            .collect();
        Some(options.join(" "))
    }

    /// Driver configuration for opening connections.
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let Endpoint { host, port, database, user } = &self.endpoint;
        let mut pg = tokio_postgres::Config::new();
        pg.host(host).port(*port).dbname(database).user(user);
        pg.ssl_mode(self.ssl_mode.into());

        if let Some(password) = &self.password {
            pg.password(password);
        }
        if let Some(timeout) = self.connect_timeout {
            pg.connect_timeout(timeout);
        }
        if let Some(name) = &self.application_name {
            pg.application_name(name);
        }
        if let Some(options) = self.server_options() {
            pg.options(&options);
        }
        pg
    }
}
