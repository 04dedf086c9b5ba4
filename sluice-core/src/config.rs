use crate::{ConfigError, Error, Result};
use std::{env, fmt};
use url::Url;

pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_CHARSET: &str = "utf8mb4";

/// Immutable connection settings, created once at process start and shared
/// by reference afterwards.
#[derive(Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
    pub charset: String,
    pub description: Option<String>,
}

impl ConnectionConfig {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
            port: DEFAULT_PORT,
            charset: DEFAULT_CHARSET.into(),
            description: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Read the configuration from `MYSQL_HOST`, `MYSQL_USER`,
    /// `MYSQL_PASSWORD`, `MYSQL_DATABASE`, `MYSQL_PORT`, `MYSQL_CHARSET` and
    /// `MYSQL_DATABASE_DESCRIPTION`. Missing required entries fail fast with
    /// a [`ConfigError`] naming the variable, before any connection attempt.
    pub fn from_env() -> Result<Self> {
        fn required(key: &'static str) -> Result<String> {
            Ok(env::var(key)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))?)
        }
        fn optional(key: &str) -> Option<String> {
            env::var(key).ok().filter(|v| !v.is_empty())
        }
        let port = match optional("MYSQL_PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid("MYSQL_PORT"))?,
            None => DEFAULT_PORT,
        };
        Ok(Self {
            host: required("MYSQL_HOST")?,
            user: required("MYSQL_USER")?,
            password: required("MYSQL_PASSWORD")?,
            database: required("MYSQL_DATABASE")?,
            port,
            charset: optional("MYSQL_CHARSET").unwrap_or_else(|| DEFAULT_CHARSET.into()),
            description: optional("MYSQL_DATABASE_DESCRIPTION"),
        })
    }

    /// Render the `mysql://` URL the driver connects to. Credentials are
    /// percent encoded by the URL setters.
    pub fn url(&self) -> Result<Url> {
        let mut url = Url::parse("mysql://localhost")?;
        url.set_host(Some(&self.host))?;
        url.set_port(Some(self.port))
            .map_err(|_| Error::msg("cannot apply the port to the MySQL url"))?;
        url.set_username(&self.user)
            .map_err(|_| Error::msg("cannot apply the user to the MySQL url"))?;
        url.set_password(Some(&self.password))
            .map_err(|_| Error::msg("cannot apply the password to the MySQL url"))?;
        url.set_path(&self.database);
        Ok(url)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("port", &self.port)
            .field("charset", &self.charset)
            .field("description", &self.description)
            .finish()
    }
}
