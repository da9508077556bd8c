//! Config Resolver
//!
//! Produces the database [`ConnectionParams`] the collector dials on every
//! scrape. Exactly one source is used per run: a `wp-config.php` file when a
//! path is supplied, explicit flags otherwise. The two are never merged.

pub mod wp_config;

use std::fmt;
use std::path::PathBuf;

use tracing::info;

use crate::error::{Error, Result};

/// Default table prefix of a stock WordPress install.
pub const DEFAULT_TABLE_PREFIX: &str = "wp_";

/// Default MySQL host used in flag mode.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default MySQL port used in flag mode.
pub const DEFAULT_PORT: &str = "3306";

// =============================================================================
// Connection Parameters
// =============================================================================

/// Credentials and table prefix for the monitored WordPress database.
///
/// `host` is the address as it will be dialed. In flag mode it is
/// `host:port`; in config-file mode it is the verbatim `DB_HOST` value, which
/// WordPress allows to be `host`, `host:port` or `host:/path/to/mysqld.sock`.
///
/// `table_prefix` is trusted input: it is concatenated into SQL text without
/// escaping, on the assumption that it comes from the operator or from a local
/// config file they control.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub table_prefix: String,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("table_prefix", &self.table_prefix)
            .finish()
    }
}

// =============================================================================
// Flag Mode
// =============================================================================

/// Connection settings given explicitly on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagParams {
    pub host: String,
    pub port: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub table_prefix: String,
}

impl Default for FlagParams {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT.to_string(),
            database: String::new(),
            user: String::new(),
            password: String::new(),
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
        }
    }
}

impl FlagParams {
    /// Validate the flags and build connection parameters.
    ///
    /// `database` and `user` must be non-empty; the password may be empty.
    pub fn into_params(self) -> Result<ConnectionParams> {
        if self.database.is_empty() {
            return Err(Error::MissingRequiredParameter { flag: "db" });
        }
        if self.user.is_empty() {
            return Err(Error::MissingRequiredParameter { flag: "user" });
        }

        Ok(ConnectionParams {
            host: format!("{}:{}", self.host, self.port),
            database: self.database,
            user: self.user,
            password: self.password,
            table_prefix: self.table_prefix,
        })
    }
}

// =============================================================================
// Source Selection
// =============================================================================

/// Where the connection parameters come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Directory containing `wp-config.php`
    WpConfig(PathBuf),
    /// Explicit flags
    Flags(FlagParams),
}

impl ConfigSource {
    /// A non-empty config path takes precedence over the flags.
    pub fn select(wpconfig: Option<PathBuf>, flags: FlagParams) -> Self {
        match wpconfig {
            Some(path) if !path.as_os_str().is_empty() => ConfigSource::WpConfig(path),
            _ => ConfigSource::Flags(flags),
        }
    }
}

/// Field extracted from `wp-config.php`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    DbHost,
    DbName,
    DbUser,
    DbPassword,
    TablePrefix,
}

impl ConfigField {
    /// Fields in extraction order.
    pub const ALL: [ConfigField; 5] = [
        ConfigField::DbHost,
        ConfigField::DbName,
        ConfigField::DbUser,
        ConfigField::DbPassword,
        ConfigField::TablePrefix,
    ];

    /// Name as it appears in the config file.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigField::DbHost => "DB_HOST",
            ConfigField::DbName => "DB_NAME",
            ConfigField::DbUser => "DB_USER",
            ConfigField::DbPassword => "DB_PASSWORD",
            ConfigField::TablePrefix => "$table_prefix",
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve connection parameters from the selected source.
pub fn resolve(source: ConfigSource) -> Result<ConnectionParams> {
    let params = match source {
        ConfigSource::WpConfig(dir) => {
            info!(path = %dir.display(), "Reading credentials from wp-config.php");
            wp_config::load(&dir)?
        }
        ConfigSource::Flags(flags) => flags.into_params()?,
    };

    info!(
        host = %params.host,
        database = %params.database,
        user = %params.user,
        table_prefix = %params.table_prefix,
        "Resolved database connection parameters"
    );
    Ok(params)
}
