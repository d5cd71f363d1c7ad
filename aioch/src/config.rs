//! Connection parameters, read from an ini-style file.
//!
//! ```ini
//! [db]
//! host = localhost
//! port = 9000
//! database = test
//! user = default
//! password =
//! ```
//!
//! Any key can be overridden from the environment, ie `AIOCH_DB__HOST=ch.internal`.
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use config::{Environment, File, FileFormat};
use serde::Deserialize;
use tracing::debug;

use crate::constants::*;
use crate::errors::Result;

/// Connection parameters shared by the client and the test fixtures.
///
/// Built once and passed explicitly; nothing here is global.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    pub host:      String,
    /// Native protocol port, as used by `clickhouse-client`.
    pub port:      u16,
    /// HTTP port, as used by [`crate::Client`].
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    pub database:  String,
    #[serde(default = "default_user")]
    pub user:      String,
    #[serde(default)]
    pub password:  String,
}

fn default_http_port() -> u16 { DEFAULT_HTTP_PORT }

fn default_user() -> String { DEFAULT_USER.to_string() }

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            http_port: DEFAULT_HTTP_PORT,
            database: database.into(),
            user: DEFAULT_USER.to_string(),
            password: String::new(),
        }
    }

    #[must_use]
    pub fn with_http_port(mut self, http_port: u16) -> Self {
        self.http_port = http_port;
        self
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Base url of the HTTP interface.
    pub fn http_url(&self) -> String { format!("http://{}:{}", self.host, self.http_port) }

    /// Load the `[db]` section of the ini file at `path`, then apply `AIOCH_DB__*` overrides.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] if the file is missing, a required key is absent,
    /// or a port is not a number.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_env(path.as_ref(), env_source())
    }

    /// Load from `$AIOCH_CONFIG`, falling back to `setup.cfg` in the working directory.
    ///
    /// # Errors
    ///
    /// See [`ConnectionConfig::load`].
    pub fn load_default() -> Result<Self> {
        Self::load(config_path(std::env::var_os(CONFIG_PATH_ENV_VAR)))
    }

    fn load_with_env(path: &Path, env: Environment) -> Result<Self> {
        debug!(path = %path.display(), "loading connection config");
        let settings = config::Config::builder()
            .add_source(File::new(&path.to_string_lossy(), FileFormat::Ini).required(true))
            .add_source(env)
            .build()?;
        Ok(settings.get::<Self>(CONFIG_SECTION)?)
    }
}

fn config_path(from_env: Option<OsString>) -> PathBuf {
    from_env.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
}

fn env_source() -> Environment {
    Environment::with_prefix(CONFIG_ENV_PREFIX).prefix_separator("_").separator("__")
}

impl Default for ConnectionConfig {
    fn default() -> Self { Self::new(DEFAULT_HOST, DEFAULT_NATIVE_PORT, ADMIN_DATABASE) }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("http_port", &self.http_port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[redacted]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::Error;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".cfg").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn no_env() -> Environment { env_source().source(Some(config::Map::new())) }

    #[test]
    fn test_load_db_section() {
        let file = write_config(
            "[db]\nhost = ch.local\nport = 19000\ndatabase = test\nuser = tester\npassword = \
             secret\n\n[other]\nhost = ignored\n",
        );

        let config = ConnectionConfig::load_with_env(file.path(), no_env()).unwrap();
        assert_eq!(config.host, "ch.local");
        assert_eq!(config.port, 19000);
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.database, "test");
        assert_eq!(config.user, "tester");
        assert_eq!(config.password, "secret");
    }

    #[test]
    fn test_load_optional_keys() {
        let file =
            write_config("[db]\nhost = localhost\nport = 9000\nhttp_port = 18123\ndatabase = t\n");

        let config = ConnectionConfig::load_with_env(file.path(), no_env()).unwrap();
        assert_eq!(config.http_port, 18123);
        assert_eq!(config.user, DEFAULT_USER);
        assert_eq!(config.password, "");
        assert_eq!(config.http_url(), "http://localhost:18123");
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config("[db]\nhost = localhost\nport = 9000\ndatabase = test\n");
        let env = env_source().source(Some(config::Map::from([
            ("AIOCH_DB__HOST".to_string(), "ch.ci".to_string()),
            ("AIOCH_DB__DATABASE".to_string(), "ci_test".to_string()),
        ])));

        let config = ConnectionConfig::load_with_env(file.path(), env).unwrap();
        assert_eq!(config.host, "ch.ci");
        assert_eq!(config.database, "ci_test");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let file = write_config("[db]\nhost = localhost\ndatabase = test\n");
        let err = ConnectionConfig::load_with_env(file.path(), no_env()).unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("port")));
    }

    #[test]
    fn test_bad_port_is_configuration_error() {
        let file = write_config("[db]\nhost = localhost\nport = nine\ndatabase = test\n");
        let err = ConnectionConfig::load_with_env(file.path(), no_env()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConnectionConfig::load_with_env(&dir.path().join("setup.cfg"), no_env())
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_config_path_falls_back_to_setup_cfg() {
        assert_eq!(config_path(None), PathBuf::from("setup.cfg"));
        assert_eq!(config_path(Some("ci.cfg".into())), PathBuf::from("ci.cfg"));
    }

    #[test]
    fn test_load_default_reads_path_from_env() {
        let file = write_config("[db]\nhost = ch.env\nport = 9440\ndatabase = from_env\n");
        // SAFETY: no other test reads or writes this variable
        unsafe { std::env::set_var(CONFIG_PATH_ENV_VAR, file.path()) };
        let result = ConnectionConfig::load_default();
        unsafe { std::env::remove_var(CONFIG_PATH_ENV_VAR) };

        let config = result.unwrap();
        assert_eq!(config.host, "ch.env");
        assert_eq!(config.port, 9440);
        assert_eq!(config.database, "from_env");
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectionConfig::default().with_password("hunter2");
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[redacted]"));
    }
}
