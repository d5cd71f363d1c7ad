/// Native protocol port, used by `clickhouse-client`.
pub const DEFAULT_NATIVE_PORT: u16 = 9000;
/// HTTP interface port, used by [`crate::Client`].
pub const DEFAULT_HTTP_PORT: u16 = 8123;
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_USER: &str = "default";

/// Database that always exists and is used for administrative statements.
pub const ADMIN_DATABASE: &str = "default";

/// Config file read when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "setup.cfg";
/// Set this environment variable to read the connection config from another file.
pub const CONFIG_PATH_ENV_VAR: &str = "AIOCH_CONFIG";
/// Prefix for environment overrides, ie `AIOCH_DB__HOST`.
pub(crate) const CONFIG_ENV_PREFIX: &str = "AIOCH";
/// Section of the config file holding connection parameters.
pub(crate) const CONFIG_SECTION: &str = "db";

/// Name of the scratch table created by the test fixture.
#[cfg(feature = "test-utils")]
pub const SCRATCH_TABLE: &str = "test";
/// Executable invoked to emit administrative statements.
#[cfg(feature = "test-utils")]
pub const CLICKHOUSE_CLIENT_BIN: &str = "clickhouse-client";
