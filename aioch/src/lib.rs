//! Async ClickHouse client handle bound to a tokio runtime.
//!
//! Query execution is delegated to the [`clickhouse`] crate over HTTP. This crate adds the
//! runtime binding, explicit connection configuration, and (behind `test-utils`) fixtures for
//! provisioning throwaway databases and tables through `clickhouse-client`.
//!
//! ```rust,ignore
//! use aioch::{Client, ClientOptions, ConnectionConfig};
//!
//! let config = ConnectionConfig::load("setup.cfg")?;
//! let client = Client::from_config(&config, ClientOptions::new())?;
//! client.execute("CREATE TABLE t (x Int32) ENGINE = Memory").await?;
//! client.disconnect().await?;
//! ```

mod client;
mod config;
mod constants;
mod errors;
#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use client::*;
pub use self::config::ConnectionConfig;
pub use constants::*;
pub use errors::*;

/// Re-exports
pub use reexports::*;
mod reexports {
    pub use {clickhouse, tracing};
}

