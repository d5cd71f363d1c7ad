mod options;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use clickhouse::{Compression, Row};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use strum::AsRefStr;
use tokio::runtime::Handle;
use tracing::{debug, instrument, trace};

pub use self::options::ClientOptions;
use crate::config::ConnectionConfig;
use crate::{Error, Result};

static CLIENT_ID: AtomicU16 = AtomicU16::new(0);

/// Whether a [`Client`] can still issue queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
pub enum ConnectionStatus {
    Open,
    Disconnected,
}

/// Client handle for ClickHouse, bound to a single tokio runtime.
///
/// Construction does no network I/O. Every operation is spawned onto the bound runtime and
/// awaited, so the handle can be cloned freely but all work happens on that runtime. After
/// [`Client::disconnect`], every operation fails with [`Error::Disconnected`].
#[derive(Clone)]
pub struct Client {
    pub client_id: u16,
    inner:         Arc<Inner>,
}

struct Inner {
    database:  String,
    runtime:   Handle,
    transport: Mutex<Option<clickhouse::Client>>,
}

impl Client {
    /// Build a client for `host:port` (HTTP interface).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingRuntime`] if `options` names no runtime and none is current.
    pub fn new(
        host: &str,
        port: u16,
        database: &str,
        user: &str,
        password: &str,
        options: ClientOptions,
    ) -> Result<Self> {
        let runtime = match options.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| Error::MissingRuntime)?,
        };

        let mut transport = clickhouse::Client::default()
            .with_url(format!("http://{host}:{port}"))
            .with_user(user)
            .with_password(password)
            .with_database(database)
            .with_compression(if options.compression {
                Compression::Lz4
            } else {
                Compression::None
            });
        for (name, value) in options.settings {
            transport = transport.with_option(name, value);
        }

        let client_id = CLIENT_ID.fetch_add(1, Ordering::Relaxed);
        debug!(client_id, host, port, database, "created client");

        Ok(Client {
            client_id,
            inner: Arc::new(Inner {
                database: database.to_string(),
                runtime,
                transport: Mutex::new(Some(transport)),
            }),
        })
    }

    /// Build a client from `config`, using its HTTP port.
    ///
    /// # Errors
    ///
    /// See [`Client::new`].
    pub fn from_config(config: &ConnectionConfig, options: ClientOptions) -> Result<Self> {
        Self::new(
            &config.host,
            config.http_port,
            &config.database,
            &config.user,
            &config.password,
            options,
        )
    }

    pub fn database(&self) -> &str { &self.inner.database }

    pub fn status(&self) -> ConnectionStatus {
        if self.inner.transport.lock().is_some() {
            ConnectionStatus::Open
        } else {
            ConnectionStatus::Disconnected
        }
    }

    /// Handle of the runtime this client is bound to.
    pub fn runtime(&self) -> &Handle { &self.inner.runtime }

    /// Execute a statement that returns no rows (DDL, INSERT ... VALUES, etc).
    ///
    /// # Errors
    ///
    /// Returns an error if the client is disconnected or the server rejects the statement.
    #[instrument(
        level = "debug",
        name = "clickhouse.execute",
        skip_all,
        fields(db.system = "clickhouse", clickhouse.client.id = self.client_id, query = %query)
    )]
    pub async fn execute(&self, query: &str) -> Result<()> {
        let query = query.to_string();
        self.run(move |ch| async move { ch.query(&query).execute().await }).await
    }

    /// Fetch every row of `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is disconnected, the query fails, or rows don't decode as
    /// `T`.
    #[instrument(
        level = "debug",
        name = "clickhouse.fetch_all",
        skip_all,
        fields(db.system = "clickhouse", clickhouse.client.id = self.client_id, query = %query)
    )]
    pub async fn fetch_all<T>(&self, query: &str) -> Result<Vec<T>>
    where
        T: Row + DeserializeOwned + Send + 'static,
    {
        let query = query.to_string();
        self.run(move |ch| async move { ch.query(&query).fetch_all::<T>().await }).await
    }

    /// Fetch exactly one row of `query`.
    ///
    /// # Errors
    ///
    /// As [`Client::fetch_all`], and also if the query yields no rows.
    #[instrument(
        level = "debug",
        name = "clickhouse.fetch_one",
        skip_all,
        fields(db.system = "clickhouse", clickhouse.client.id = self.client_id, query = %query)
    )]
    pub async fn fetch_one<T>(&self, query: &str) -> Result<T>
    where
        T: Row + DeserializeOwned + Send + 'static,
    {
        let query = query.to_string();
        self.run(move |ch| async move { ch.query(&query).fetch_one::<T>().await }).await
    }

    /// Round trip to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is disconnected or the server is unreachable.
    pub async fn ping(&self) -> Result<()> {
        trace!(client_id = self.client_id, "sending ping");
        self.execute("SELECT 1").await
    }

    /// Release the underlying transport. Safe to call more than once.
    ///
    /// The transport is dropped on the bound runtime, where its pooled connections live.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] if the bound runtime is shutting down.
    pub async fn disconnect(&self) -> Result<()> {
        let Some(transport) = self.inner.transport.lock().take() else {
            trace!(client_id = self.client_id, "already disconnected");
            return Ok(());
        };
        self.inner.runtime.spawn(async move { drop(transport) }).await?;
        debug!(client_id = self.client_id, "disconnected");
        Ok(())
    }

    async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(clickhouse::Client) -> Fut,
        Fut: Future<Output = clickhouse::error::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let transport = self.inner.transport.lock().clone().ok_or(Error::Disconnected)?;
        Ok(self.inner.runtime.spawn(op(transport)).await??)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("client_id", &self.client_id)
            .field("database", &self.inner.database)
            .field("status", &self.status().as_ref())
            .finish_non_exhaustive()
    }
}
