use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, error, warn};

use super::command::{CliInvocation, CommandRunner, ProcessRunner};
use crate::config::ConnectionConfig;
use crate::constants::{ADMIN_DATABASE, SCRATCH_TABLE};
use crate::{Client, ClientOptions, Error, Result};

/// A database that exists for the lifetime of a group of tests.
///
/// [`TestDatabase::set_up`] drops any leftover database of the same name and creates it empty;
/// [`TestDatabase::tear_down`] drops it. If the value is dropped without `tear_down`, the database
/// is dropped on a best-effort basis.
pub struct TestDatabase {
    config:          ConnectionConfig,
    runner:          Arc<dyn CommandRunner>,
    destroy_on_drop: bool,
}

impl TestDatabase {
    /// Provision `config.database` using the `clickhouse-client` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailure`] if either statement fails.
    pub fn set_up(config: ConnectionConfig) -> Result<Self> {
        Self::set_up_with_runner(config, Arc::new(ProcessRunner::default()))
    }

    /// Provision `config.database` through `runner`.
    ///
    /// # Errors
    ///
    /// See [`TestDatabase::set_up`].
    pub fn set_up_with_runner(
        config: ConnectionConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let mut database = Self { config, runner, destroy_on_drop: false };
        let name = database.name().to_string();

        let drop_stale = format!("DROP DATABASE IF EXISTS {name}");
        for statement in [drop_stale, format!("CREATE DATABASE {name}")] {
            drop(database.emit_command(&statement, Some(ADMIN_DATABASE))?);
        }
        database.destroy_on_drop = true;

        debug!(database = %name, "test database ready");
        Ok(database)
    }

    pub fn config(&self) -> &ConnectionConfig { &self.config }

    pub fn name(&self) -> &str { &self.config.database }

    /// Run `statement` with `clickhouse-client` against `database` (default: the test database).
    ///
    /// Blocks until the process exits. Must not be called from within an async context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailure`] if the process wrote anything to stderr, even if it also
    /// produced output, and [`Error::Io`] if it could not be run.
    pub fn emit_command(&self, statement: &str, database: Option<&str>) -> Result<String> {
        let invocation = CliInvocation {
            database: database.unwrap_or(&self.config.database).to_string(),
            host:     self.config.host.clone(),
            port:     self.config.port,
            query:    statement.to_string(),
        };
        debug!(database = %invocation.database, statement, "emitting command");
        self.runner.run(&invocation)?.into_stdout()
    }

    /// Whether `table` exists in the test database.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or its output is not `0` or `1`.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let output = self.emit_command(&format!("EXISTS TABLE {}.{table}", self.name()), None)?;
        parse_exists(output)
    }

    /// Whether the test database exists, checked from the administrative database.
    ///
    /// # Errors
    ///
    /// See [`TestDatabase::table_exists`].
    pub fn exists(&self) -> Result<bool> {
        let output =
            self.emit_command(&format!("EXISTS DATABASE {}", self.name()), Some(ADMIN_DATABASE))?;
        parse_exists(output)
    }

    /// Create the scratch table (`ENGINE = Memory`) with the given column definitions, ie
    /// `"x Int32, y String"`. The table is dropped when the returned guard goes away.
    ///
    /// # Errors
    ///
    /// Returns an error if the table could not be created; nothing is dropped in that case.
    pub fn create_table(&self, columns: &str) -> Result<ScratchTable<'_>> {
        let statement = format!("CREATE TABLE {SCRATCH_TABLE} ({columns}) ENGINE = Memory");
        drop(self.emit_command(&statement, None)?);
        Ok(ScratchTable { database: self, name: SCRATCH_TABLE, dropped: false })
    }

    /// Run `body` with the scratch table in place, dropping it afterwards on every path.
    ///
    /// An error from `body` is returned unchanged when the drop succeeds. If both fail, the
    /// result is [`Error::Cleanup`] with `body`'s error as its source (see [`Error::original`]).
    ///
    /// # Errors
    ///
    /// Returns the creation error, `body`'s error, or the drop error, as described above.
    pub fn with_table<T, F>(&self, columns: &str, body: F) -> Result<T>
    where
        F: FnOnce(&ScratchTable<'_>) -> Result<T>,
    {
        let table = self.create_table(columns)?;
        let result = body(&table);
        match (result, table.drop_table()) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(cleanup)) => Err(cleanup),
            (Err(original), Ok(())) => Err(original),
            (Err(original), Err(cleanup)) => {
                warn!(%original, %cleanup, "scratch table cleanup failed after an error");
                Err(original.with_cleanup(cleanup))
            }
        }
    }

    /// Drop the test database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailure`] if the drop fails.
    pub fn tear_down(mut self) -> Result<()> {
        self.destroy_on_drop = false;
        drop(self.emit_command(&format!("DROP DATABASE {}", self.name()), None)?);
        debug!(database = self.name(), "test database dropped");
        Ok(())
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        if self.destroy_on_drop {
            let statement = format!("DROP DATABASE IF EXISTS {}", self.name());
            if let Err(error) = self.emit_command(&statement, Some(ADMIN_DATABASE)) {
                error!(database = self.name(), %error, "failed to drop test database");
            }
        }
    }
}

fn parse_exists(output: String) -> Result<bool> {
    match output.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        _ => Err(Error::UnexpectedOutput(output)),
    }
}

/// Guard for the scratch table created by [`TestDatabase::create_table`].
///
/// Prefer [`ScratchTable::drop_table`] to observe cleanup errors. Otherwise the table is dropped
/// when the guard is, including while unwinding from a panic, and failures are only logged.
pub struct ScratchTable<'a> {
    database: &'a TestDatabase,
    name:     &'static str,
    dropped:  bool,
}

impl ScratchTable<'_> {
    pub fn name(&self) -> &str { self.name }

    /// Fully qualified name, ie `test_db.test`.
    pub fn qualified_name(&self) -> String { format!("{}.{}", self.database.name(), self.name) }

    /// Drop the table now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailure`] if the drop fails.
    pub fn drop_table(mut self) -> Result<()> {
        self.dropped = true;
        drop(self.database.emit_command(&format!("DROP TABLE {}", self.name), None)?);
        Ok(())
    }
}

impl Drop for ScratchTable<'_> {
    fn drop(&mut self) {
        if !self.dropped {
            let statement = format!("DROP TABLE {}", self.name);
            if let Err(error) = self.database.emit_command(&statement, None) {
                error!(table = self.name, %error, "failed to drop scratch table");
            }
        }
    }
}

/// Per-test state: a fresh current-thread runtime and a client bound to it.
///
/// [`TestCase::tear_down`] disconnects the client, then shuts the runtime down. Dropping a
/// `TestCase` without calling it does the same on a best-effort basis, so the runtime is released
/// even when a test panics. Dropped from within another runtime, it can't block on the disconnect,
/// so the runtime is shut down in the background instead.
pub struct TestCase<'a> {
    database: &'a TestDatabase,
    handle:   Handle,
    /// `None` only once released.
    runtime:  Option<Runtime>,
    client:   Client,
}

impl<'a> TestCase<'a> {
    /// # Errors
    ///
    /// Returns an error if the runtime or the client can't be built. Anything already built is
    /// released before returning.
    pub fn set_up(database: &'a TestDatabase) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let handle = runtime.handle().clone();
        let options = ClientOptions::new().with_runtime(handle.clone());
        let client = match Client::from_config(database.config(), options) {
            Ok(client) => client,
            Err(error) => {
                release(runtime);
                return Err(error);
            }
        };
        debug!(client_id = client.client_id, database = database.name(), "test case set up");
        Ok(Self { database, handle, runtime: Some(runtime), client })
    }

    pub fn client(&self) -> &Client { &self.client }

    pub fn database(&self) -> &'a TestDatabase { self.database }

    pub fn runtime(&self) -> &Handle { &self.handle }

    /// Build another client for the test database, bound to this test's runtime unless `options`
    /// names a different one. No I/O happens here.
    ///
    /// # Errors
    ///
    /// See [`Client::new`].
    pub fn create_client(&self, options: ClientOptions) -> Result<Client> {
        Client::from_config(self.database.config(), options.merge_defaults(&self.handle))
    }

    /// Drive `future` to completion on this test's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        match &self.runtime {
            Some(runtime) => runtime.block_on(future),
            None => self.handle.block_on(future),
        }
    }

    /// Disconnect the client, then stop and release the runtime.
    ///
    /// # Errors
    ///
    /// Returns the disconnect error; the runtime is released either way.
    pub fn tear_down(mut self) -> Result<()> {
        let result = self.block_on(self.client.disconnect());
        debug!(client_id = self.client.client_id, "stopping test runtime");
        if let Some(runtime) = self.runtime.take() {
            release(runtime);
        }
        result
    }
}

impl Drop for TestCase<'_> {
    fn drop(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        if Handle::try_current().is_ok() {
            warn!(client_id = self.client.client_id, "test case dropped inside a runtime");
            runtime.shutdown_background();
            return;
        }
        if let Err(error) = runtime.block_on(self.client.disconnect()) {
            warn!(client_id = self.client.client_id, %error, "failed to disconnect test client");
        }
        release(runtime);
    }
}

/// Stop `runtime`, in the background when called from within another runtime.
fn release(runtime: Runtime) {
    if Handle::try_current().is_ok() {
        runtime.shutdown_background();
    } else {
        drop(runtime);
    }
}
