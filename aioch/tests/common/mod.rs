use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::Arc;

use aioch::test_utils::{CliInvocation, CommandOutput, CommandRunner};
use aioch::{ADMIN_DATABASE, ConnectionConfig};
use parking_lot::Mutex;

#[allow(unused)]
pub(crate) const TEST_DB_NAME: &str = "aioch_test";

#[allow(unused)]
pub(crate) fn test_config() -> ConnectionConfig {
    ConnectionConfig::new("localhost", 9000, TEST_DB_NAME)
}

/// Stands in for `clickhouse-client`, tracking just enough catalog state to answer the
/// statements the fixtures emit.
#[derive(Default)]
pub(crate) struct FakeClickHouse {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    databases: BTreeMap<String, BTreeSet<String>>,
    log:       Vec<CliInvocation>,
    canned:    Vec<(String, CommandOutput)>,
}

#[allow(unused)]
impl FakeClickHouse {
    pub(crate) fn new() -> Self {
        let fake = Self::default();
        drop(fake.state.lock().databases.insert(ADMIN_DATABASE.to_string(), BTreeSet::new()));
        fake
    }

    /// This fake as the runner handed to the fixtures.
    pub(crate) fn runner(self: &Arc<Self>) -> Arc<dyn CommandRunner> {
        let runner: Arc<Self> = Arc::clone(self);
        runner
    }

    /// Answer statements starting with `prefix` with `output` instead of interpreting them.
    pub(crate) fn respond(&self, prefix: &str, output: CommandOutput) {
        self.state.lock().canned.push((prefix.to_string(), output));
    }

    pub(crate) fn fail(&self, prefix: &str, stderr: &str) {
        self.respond(prefix, CommandOutput::new("", stderr));
    }

    pub(crate) fn add_database(&self, name: &str, tables: &[&str]) {
        let tables = tables.iter().map(ToString::to_string).collect();
        drop(self.state.lock().databases.insert(name.to_string(), tables));
    }

    pub(crate) fn tables(&self, database: &str) -> Option<Vec<String>> {
        self.state.lock().databases.get(database).map(|t| t.iter().cloned().collect())
    }

    pub(crate) fn log(&self) -> Vec<CliInvocation> { self.state.lock().log.clone() }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.state.lock().log.iter().map(|i| i.query.clone()).collect()
    }
}

impl CommandRunner for FakeClickHouse {
    fn run(&self, invocation: &CliInvocation) -> io::Result<CommandOutput> {
        let mut state = self.state.lock();
        state.log.push(invocation.clone());

        let query = invocation.query.trim();
        let canned = state.canned.iter().find(|(prefix, _)| query.starts_with(prefix.as_str()));
        if let Some((_, output)) = canned {
            return Ok(output.clone());
        }

        Ok(state.interpret(&invocation.database, query))
    }
}

impl State {
    fn interpret(&mut self, current: &str, query: &str) -> CommandOutput {
        if !self.databases.contains_key(current) {
            return exception(81, &format!("Database {current} does not exist"));
        }

        if let Some(name) = query.strip_prefix("DROP DATABASE IF EXISTS ") {
            drop(self.databases.remove(name));
            return ok("");
        }
        if let Some(name) = query.strip_prefix("DROP DATABASE ") {
            return match self.databases.remove(name) {
                Some(_) => ok(""),
                None => exception(81, &format!("Database {name} does not exist")),
            };
        }
        if let Some(name) = query.strip_prefix("CREATE DATABASE ") {
            if self.databases.contains_key(name) {
                return exception(82, &format!("Database {name} already exists"));
            }
            drop(self.databases.insert(name.to_string(), BTreeSet::new()));
            return ok("");
        }
        if let Some(name) = query.strip_prefix("EXISTS DATABASE ") {
            return ok(if self.databases.contains_key(name) { "1\n" } else { "0\n" });
        }
        if let Some(rest) = query.strip_prefix("CREATE TABLE ") {
            let name = rest.split(|c: char| c == '(' || c.is_whitespace()).next().unwrap_or("");
            let (database, table) = qualify(current, name);
            let Some(tables) = self.databases.get_mut(&database) else {
                return exception(81, &format!("Database {database} does not exist"));
            };
            if !tables.insert(table.clone()) {
                return exception(57, &format!("Table {database}.{table} already exists"));
            }
            return ok("");
        }
        if let Some(name) = query.strip_prefix("DROP TABLE ") {
            let (database, table) = qualify(current, name);
            let removed = self.databases.get_mut(&database).is_some_and(|t| t.remove(&table));
            if !removed {
                return exception(60, &format!("Table {database}.{table} does not exist"));
            }
            return ok("");
        }
        if let Some(name) = query.strip_prefix("EXISTS TABLE ") {
            let (database, table) = qualify(current, name);
            let exists = self.databases.get(&database).is_some_and(|t| t.contains(&table));
            return ok(if exists { "1\n" } else { "0\n" });
        }
        if query == "SELECT 1" {
            return ok("1\n");
        }

        exception(62, &format!("Syntax error: failed at position 1 ({query})"))
    }
}

fn qualify(current: &str, name: &str) -> (String, String) {
    match name.split_once('.') {
        Some((database, table)) => (database.to_string(), table.to_string()),
        None => (current.to_string(), name.to_string()),
    }
}

fn ok(stdout: &str) -> CommandOutput { CommandOutput::new(stdout, "") }

fn exception(code: u16, message: &str) -> CommandOutput {
    CommandOutput::new("", format!("Code: {code}. DB::Exception: {message}.\n"))
}
