//! Fixtures for tests that need a live ClickHouse.
//!
//! [`TestDatabase`] provisions a throwaway database once per group of tests, [`TestCase`] gives
//! each test its own runtime and [`crate::Client`], and [`ScratchTable`] scopes a table to a
//! block. Administrative statements go through `clickhouse-client` via a [`CommandRunner`], which
//! can be swapped out.
mod command;
mod fixture;
mod logging;

pub use command::{CliInvocation, CommandOutput, CommandRunner, ProcessRunner};
pub use fixture::{ScratchTable, TestCase, TestDatabase};
pub use logging::init_tracing;
