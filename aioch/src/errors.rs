use std::string::FromUtf8Error;

/// Represents various library errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("string utf-8 conversion error: {0}")]
    FromUtf8(#[from] FromUtf8Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("clickhouse error: {0}")]
    Clickhouse(#[from] clickhouse::error::Error),
    #[error("no runtime to bind the client to, pass one in ClientOptions")]
    MissingRuntime,
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("client is disconnected")]
    Disconnected,

    // Test fixture
    #[error("Error during communication. {stderr}")]
    CommandFailure { stderr: String },
    #[error("unexpected command output: {0:?}")]
    UnexpectedOutput(String),
    #[error("{original} (cleanup also failed: {cleanup})")]
    Cleanup {
        #[source]
        original: Box<Error>,
        cleanup:  Box<Error>,
    },
}

impl Error {
    /// Attach a failed cleanup to the error that caused the scope to exit.
    #[must_use]
    pub fn with_cleanup(self, cleanup: Error) -> Self {
        Error::Cleanup { original: Box::new(self), cleanup: Box::new(cleanup) }
    }

    /// The error that ended a scope, looking through any cleanup failure chained onto it.
    pub fn original(&self) -> &Error {
        match self {
            Error::Cleanup { original, .. } => original.original(),
            x => x,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self { Error::Configuration(err.to_string()) }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self { Error::Runtime(err.to_string()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
