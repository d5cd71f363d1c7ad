use tokio::runtime::Handle;

/// Options recognized by [`super::Client::new`].
///
/// `runtime` is the loop the client is bound to: every operation is spawned onto it.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub runtime:     Option<Handle>,
    /// Server settings sent with every query, ie `("max_threads", "1")`.
    pub settings:    Vec<(String, String)>,
    /// Request LZ4 compressed responses.
    pub compression: bool,
}

impl ClientOptions {
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    #[must_use]
    pub fn with_setting(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.settings.push((name.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// Bind to `runtime` unless a runtime was already chosen.
    #[must_use]
    pub fn merge_defaults(mut self, runtime: &Handle) -> Self {
        if self.runtime.is_none() {
            self.runtime = Some(runtime.clone());
        }
        self
    }
}
