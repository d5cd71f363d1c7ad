use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a fmt subscriber for tests, once per process.
///
/// The filter comes from `RUST_LOG` (default `info`), plus any `(target, level)` directives.
pub fn init_tracing(directives: Option<&[(&str, &str)]>) {
    INIT.call_once(|| {
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        for (target, level) in directives.unwrap_or_default() {
            match format!("{target}={level}").parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(error) => eprintln!("ignoring tracing directive {target}={level}: {error}"),
            }
        }

        // Another subscriber may already be installed by the test binary
        drop(tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init());
    });
}
