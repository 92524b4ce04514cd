use std::sync::Arc;

/// Named logger handle.
///
/// Components receive a `Logger` at construction and log through
/// `target: log.target()`, so every record carries the component's
/// dotted name (e.g. `monitoring.wallet`) without any global state
/// besides the `log` facade itself.
#[derive(Debug, Clone)]
pub struct Logger {
    name: Arc<str>,
}

impl Logger {
    pub fn root(name: &str) -> Self {
        Self { name: Arc::from(name) }
    }

    /// Returns a child logger: `monitoring` + `wallet` -> `monitoring.wallet`.
    pub fn named(&self, child: &str) -> Self {
        Self {
            name: Arc::from(format!("{}.{}", self.name, child)),
        }
    }

    pub fn target(&self) -> &str {
        &self.name
    }
}

/// Initializes the process-wide `env_logger` backend.
///
/// `RUST_LOG` always wins; otherwise the default level is `info`,
/// or `debug` when verbose logging is enabled in the config.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .init();
}
