//! Structured logging for PongNet.
//!
//! # Example
//!
//! ```rust,ignore
//! use pongnet::telemetry::{init_tracing, TracingConfig};
//!
//! // Console output, info level
//! init_tracing(TracingConfig::default());
//!
//! // JSON lines for log aggregation
//! init_tracing(TracingConfig::new("pongnet").with_level("debug").with_json());
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tracing configuration.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Service name attached to the startup record.
    pub service_name: String,
    /// Log level filter (e.g., "info", "debug", "pongnet=debug,tower_http=warn").
    pub log_level: String,
    /// Output logs as JSON.
    pub json_output: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "pongnet".into(),
            log_level: "info".into(),
            json_output: false,
        }
    }
}

impl TracingConfig {
    /// Create a new config with service name.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set log level filter.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON output.
    pub fn with_json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_tracing(config: TracingConfig) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if config.json_output {
        let fmt_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);
        registry.with(fmt_layer).try_init().is_ok()
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact();
        registry.with(fmt_layer).try_init().is_ok()
    };

    if installed {
        tracing::info!(
            service = %config.service_name,
            version = env!("CARGO_PKG_VERSION"),
            "tracing initialized"
        );
    }
    installed
}
