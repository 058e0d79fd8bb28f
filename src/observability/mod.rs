//! Observability: structured logging and in-process metrics
//!
//! Health and readiness are served by the HTTP server from the metrics
//! snapshot; there is no separate health listener.

pub mod logging;
pub mod metrics;

pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};
pub use metrics::{metrics, MetricsCollector, MetricsSnapshot};

pub use logging::tool_span;
