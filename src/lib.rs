//! songcrew
//!
//! Three agents behind one HTTP agent server:
//! - `song_writer_agent` researches the website behind a URL and writes a song about it
//! - `artist_repertoire_agent` evaluates a song's commercial potential as structured JSON
//! - `markdown_report_agent` formats a song and its evaluation as markdown
//!
//! Every agent is a [`pipeline::Pipeline`] of named steps. The runner threads a
//! context through the steps and relays their progress events to the caller
//! while the run is in flight.
//!
//! # Quick Start
//!
//! ```rust
//! use songcrew::agents::{render_report};
//! use songcrew::validation::parse_report_input;
//! use serde_json::json;
//!
//! let input = parse_report_input(&json!({
//!     "song": "La la la",
//!     "feedback": {"hit_potential_score": 7, "recommendation": "Sign"}
//! })).unwrap();
//!
//! let report = render_report(&input);
//! assert!(report.contains("- **Hit Potential Score:** 7"));
//! ```

pub mod agents;
pub mod config;
pub mod error;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod protocol;
pub mod server;
pub mod testing;
pub mod tools;
pub mod validation;

pub use agents::{Agent, AgentRegistry, AgentRun};
pub use config::{ConfigError, ServiceConfig};
pub use error::{AgentError, AgentResult, ErrorPayload};
pub use pipeline::{Pipeline, PipelineError, ProgressEvent};
pub use protocol::{Message, MessagePart, RunMode, RunRequest, RunResponse};
