//! LLM capability used by agent steps
//!
//! Provider-agnostic completion interface, the OpenAI implementation and the
//! structured-output helpers built on top of it.

pub mod provider;
pub mod providers;
pub mod structured;

pub use provider::*;
pub use providers::*;
pub use structured::{complete_structured, complete_text};
