//! Testing utilities and mock implementations
//!
//! Mocks for exercising agents and pipelines without an LLM provider or
//! network access.

pub mod mocks;

pub use mocks::*;
