//! Tools available to agent steps
//!
//! The research step has exactly one tool: fetching a web page and reducing
//! it to readable text. It sits behind [`PageFetcher`] so tests and offline
//! runs can substitute canned pages.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub mod fetch;

pub use fetch::{HttpPageFetcher, HttpPageFetcherConfig};

/// Tool name reported in `ToolCall` progress events when a page is fetched
pub const FETCH_TOOL_NAME: &str = "fetch_url";

/// Readable content of a fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub url: Url,
    pub status: u16,
    pub text: String,
}

/// Fetches a URL and extracts its readable text
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, ToolError>;
}

/// Tool execution errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Tool initialization failed: {0}")]
    InitializationError(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Tool execution failed: {0}")]
    ExecutionError(String),
    #[error("Response too large: {size} bytes (max: {max})")]
    ResponseTooLarge { size: usize, max: usize },
}
