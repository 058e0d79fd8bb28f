//! Mock implementations for testing
//!
//! Provides mock LlmProvider, PageFetcher and AgentStep implementations so
//! pipelines and agents can be exercised without network access.

use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use crate::pipeline::{AgentStep, ContextView, EventSink, ProgressEvent, StepError, StepResult};
use crate::tools::{FetchedPage, PageFetcher, ToolError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// Mock LLM provider for testing
#[derive(Debug, Default)]
pub struct MockLlmProvider {
    pub responses: Vec<String>,
    pub current_response: Arc<Mutex<usize>>,
    pub recorded_requests: Arc<Mutex<Vec<CompletionRequest>>>,
    pub failure: Option<LlmError>,
    pub delay: Option<Duration>,
}

impl MockLlmProvider {
    /// Responses are returned in order, cycling when exhausted
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            ..Default::default()
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    pub fn with_failure() -> Self {
        Self::failing_with(LlmError::RequestFailed("Mock LLM failure".to_string()))
    }

    pub fn failing_with(error: LlmError) -> Self {
        Self {
            failure: Some(error),
            ..Default::default()
        }
    }

    /// Sleep before answering, to exercise timeouts and streaming
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.recorded_requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.recorded_requests.lock().await.push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let mut current = self.current_response.lock().await;
        let response_idx = *current % self.responses.len().max(1);
        *current += 1;

        let content = if self.responses.is_empty() {
            "Mock response".to_string()
        } else {
            self.responses[response_idx].clone()
        };

        Ok(CompletionResponse {
            content: Some(content),
            model: request.model,
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            metadata: request.metadata,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// Mock page fetcher serving canned text
#[derive(Debug, Default)]
pub struct MockPageFetcher {
    pub pages: HashMap<String, String>,
    pub default_text: Option<String>,
    pub failure: Option<ToolError>,
    pub fetched: Arc<Mutex<Vec<Url>>>,
}

impl MockPageFetcher {
    /// Serve `text` for every URL
    pub fn serving(text: impl Into<String>) -> Self {
        Self {
            default_text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_page(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.pages.insert(url.into(), text.into());
        self
    }

    pub fn with_failure(error: ToolError) -> Self {
        Self {
            failure: Some(error),
            ..Default::default()
        }
    }

    pub async fn fetched_urls(&self) -> Vec<Url> {
        self.fetched.lock().await.clone()
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, ToolError> {
        self.fetched.lock().await.push(url.clone());

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let text = self
            .pages
            .get(url.as_str())
            .or(self.default_text.as_ref())
            .cloned()
            .ok_or_else(|| ToolError::ExecutionError(format!("GET {url} returned 404 Not Found")))?;

        Ok(FetchedPage {
            url: url.clone(),
            status: 200,
            text,
        })
    }
}

/// Step that emits a fixed script of events, then succeeds or fails
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    pub name: String,
    pub input_keys: Vec<String>,
    pub output_key: String,
    pub events: Vec<ProgressEvent>,
    pub outcome: Result<Value, StepError>,
    pub delay: Option<Duration>,
    pub invocations: Arc<Mutex<Vec<ContextView>>>,
}

impl ScriptedStep {
    pub fn new(name: impl Into<String>, output_key: impl Into<String>, output: Value) -> Self {
        Self {
            name: name.into(),
            input_keys: Vec::new(),
            output_key: output_key.into(),
            events: Vec::new(),
            outcome: Ok(output),
            delay: None,
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(name: impl Into<String>, error: StepError) -> Self {
        let mut step = Self::new(name, "unused", Value::Null);
        step.outcome = Err(error);
        step
    }

    pub fn reading(mut self, keys: &[&str]) -> Self {
        self.input_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn emitting(mut self, events: Vec<ProgressEvent>) -> Self {
        self.events = events;
        self
    }

    /// Sleep after emitting, before resolving
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn invocation_count(&self) -> usize {
        self.invocations.lock().await.len()
    }

    pub async fn seen_views(&self) -> Vec<ContextView> {
        self.invocations.lock().await.clone()
    }
}

#[async_trait]
impl AgentStep for ScriptedStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_keys(&self) -> Vec<String> {
        self.input_keys.clone()
    }

    fn output_key(&self) -> &str {
        &self.output_key
    }

    async fn run(&self, input: ContextView, emit: &EventSink) -> StepResult {
        self.invocations.lock().await.push(input);
        for event in &self.events {
            emit.emit(event.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}
