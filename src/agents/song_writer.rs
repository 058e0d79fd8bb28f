//! Song-writing agent
//!
//! A two-member crew: a researcher that reads the page behind a URL and
//! collects themes, stories and facts, then a songwriter that turns the
//! research into a complete song.

use super::{text_output, Agent, Prepared};
use crate::llm::provider::{LlmProvider, ModelSettings};
use crate::llm::structured::complete_text;
use crate::pipeline::{
    AgentStep, ContextView, CrewStep, EventSink, Pipeline, PipelineContext, ProgressEvent,
    StepError, StepResult,
};
use crate::protocol::{AgentManifest, Capability, Message};
use crate::tools::{PageFetcher, FETCH_TOOL_NAME};
use crate::tool_span;
use crate::validation::validate_url;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, Instrument};
use url::Url;

pub const AGENT_NAME: &str = "song_writer_agent";

/// Reply sent instead of running the crew when the input is not a URL
pub const NOT_A_URL_REPLY: &str = "This is not a URL, please provide valid website.";

/// Page text beyond this many characters is not sent to the model
const MAX_PAGE_CHARS: usize = 12_000;

const RESEARCHER_PROMPT: &str = "You are a website researcher, an expert at finding \
inspiring stories and themes online. Your goal is to find useful content for songwriting \
in the material you are given.";

const SONGWRITER_PROMPT: &str = "You are a talented songwriter who transforms information \
into emotional, memorable songs. Your goal is to create songs from research material.";

/// Fetches the page behind `url` and distils songwriting material from it
pub struct ResearchStep {
    provider: Arc<dyn LlmProvider>,
    fetcher: Arc<dyn PageFetcher>,
    settings: ModelSettings,
}

impl ResearchStep {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        fetcher: Arc<dyn PageFetcher>,
        settings: ModelSettings,
    ) -> Self {
        Self {
            provider,
            fetcher,
            settings,
        }
    }
}

/// Build the researcher's task prompt (pure function)
pub fn research_prompt(url: &Url, page_text: &str) -> String {
    let excerpt: String = page_text.chars().take(MAX_PAGE_CHARS).collect();
    format!(
        "Research this URL for songwriting material: {url}\n\n\
         Page content:\n{excerpt}\n\n\
         Return a collection of themes, stories, and facts for songwriting inspiration."
    )
}

/// Build the songwriter's task prompt (pure function)
pub fn song_prompt(research: &str) -> String {
    format!(
        "Write a song based on this research.\n\n{research}\n\n\
         Return the complete song with lyrics and a short note on its style."
    )
}

#[async_trait]
impl AgentStep for ResearchStep {
    fn name(&self) -> &str {
        "research"
    }

    fn input_keys(&self) -> Vec<String> {
        vec!["url".to_string()]
    }

    fn output_key(&self) -> &str {
        "research"
    }

    async fn run(&self, input: ContextView, emit: &EventSink) -> StepResult {
        let raw = input
            .get_str("url")
            .ok_or_else(|| StepError::invalid_input("'url' must be a string"))?;
        let url = validate_url(raw).map_err(|e| StepError::invalid_input(e.to_string()))?;

        emit.emit(ProgressEvent::tool_call(FETCH_TOOL_NAME));
        let page = self
            .fetcher
            .fetch(&url)
            .instrument(tool_span!(tool = FETCH_TOOL_NAME, url = %url))
            .await?;
        debug!(url = %url, chars = page.text.len(), "Page fetched for research");

        emit.emit(ProgressEvent::thought(format!(
            "Collecting themes, stories and facts from {url}"
        )));
        let notes = complete_text(
            self.provider.as_ref(),
            &self.settings,
            RESEARCHER_PROMPT,
            &research_prompt(&url, &page.text),
        )
        .await?;

        emit.emit(ProgressEvent::finished(notes.clone()));
        Ok(Value::String(notes))
    }
}

/// Writes a song from the research notes
pub struct WriteSongStep {
    provider: Arc<dyn LlmProvider>,
    settings: ModelSettings,
}

impl WriteSongStep {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: ModelSettings) -> Self {
        Self { provider, settings }
    }
}

#[async_trait]
impl AgentStep for WriteSongStep {
    fn name(&self) -> &str {
        "write_song"
    }

    fn input_keys(&self) -> Vec<String> {
        vec!["research".to_string()]
    }

    fn output_key(&self) -> &str {
        "song"
    }

    async fn run(&self, input: ContextView, emit: &EventSink) -> StepResult {
        let research = match input.get("research") {
            Some(Value::String(notes)) => notes.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };

        emit.emit(ProgressEvent::thought("Writing a song from the research notes"));
        let song = complete_text(
            self.provider.as_ref(),
            &self.settings,
            SONGWRITER_PROMPT,
            &song_prompt(&research),
        )
        .await?;

        emit.emit(ProgressEvent::finished(song.clone()));
        Ok(Value::String(song))
    }
}

/// Writes a song about the website behind a URL
pub struct SongWriterAgent {
    pipeline: Arc<Pipeline>,
}

impl SongWriterAgent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        fetcher: Arc<dyn PageFetcher>,
        settings: ModelSettings,
        step_timeout: Option<Duration>,
    ) -> Self {
        let crew = CrewStep::new("song_crew", &["url"], "song")
            .with_step(Arc::new(ResearchStep::new(
                provider.clone(),
                fetcher,
                settings.clone(),
            )))
            .with_step(Arc::new(WriteSongStep::new(provider, settings)));

        let mut pipeline = Pipeline::new(AGENT_NAME).with_step(Arc::new(crew));
        if let Some(timeout) = step_timeout {
            pipeline = pipeline.with_step_timeout(timeout);
        }

        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

impl Agent for SongWriterAgent {
    fn name(&self) -> &str {
        AGENT_NAME
    }

    fn manifest(&self) -> AgentManifest {
        AgentManifest {
            name: AGENT_NAME.to_string(),
            description: "Agent that writes a song about a website. Accepts a message with URL"
                .to_string(),
            capabilities: vec![
                Capability::new("Website Research", "Collect songwriting material from a web page"),
                Capability::new("Songwriting", "Write a complete song from research notes"),
            ],
            tags: vec!["music".to_string(), "songwriting".to_string()],
            steps: self.pipeline.step_names().iter().map(|s| s.to_string()).collect(),
        }
    }

    fn prepare(&self, input: &[Message]) -> Prepared {
        let raw = input.last().map(Message::text).unwrap_or_default();
        match validate_url(&raw) {
            Ok(url) => Prepared::Run(PipelineContext::new().with("url", url.as_str())),
            Err(_) => Prepared::Reply(vec![Message::user_text(NOT_A_URL_REPLY)]),
        }
    }

    fn pipeline(&self) -> Arc<Pipeline> {
        self.pipeline.clone()
    }

    fn render_output(&self, output: &Value) -> Vec<Message> {
        text_output(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{event_channel, StepErrorKind};
    use crate::testing::mocks::{MockLlmProvider, MockPageFetcher};
    use crate::tools::ToolError;

    fn view_with_url(url: &str) -> ContextView {
        PipelineContext::new()
            .with("url", url)
            .view(&["url"])
            .unwrap()
    }

    #[test]
    fn test_research_prompt_truncates_long_pages() {
        let url = Url::parse("https://example.com").unwrap();
        let prompt = research_prompt(&url, &"a".repeat(MAX_PAGE_CHARS + 500));

        assert!(prompt.contains("https://example.com/"));
        assert!(prompt.matches('a').count() < MAX_PAGE_CHARS + 100);
    }

    #[tokio::test]
    async fn test_research_emits_tool_call_then_thought_then_finished() {
        let provider = Arc::new(MockLlmProvider::single_response("themes: the sea"));
        let fetcher = Arc::new(MockPageFetcher::serving("A page about the sea"));
        let step = ResearchStep::new(provider.clone(), fetcher.clone(), ModelSettings::default());
        let (sink, events) = event_channel();

        let output = step.run(view_with_url("https://example.com"), &sink).await.unwrap();
        drop(sink);

        assert_eq!(output, Value::String("themes: the sea".to_string()));
        let events = events.collect_remaining().await;
        let kinds: Vec<_> = events.iter().map(ProgressEvent::kind).collect();
        assert_eq!(kinds, vec!["tool_call", "thought", "finished"]);
        assert_eq!(events[0], ProgressEvent::tool_call("fetch_url"));

        let fetched = fetcher.fetched_urls().await;
        assert_eq!(fetched[0].as_str(), "https://example.com/");
        let requests = provider.requests().await;
        assert!(requests[0].messages[1].content.contains("A page about the sea"));
    }

    #[tokio::test]
    async fn test_research_fetch_failure_is_upstream_failure() {
        let provider = Arc::new(MockLlmProvider::single_response("unused"));
        let fetcher = Arc::new(MockPageFetcher::with_failure(ToolError::ExecutionError(
            "GET https://example.com/ returned 503".to_string(),
        )));
        let step = ResearchStep::new(provider.clone(), fetcher, ModelSettings::default());
        let (sink, _events) = event_channel();

        let error = step
            .run(view_with_url("https://example.com"), &sink)
            .await
            .unwrap_err();

        assert_eq!(error.kind, StepErrorKind::UpstreamFailure);
        assert!(provider.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_write_song_uses_research_notes() {
        let provider = Arc::new(MockLlmProvider::single_response("Verse 1: waves"));
        let step = WriteSongStep::new(provider.clone(), ModelSettings::default());
        let view = PipelineContext::new()
            .with("research", "the sea is vast")
            .view(&["research"])
            .unwrap();
        let (sink, events) = event_channel();

        let song = step.run(view, &sink).await.unwrap();
        drop(sink);

        assert_eq!(song, Value::String("Verse 1: waves".to_string()));
        let events = events.collect_remaining().await;
        assert_eq!(events.last(), Some(&ProgressEvent::finished("Verse 1: waves")));
        assert!(provider.requests().await[0].messages[1]
            .content
            .contains("the sea is vast"));
    }

    #[test]
    fn test_prepare_rejects_non_urls() {
        let agent = SongWriterAgent::new(
            Arc::new(MockLlmProvider::default()),
            Arc::new(MockPageFetcher::default()),
            ModelSettings::default(),
            None,
        );

        assert_eq!(
            agent.prepare(&[Message::user_text("write me a song")]),
            Prepared::Reply(vec![Message::user_text(NOT_A_URL_REPLY)])
        );
        assert_eq!(
            agent.prepare(&[]),
            Prepared::Reply(vec![Message::user_text(NOT_A_URL_REPLY)])
        );
        assert!(matches!(
            agent.prepare(&[Message::user_text(" https://example.com ")]),
            Prepared::Run(_)
        ));
        assert_eq!(agent.manifest().steps, vec!["song_crew"]);
    }
}
