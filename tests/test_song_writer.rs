//! Song writer agent end to end, with mocked model and fetcher

use songcrew::agents::song_writer::NOT_A_URL_REPLY;
use songcrew::agents::{AgentRun, SongWriterAgent};
use songcrew::error::ErrorCode;
use songcrew::llm::provider::{LlmError, ModelSettings};
use songcrew::pipeline::ProgressEvent;
use songcrew::protocol::Message;
use songcrew::testing::mocks::{MockLlmProvider, MockPageFetcher};
use songcrew::tools::ToolError;
use std::sync::Arc;
use std::time::Duration;

fn agent(provider: Arc<MockLlmProvider>, fetcher: Arc<MockPageFetcher>) -> Arc<SongWriterAgent> {
    Arc::new(SongWriterAgent::new(
        provider,
        fetcher,
        ModelSettings::default(),
        Some(Duration::from_secs(5)),
    ))
}

#[tokio::test]
async fn test_url_produces_song_and_progress_events() {
    let provider = Arc::new(MockLlmProvider::new(vec![
        "Themes: lighthouses, storms, a keeper's diary".to_string(),
        "Verse 1: The keeper lights the lamp tonight".to_string(),
    ]));
    let fetcher = Arc::new(
        MockPageFetcher::default().with_page(
            "https://lighthouse.example/",
            "The old lighthouse has stood since 1850.",
        ),
    );

    let (events, result) = AgentRun::run(
        agent(provider.clone(), fetcher.clone()),
        &[Message::user_text("https://lighthouse.example")],
    )
    .await;

    assert_eq!(
        result.unwrap(),
        vec![Message::user_text("Verse 1: The keeper lights the lamp tonight")]
    );

    let kinds: Vec<_> = events.iter().map(ProgressEvent::kind).collect();
    assert_eq!(
        kinds,
        vec!["tool_call", "thought", "finished", "thought", "finished"]
    );
    assert_eq!(events[0], ProgressEvent::tool_call("fetch_url"));
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::finished(
            "Verse 1: The keeper lights the lamp tonight"
        ))
    );

    let requests = provider.requests().await;
    assert_eq!(requests.len(), 2);
    assert!(requests[0].messages[1]
        .content
        .contains("The old lighthouse has stood since 1850."));
    assert!(requests[1].messages[1]
        .content
        .contains("Themes: lighthouses, storms"));
    assert_eq!(fetcher.fetched_urls().await.len(), 1);
}

#[tokio::test]
async fn test_non_url_gets_fixed_reply_and_no_model_calls() {
    let provider = Arc::new(MockLlmProvider::default());
    let fetcher = Arc::new(MockPageFetcher::default());

    for input in ["write me a song", "", "example.com"] {
        let (events, result) = AgentRun::run(
            agent(provider.clone(), fetcher.clone()),
            &[Message::user_text(input)],
        )
        .await;

        assert!(events.is_empty(), "input {input:?}");
        assert_eq!(result.unwrap(), vec![Message::user_text(NOT_A_URL_REPLY)]);
    }

    assert!(provider.requests().await.is_empty());
    assert!(fetcher.fetched_urls().await.is_empty());
}

#[tokio::test]
async fn test_only_the_last_message_is_considered() {
    let provider = Arc::new(MockLlmProvider::single_response("song"));
    let fetcher = Arc::new(MockPageFetcher::serving("page"));

    let (_, result) = AgentRun::run(
        agent(provider, fetcher),
        &[
            Message::user_text("https://example.com"),
            Message::user_text("actually, never mind"),
        ],
    )
    .await;

    assert_eq!(result.unwrap(), vec![Message::user_text(NOT_A_URL_REPLY)]);
}

#[tokio::test]
async fn test_fetch_failure_fails_the_run_with_upstream_error() {
    let provider = Arc::new(MockLlmProvider::single_response("unused"));
    let fetcher = Arc::new(MockPageFetcher::with_failure(ToolError::ExecutionError(
        "GET https://example.com/ returned 500 Internal Server Error".to_string(),
    )));

    let (events, result) = AgentRun::run(
        agent(provider.clone(), fetcher),
        &[Message::user_text("https://example.com")],
    )
    .await;

    let payload = result.unwrap_err().to_error_payload();
    assert_eq!(payload.code, ErrorCode::UpstreamFailure);
    assert_eq!(payload.step.as_deref(), Some("song_crew"));
    assert_eq!(events, vec![ProgressEvent::tool_call("fetch_url")]);
    assert!(provider.requests().await.is_empty());
}

#[tokio::test]
async fn test_model_timeout_maps_to_timeout_code() {
    let provider = Arc::new(MockLlmProvider::failing_with(LlmError::Timeout(
        "OpenAI request timed out".to_string(),
    )));
    let fetcher = Arc::new(MockPageFetcher::serving("page"));

    let (_, result) = AgentRun::run(
        agent(provider, fetcher),
        &[Message::user_text("https://example.com")],
    )
    .await;

    assert_eq!(result.unwrap_err().to_error_payload().code, ErrorCode::Timeout);
}
