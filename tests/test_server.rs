//! HTTP surface: agent listing, sync and streaming runs, error statuses


use serde_json::{json, Value};
use songcrew::server::routes;
use songcrew::testing::mocks::{MockLlmProvider, MockPageFetcher};
use test_helpers::{registry_with, sample_evaluation};

fn song_registry() -> std::sync::Arc<songcrew::AgentRegistry> {
    registry_with(
        MockLlmProvider::new(vec!["notes".to_string(), "Verse 1: la la".to_string()]),
        MockPageFetcher::serving("A page about the sea"),
    )
}

fn body_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_lists_all_three_agents() {
    let routes = routes(song_registry());

    let response = warp::test::request().path("/agents").reply(&routes).await;

    assert_eq!(response.status(), 200);
    let names: Vec<String> = body_json(response.body())
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "artist_repertoire_agent",
            "markdown_report_agent",
            "song_writer_agent"
        ]
    );
}

#[tokio::test]
async fn test_describes_one_agent_or_404s() {
    let routes = routes(song_registry());

    let found = warp::test::request()
        .path("/agents/song_writer_agent")
        .reply(&routes)
        .await;
    assert_eq!(found.status(), 200);
    assert_eq!(body_json(found.body())["steps"], json!(["song_crew"]));

    let missing = warp::test::request()
        .path("/agents/lyricist")
        .reply(&routes)
        .await;
    assert_eq!(missing.status(), 404);
    assert_eq!(body_json(missing.body())["error"]["code"], "unknown_agent");
}

#[tokio::test]
async fn test_sync_run_returns_output_and_events() {
    let routes = routes(song_registry());

    let response = warp::test::request()
        .method("POST")
        .path("/runs")
        .json(&json!({
            "agent_name": "song_writer_agent",
            "input": [{"parts": [{"content": "https://example.com"}]}]
        }))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 200);
    let body = body_json(response.body());
    assert_eq!(body["status"], "completed");
    assert_eq!(body["output"][0]["parts"][0]["content"], "Verse 1: la la");
    assert_eq!(body["events"][0], json!({"type": "tool_call", "tool_name": "fetch_url"}));
    assert_eq!(body["events"].as_array().unwrap().len(), 5);
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_sync_run_reports_step_failure() {
    let registry = registry_with(
        MockLlmProvider::single_response(r#"{"not": "an evaluation"}"#),
        MockPageFetcher::default(),
    );
    let routes = routes(registry);

    let response = warp::test::request()
        .method("POST")
        .path("/runs")
        .json(&json!({
            "agent_name": "artist_repertoire_agent",
            "input": [{"parts": [{"content": "la la la"}]}],
            "mode": "sync"
        }))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 200);
    let body = body_json(response.body());
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error"]["code"], "upstream_failure");
    assert_eq!(body["error"]["step"], "evaluate");
    assert_eq!(body["output"], json!([]));
}

#[tokio::test]
async fn test_stream_run_emits_progress_then_one_terminal_event() {
    let registry = registry_with(
        MockLlmProvider::single_response(sample_evaluation().to_string()),
        MockPageFetcher::default(),
    );
    let routes = routes(registry);

    let response = warp::test::request()
        .method("POST")
        .path("/runs")
        .json(&json!({
            "agent_name": "artist_repertoire_agent",
            "input": [{"parts": [{"content": "la la la"}]}],
            "mode": "stream"
        }))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
    let body = String::from_utf8(response.body().to_vec()).unwrap();
    assert_eq!(body.matches("event:progress").count(), 2);
    assert_eq!(body.matches("event:completed").count(), 1);
    assert!(!body.contains("event:failed"));

    let progress_at = body.rfind("event:progress").unwrap();
    let completed_at = body.find("event:completed").unwrap();
    assert!(progress_at < completed_at);
    assert!(body.contains("\"hit_potential_score\":7"));
}

#[tokio::test]
async fn test_stream_run_failure_ends_with_failed_event() {
    let registry = registry_with(
        MockLlmProvider::with_failure(),
        MockPageFetcher::serving("page"),
    );
    let routes = routes(registry);

    let response = warp::test::request()
        .method("POST")
        .path("/runs")
        .json(&json!({
            "agent_name": "song_writer_agent",
            "input": [{"parts": [{"content": "https://example.com"}]}],
            "mode": "stream"
        }))
        .reply(&routes)
        .await;

    let body = String::from_utf8(response.body().to_vec()).unwrap();
    assert_eq!(body.matches("event:failed").count(), 1);
    assert!(!body.contains("event:completed"));
    assert!(body.contains("\"code\":\"upstream_failure\""));
}

#[tokio::test]
async fn test_rejected_input_completes_with_reply() {
    let routes = routes(song_registry());

    let response = warp::test::request()
        .method("POST")
        .path("/runs")
        .json(&json!({
            "agent_name": "song_writer_agent",
            "input": [{"parts": [{"content": "hello"}]}]
        }))
        .reply(&routes)
        .await;

    let body = body_json(response.body());
    assert_eq!(body["status"], "completed");
    assert_eq!(
        body["output"][0]["parts"][0]["content"],
        "This is not a URL, please provide valid website."
    );
    assert_eq!(body["events"], json!([]));
}

#[tokio::test]
async fn test_run_request_errors() {
    let routes = routes(song_registry());

    let unknown = warp::test::request()
        .method("POST")
        .path("/runs")
        .json(&json!({"agent_name": "nobody", "input": [{"parts": [{"content": "x"}]}]}))
        .reply(&routes)
        .await;
    assert_eq!(unknown.status(), 404);
    assert_eq!(body_json(unknown.body())["error"]["code"], "unknown_agent");

    let empty = warp::test::request()
        .method("POST")
        .path("/runs")
        .json(&json!({"agent_name": "song_writer_agent", "input": []}))
        .reply(&routes)
        .await;
    assert_eq!(empty.status(), 400);
    assert_eq!(body_json(empty.body())["error"]["code"], "invalid_request");

    let bad_mode = warp::test::request()
        .method("POST")
        .path("/runs")
        .json(&json!({"agent_name": "song_writer_agent", "input": [], "mode": "batch"}))
        .reply(&routes)
        .await;
    assert_eq!(bad_mode.status(), 400);
}

#[tokio::test]
async fn test_health_and_metrics_endpoints() {
    let routes = routes(song_registry());

    let health = warp::test::request().path("/health").reply(&routes).await;
    assert_eq!(health.status(), 200);
    let body = body_json(health.body());
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["agents"], 3);

    let metrics = warp::test::request().path("/metrics").reply(&routes).await;
    assert_eq!(metrics.status(), 200);
    assert!(body_json(metrics.body())["runs"]["started"].is_u64());
}
