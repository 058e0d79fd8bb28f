//! HTTP agent server
//!
//! Lists the registered agents and runs them, either synchronously (one JSON
//! response once the run ends) or as a Server-Sent Events stream of progress
//! events closed by exactly one `completed` or `failed` event. Dropping a
//! streaming connection cancels its run at the next step boundary.

use crate::agents::{AgentRegistry, AgentRun};
use crate::error::{AgentError, ErrorPayload};
use crate::observability::metrics::metrics;
use crate::pipeline::ProgressEvent;
use crate::protocol::{RunCompleted, RunFailed, RunMode, RunRequest, RunResponse, RunStatus};
use chrono::Utc;
use futures::{stream, Stream};
use serde::Serialize;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::sse::Event;
use warp::{Filter, Rejection, Reply};

/// Largest accepted `POST /runs` body
const MAX_BODY_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorPayload,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    agents: usize,
    uptime_seconds: u64,
    runs_in_flight: u64,
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    ready: bool,
    agents: Vec<String>,
}

#[derive(Debug, Serialize)]
struct LivenessResponse {
    alive: bool,
}

fn error_reply(status: StatusCode, error: &AgentError) -> Response {
    let body = ErrorBody {
        error: error.to_error_payload(),
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn with_registry(
    registry: Arc<AgentRegistry>,
) -> impl Filter<Extract = (Arc<AgentRegistry>,), Error = Infallible> + Clone {
    warp::any().map(move || registry.clone())
}

/// All routes of the agent server
pub fn routes(
    registry: Arc<AgentRegistry>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    // GET /agents
    let list_agents = warp::path!("agents")
        .and(warp::get())
        .and(with_registry(registry.clone()))
        .map(|registry: Arc<AgentRegistry>| warp::reply::json(&registry.manifests()).into_response());

    // GET /agents/{name}
    let get_agent = warp::path!("agents" / String)
        .and(warp::get())
        .and(with_registry(registry.clone()))
        .map(|name: String, registry: Arc<AgentRegistry>| match registry.get(&name) {
            Some(agent) => warp::reply::json(&agent.manifest()).into_response(),
            None => error_reply(StatusCode::NOT_FOUND, &AgentError::unknown_agent(name)),
        });

    // POST /runs
    let create_run = warp::path!("runs")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_registry(registry.clone()))
        .then(handle_run);

    let health = warp::path!("health")
        .and(warp::get())
        .and(with_registry(registry.clone()))
        .map(|registry: Arc<AgentRegistry>| {
            let snapshot = metrics().get_metrics();
            warp::reply::json(&HealthResponse {
                status: "healthy",
                version: env!("CARGO_PKG_VERSION"),
                agents: registry.len(),
                uptime_seconds: snapshot.uptime_seconds,
                runs_in_flight: snapshot.runs.in_flight,
            })
            .into_response()
        });

    let ready = warp::path!("ready")
        .and(warp::get())
        .and(with_registry(registry))
        .map(|registry: Arc<AgentRegistry>| {
            let ready = !registry.is_empty();
            let body = ReadinessResponse {
                ready,
                agents: registry.names().iter().map(|n| n.to_string()).collect(),
            };
            let status = if ready {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            warp::reply::with_status(warp::reply::json(&body), status).into_response()
        });

    let live = warp::path!("live")
        .and(warp::get())
        .map(|| warp::reply::json(&LivenessResponse { alive: true }).into_response());

    let metrics_route = warp::path!("metrics")
        .and(warp::get())
        .map(|| warp::reply::json(&metrics().get_metrics()).into_response());

    // GET / - endpoint index
    let root = warp::path::end().and(warp::get()).map(|| {
        let endpoints: BTreeMap<&str, &str> = BTreeMap::from([
            ("GET /agents", "List registered agents"),
            ("GET /agents/{name}", "Describe one agent"),
            ("POST /runs", "Run an agent (mode: sync or stream)"),
            ("GET /health", "Service health"),
            ("GET /ready", "Readiness probe"),
            ("GET /live", "Liveness probe"),
            ("GET /metrics", "Run and step metrics"),
        ]);
        warp::reply::json(&endpoints).into_response()
    });

    list_agents
        .or(get_agent)
        .unify()
        .or(create_run)
        .unify()
        .or(health)
        .unify()
        .or(ready)
        .unify()
        .or(live)
        .unify()
        .or(metrics_route)
        .unify()
        .or(root)
        .unify()
        .recover(handle_rejection)
        .with(warp::trace::request())
}

async fn handle_run(request: RunRequest, registry: Arc<AgentRegistry>) -> Response {
    let Some(agent) = registry.get(&request.agent_name) else {
        return error_reply(
            StatusCode::NOT_FOUND,
            &AgentError::unknown_agent(request.agent_name),
        );
    };
    if request.input.is_empty() {
        metrics().run_rejected();
        return error_reply(
            StatusCode::BAD_REQUEST,
            &AgentError::invalid_request("input must contain at least one message"),
        );
    }

    let created_at = Utc::now();
    let run = AgentRun::start(agent, &request.input);
    debug!(run_id = %run.run_id, agent = %request.agent_name, mode = ?request.mode, "Run accepted");

    match request.mode {
        RunMode::Sync => {
            let run_id = run.run_id;
            let (events, result) = run.finish().await;
            let (status, output, error) = match result {
                Ok(output) => (RunStatus::Completed, output, None),
                Err(e) => (RunStatus::Failed, Vec::new(), Some(e.to_error_payload())),
            };
            let response = RunResponse {
                run_id,
                agent_name: request.agent_name,
                status,
                output,
                error,
                events,
                created_at,
                finished_at: Utc::now(),
            };
            warp::reply::json(&response).into_response()
        }
        RunMode::Stream => {
            let events = sse_events(run);
            warp::sse::reply(warp::sse::keep_alive().stream(events)).into_response()
        }
    }
}

fn progress_sse(event: &ProgressEvent) -> Result<Event, serde_json::Error> {
    Event::default().event("progress").json_data(event)
}

fn terminal_sse(
    run_id: Uuid,
    result: Result<Vec<crate::protocol::Message>, AgentError>,
) -> Result<Event, serde_json::Error> {
    match result {
        Ok(output) => Event::default()
            .event("completed")
            .json_data(RunCompleted { run_id, output }),
        Err(e) => Event::default().event("failed").json_data(RunFailed {
            run_id,
            error: e.to_error_payload(),
        }),
    }
}

/// Progress events as they arrive, then one terminal event
fn sse_events(run: AgentRun) -> impl Stream<Item = Result<Event, serde_json::Error>> + Send + 'static {
    stream::unfold(Some(run), |state| async move {
        let mut run = state?;
        match run.next_event().await {
            Some(event) => Some((progress_sse(&event), Some(run))),
            None => {
                let run_id = run.run_id;
                let (_, result) = run.finish().await;
                info!(%run_id, ok = result.is_ok(), "Stream finished");
                Some((terminal_sse(run_id, result), None))
            }
        }
    })
}

async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, error) = if rejection.is_not_found() {
        (
            StatusCode::NOT_FOUND,
            AgentError::invalid_request("no such endpoint"),
        )
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            AgentError::invalid_request(format!("malformed run request: {e}")),
        )
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            AgentError::invalid_request(format!("body exceeds {MAX_BODY_BYTES} bytes")),
        )
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            AgentError::invalid_request("method not allowed"),
        )
    } else if rejection.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AgentError::invalid_request("expected an application/json body"),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            AgentError::internal(format!("unhandled rejection: {rejection:?}")),
        )
    };

    Ok(error_reply(status, &error))
}

/// Bind `addr` and serve until `shutdown` resolves
pub async fn serve<F>(
    registry: Arc<AgentRegistry>,
    addr: SocketAddr,
    shutdown: F,
) -> Result<(), warp::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (bound, server) =
        warp::serve(routes(registry)).try_bind_with_graceful_shutdown(addr, shutdown)?;
    info!(address = %bound, "Agent server listening");
    server.await;
    info!("Agent server stopped");
    Ok(())
}
