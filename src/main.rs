//! songcrew - agent server entry point

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use songcrew::agents::{AgentRegistry, AgentRun};
use songcrew::config::ServiceConfig;
use songcrew::llm::provider::{CompletionRequest, CompletionResponse, LlmError, LlmProvider};
use songcrew::llm::providers::OpenAiProvider;
use songcrew::observability::init_default_logging;
use songcrew::protocol::Message;
use songcrew::server;
use songcrew::tools::{HttpPageFetcher, PageFetcher};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::signal;
use tracing::{error, info};

/// Song-writing, A&R evaluation and report agents over HTTP
#[derive(Parser)]
#[command(name = "songcrew")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the agents over HTTP until SIGINT/SIGTERM
    Serve {
        /// Override [server] port
        #[arg(long, env = "SONGCREW_PORT")]
        port: Option<u16>,
    },
    /// Run one agent locally; progress goes to stderr, output to stdout
    Run {
        /// Agent name, e.g. song_writer_agent
        agent: String,
        /// Input text, or "-" to read stdin
        input: String,
    },
    /// List registered agents
    Agents,
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose > 0);

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Run { agent, input } => run_once(config, &agent, &input).await,
        Commands::Agents => list_agents(&config),
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(
    explicit: Option<&std::path::Path>,
) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    let (config, source) = ServiceConfig::load_or_default(explicit)?;
    match source {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }
    Ok(config)
}

/// Stand-in provider for commands that never call the model
struct UnconfiguredProvider;

#[async_trait]
impl LlmProvider for UnconfiguredProvider {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Err(LlmError::NotConfigured(
            "No LLM provider configured".to_string(),
        ))
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        Err(LlmError::NotConfigured(
            "No LLM provider configured".to_string(),
        ))
    }
}

/// Wire the agents to the real provider and fetcher
fn build_registry(config: &ServiceConfig) -> Result<AgentRegistry, Box<dyn std::error::Error>> {
    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(config.openai_config()?)?);
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::new(config.fetcher_config())?);
    Ok(AgentRegistry::standard(config, provider, fetcher))
}

async fn serve(mut config: ServiceConfig, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port {
        config.server.port = port;
    }
    let addr: SocketAddr = config.bind_address().parse()?;
    let registry = Arc::new(build_registry(&config)?);

    info!(
        agents = ?registry.names(),
        model = %config.llm.model,
        "Starting songcrew v{}",
        env!("CARGO_PKG_VERSION")
    );

    server::serve(registry, addr, shutdown_signal()).await?;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let (mut sigint, mut sigterm) = match (
            signal::unix::signal(signal::unix::SignalKind::interrupt()),
            signal::unix::signal(signal::unix::SignalKind::terminate()),
        ) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            _ => {
                error!("Failed to install signal handlers, falling back to Ctrl-C");
                let _ = signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl-C, shutting down gracefully...");
    }
}

async fn run_once(
    config: ServiceConfig,
    agent_name: &str,
    input: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = build_registry(&config)?;
    let agent = registry
        .get(agent_name)
        .ok_or_else(|| format!("Unknown agent '{agent_name}' (known: {:?})", registry.names()))?;

    let input = read_run_input(input, tokio::io::stdin()).await?;

    let mut run = AgentRun::start(agent, &[Message::user_text(input)]);
    while let Some(event) = run.next_event().await {
        eprintln!("{}", serde_json::to_string(&event)?);
    }

    let (_, result) = run.finish().await;
    match result {
        Ok(output) => {
            for message in output {
                for part in message.parts {
                    match part.content {
                        serde_json::Value::String(text) => println!("{text}"),
                        other => println!("{}", serde_json::to_string_pretty(&other)?),
                    }
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&e.to_error_payload())?);
            Err(e.into())
        }
    }
}

/// The literal argument, or all of `stdin` when the argument is "-"
async fn read_run_input<R>(arg: &str, mut stdin: R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut buffer = String::new();
    stdin.read_to_string(&mut buffer).await?;
    Ok(buffer)
}

fn list_agents(config: &ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::new(config.fetcher_config())?);
    let registry = AgentRegistry::standard(config, Arc::new(UnconfiguredProvider), fetcher);

    for manifest in registry.manifests() {
        println!("{:<26} {}", manifest.name, manifest.description);
    }
    Ok(())
}

fn handle_config_command(
    config: &ServiceConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }
    if let Err(e) = config.get_llm_api_key() {
        eprintln!("warning: {e}; runs will fail until it is set");
    }

    info!("Configuration validation complete");
    Ok(())
}
