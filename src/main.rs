use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use syllabot_agent::{envelope_for, Orchestrator};
use syllabot_core::config::AppConfig;
use syllabot_core::error::{Result as SyllabotResult, SyllabotError};
use syllabot_core::event::{AgentEvent, EventBus};
use syllabot_core::types::RunEnvelope;
use syllabot_tools::builtin::file_search::format_hits;
use syllabot_tools::{http, CorpusSearch, DocumentExtractor, DocumentLocator, ToolRegistry};

#[derive(Parser)]
#[command(
    name = "syllabot",
    version,
    about = "Locate, read and compare the Czech ISTQB CTFL syllabus"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "syllabot.toml", env = "SYLLABOT_CONFIG")]
    config: PathBuf,

    /// Abort the run after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the result text between separator lines instead of JSON
    #[arg(long)]
    plain: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full retrieve-and-compare workflow (default)
    Compare {
        /// Request text; read from the user input file when omitted
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Find the syllabus PDF link on the source page
    Locate,
    /// Extract the text of a PDF
    Extract {
        /// PDF URL
        url: String,
    },
    /// Query the reference vector store
    Search {
        #[arg(trailing_var_arg = true, required = true)]
        query: Vec<String>,
    },
    /// Show the actor graph
    Graph,
    /// Show current configuration
    Config,
}

fn init_tracing(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("syllabot=info,warn"));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_ref())?;

    let config = AppConfig::load_or_default(&cli.config)?;
    info!(config = %cli.config.display(), "Configuration loaded");

    let envelope = match cli.command.unwrap_or(Commands::Compare { prompt: vec![] }) {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            return Ok(());
        }
        Commands::Graph => {
            let orchestrator = orchestrator_without_check(config)?;
            println!("{}", orchestrator.build_graph()?.describe());
            return Ok(());
        }
        Commands::Compare { prompt } => {
            let input = (!prompt.is_empty()).then(|| prompt.join(" "));
            with_deadline(cli.deadline_secs, compare(config, input)).await
        }
        Commands::Locate => {
            let locate = async {
                let locator = DocumentLocator::new(http::build_client(&config.http)?, &config.source);
                let url = locator.locate().await?;
                Ok::<_, SyllabotError>(serde_json::Value::String(url.to_string()))
            };
            with_deadline(cli.deadline_secs, single(locate)).await
        }
        Commands::Extract { url } => {
            let extract = async {
                let extractor = DocumentExtractor::new(http::build_client(&config.http)?);
                let text = extractor.extract(&url).await?;
                Ok::<_, SyllabotError>(serde_json::Value::String(text))
            };
            with_deadline(cli.deadline_secs, single(extract)).await
        }
        Commands::Search { query } => {
            let search = async {
                let id = config.require_vector_store_id()?;
                let corpus = CorpusSearch::new(
                    http::build_client(&config.http)?,
                    &config.vector_store,
                    id,
                    config.vector_store_api_key(),
                );
                let hits = corpus.search(&query.join(" ")).await?;
                Ok::<_, SyllabotError>(serde_json::Value::String(format_hits(&hits)))
            };
            with_deadline(cli.deadline_secs, single(search)).await
        }
    };

    print_envelope(&envelope, cli.plain)?;
    if !envelope.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Full workflow with live progress on stderr.
async fn compare(config: AppConfig, user_input: Option<String>) -> RunEnvelope {
    let input = user_input.unwrap_or_else(|| syllabot_agent::context::load_user_input(&config.prompts));
    let orchestrator = match Orchestrator::from_config(config) {
        Ok(o) => o,
        Err(e) => {
            error!(error = %e, "Cannot start run");
            return RunEnvelope::from_error(&e);
        }
    };

    let printer = spawn_progress_printer(orchestrator.event_bus());
    let result = orchestrator.run(&input).await;
    // Let the printer catch up with the final event
    if tokio::time::timeout(Duration::from_millis(500), printer).await.is_err() {
        info!("Progress printer did not finish");
    }
    envelope_for(&result)
}

/// Orchestrator for inspection commands; does not require a vector store.
fn orchestrator_without_check(config: AppConfig) -> anyhow::Result<Orchestrator> {
    let http = http::build_client(&config.http)?;
    let tools = ToolRegistry::with_builtins(&config, http);
    let llm = Arc::from(syllabot_llm::create_client(&config.model));
    Ok(Orchestrator::with_parts(
        config,
        llm,
        Arc::new(tools),
        Arc::new(EventBus::default()),
    ))
}

fn spawn_progress_printer(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                AgentEvent::ActorActivated { actor } => eprintln!("\n[{}]", actor),
                AgentEvent::ToolStart { name, .. } => eprintln!("[tool: {}]", name),
                AgentEvent::ToolEnd { name, result, .. } => {
                    let status = if result.is_error { "ERROR" } else { "ok" };
                    eprintln!("[{}: {}] {}", name, status, truncate(&result.content, 200));
                }
                AgentEvent::Handoff { from, to } => eprintln!("[handoff: {} -> {}]", from, to),
                AgentEvent::RunComplete {
                    handoffs,
                    input_tokens,
                    output_tokens,
                    ..
                } => {
                    eprintln!(
                        "\n[done: {} handoffs, {}in/{}out tokens]",
                        handoffs, input_tokens, output_tokens
                    );
                    break;
                }
                AgentEvent::RunError { error, .. } => {
                    eprintln!("\n[error: {}]", error);
                    break;
                }
                AgentEvent::RunStarted { .. } | AgentEvent::TextDelta(_) => {}
            }
        }
    })
}

async fn with_deadline<F>(deadline_secs: Option<u64>, fut: F) -> RunEnvelope
where
    F: std::future::Future<Output = RunEnvelope>,
{
    match deadline_secs {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), fut).await {
            Ok(envelope) => envelope,
            Err(_) => {
                error!(deadline_secs = secs, "Run exceeded deadline");
                RunEnvelope::Error {
                    kind: "timeout".to_string(),
                    reason: format!("run exceeded the {}s deadline", secs),
                }
            }
        },
        None => fut.await,
    }
}

/// Envelope for a single-tool command.
async fn single<F>(fut: F) -> RunEnvelope
where
    F: std::future::Future<Output = SyllabotResult<serde_json::Value>>,
{
    match fut.await {
        Ok(text) => RunEnvelope::success(text),
        Err(e) => {
            error!(error = %e, "Command failed");
            RunEnvelope::from_error(&e)
        }
    }
}

fn print_envelope(envelope: &RunEnvelope, plain: bool) -> anyhow::Result<()> {
    if !plain {
        println!("{}", serde_json::to_string_pretty(envelope)?);
        return Ok(());
    }

    let body = match envelope {
        RunEnvelope::Success {
            text: serde_json::Value::String(s),
        } => s.clone(),
        RunEnvelope::Success { text } => serde_json::to_string_pretty(text)?,
        RunEnvelope::Error { kind, reason } => format!("Error ({}): {}", kind, reason),
    };
    let rule = "-".repeat(30);
    println!("{}\n\n{}\n\n{}", rule, body, rule);
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
