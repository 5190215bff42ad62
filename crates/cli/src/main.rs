mod builtin;
mod config;
mod console;
mod error;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use runtime::{LoopConfig, OllamaBackend, Outcome, Session};
use storage::{Event, EventKind, EventStore, Role};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use console::ConsoleSink;
use error::{Error, Result};

const CONFIG_FILE: &str = "tackle.toml";

#[derive(Parser)]
#[command(name = "tackle")]
#[command(about = "A tool-calling chat agent for local models", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Print the tool documents advertised to the model
    Tools,
    /// List all sessions
    Sessions {
        /// Show only the last N sessions
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show event logs for a session
    Logs {
        /// Session ID (prefix match supported)
        #[arg(short, long)]
        session: String,
        /// Filter by event kind (message, exchange_end, session_start, session_end)
        #[arg(short, long)]
        kind: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?.with_env_overrides();
    init_logging(&config.log_level);
    debug!(path = %cli.config.display(), "configuration loaded");

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat(&config).await,
        Some(Commands::Tools) => cmd_tools(),
        Some(Commands::Sessions { limit }) => cmd_sessions(&config, limit),
        Some(Commands::Logs { session, kind }) => cmd_logs(&config, &session, kind.as_deref()),
    }
}

fn init_logging(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn cmd_chat(config: &Config) -> Result<()> {
    println!("tackle v{}", env!("CARGO_PKG_VERSION"));

    let mut builder =
        OllamaBackend::builder(&config.backend.model).base_url(&config.backend.base_url);
    if let Some(secs) = config.backend.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let backend = builder.build();
    info!(backend = %backend, base_url = %config.backend.base_url, "backend ready");

    let db_path = db_path(config);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let store = EventStore::open(&db_path)?;
    println!("Session stored at: {}", db_path.display());

    let registry = builtin::registry();
    let loop_config = LoopConfig::new(config.agent.max_turns)?;

    let mut session = Session::new(backend, registry)
        .with_config(loop_config)
        .with_sink(ConsoleSink::new(store));
    if let Some(system) = &config.agent.system {
        session = session.with_system(system);
    }

    println!("Session ID: {}", session.id);
    println!("Model: {}", config.backend.model);
    println!(
        "Tools: {}",
        session.registry().names().collect::<Vec<_>>().join(", ")
    );
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        match session.chat(input).await {
            Ok(exchange) => match exchange.outcome {
                Outcome::Final(answer) => println!("\n{answer}\n"),
                Outcome::BoundExceeded => println!(
                    "\n(no answer after {} model turns; the limit is {})\n",
                    exchange.turns,
                    loop_config.max_turns()
                ),
            },
            Err(e) => {
                eprintln!("Error: {e}\n");
            }
        }
    }

    session.end();
    println!("\nSession ended.");
    Ok(())
}

fn cmd_tools() -> Result<()> {
    let documents = builtin::registry().documents();
    println!("{}", serde_json::to_string_pretty(&documents)?);
    Ok(())
}

fn cmd_sessions(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let sessions = store.list_sessions()?;

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<20}  {:<8}  STATUS",
        "SESSION ID", "STARTED", "MSGS"
    );
    println!("{}", "-".repeat(80));

    for summary in sessions.into_iter().take(limit) {
        let started = Local
            .from_utc_datetime(&summary.started_at.naive_utc())
            .format("%Y-%m-%d %H:%M");
        let status = if summary.ended_at.is_some() {
            "ended"
        } else {
            "active"
        };
        println!(
            "{:<36}  {:<20}  {:<8}  {status}",
            summary.id, started, summary.message_count
        );
    }

    Ok(())
}

fn cmd_logs(config: &Config, session_prefix: &str, kind_filter: Option<&str>) -> Result<()> {
    let store = open_store(config)?;

    let sessions = store.list_sessions()?;
    let matching: Vec<_> = sessions
        .iter()
        .filter(|s| s.id.to_string().starts_with(session_prefix))
        .collect();

    let session_id = match matching.as_slice() {
        [] => {
            return Err(Error::SessionNotFound {
                prefix: session_prefix.to_string(),
            });
        }
        [only] => only.id,
        _ => {
            return Err(Error::AmbiguousSession {
                prefix: session_prefix.to_string(),
                matches: matching.iter().map(|s| s.id.to_string()).collect(),
            });
        }
    };

    let events = store.load_events(session_id, kind_filter)?;

    if events.is_empty() {
        println!("No events found for session {session_id}");
        return Ok(());
    }

    println!("Session: {session_id}\n");

    for event in events {
        print_event(&event);
    }

    Ok(())
}

fn print_event(event: &Event) {
    let time = Local
        .from_utc_datetime(&event.timestamp.naive_utc())
        .format("%H:%M:%S");

    match &event.kind {
        EventKind::SessionStart => {
            println!("[{time}] === Session started ===");
        }
        EventKind::SessionEnd => {
            println!("[{time}] === Session ended ===");
        }
        EventKind::ExchangeEnd { outcome, turns } => {
            println!("[{time}] --- exchange {outcome} after {turns} turn(s) ---");
        }
        EventKind::Message {
            role,
            content,
            tool_calls,
        } => {
            let role_str = match role {
                Role::User => "USER",
                Role::Assistant => "ASSISTANT",
                Role::Tool => "TOOL",
            };
            if let Some(content) = content.as_deref().filter(|c| !c.is_empty()) {
                println!("[{time}] {role_str}: {}", truncate(content, 200));
            }
            if let Some(calls) = tool_calls {
                println!("[{time}] {role_str} CALLS: {calls}");
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn db_path(config: &Config) -> PathBuf {
    config.storage.path.clone().unwrap_or_else(|| {
        dirs_data_dir()
            .unwrap_or_else(|| ".tackle".into())
            .join("events.db")
    })
}

fn open_store(config: &Config) -> Result<EventStore> {
    let db_path = db_path(config);

    if !Path::new(&db_path).exists() {
        return Err(Error::DatabaseNotFound { path: db_path });
    }

    Ok(EventStore::open(&db_path)?)
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/tackle"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("tackle"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("tackle"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}
