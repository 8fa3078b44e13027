use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use tasktalk_core::controller::{Collaborators, ConversationController};
use tasktalk_core::db::{Database, SqliteChatRepository, SqliteTaskRepository, TaskRepository};
use tasktalk_core::permission::ConfigPermission;
use tasktalk_core::saved_state::{JsonSavedState, MemorySavedState, SavedState};
use tasktalk_core::speech::{CommandRecognizer, CommandSpeechSink};
use tasktalk_core::{ai, Config, Provider};

mod app;
mod handler;
mod tui;
mod ui;

use app::{App, InputMode, Screen};
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "tasktalk")]
#[command(version, about = "To-do list with a voice-capable English coach")]
struct Cli {
    /// SQLite database file (defaults to the data directory)
    #[arg(long)]
    db: Option<PathBuf>,
    /// Completion provider: gemini or ollama
    #[arg(long)]
    provider: Option<String>,
    /// Model name for the provider
    #[arg(long)]
    model: Option<String>,
    /// Open on the chat screen
    #[arg(long)]
    voice: bool,
    /// Directory for log files
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Logs go to a daily file; the terminal belongs to the UI.
fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::daily(log_dir, "tasktalk.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(name) = &cli.provider {
        let provider = Provider::from_str(name)
            .ok_or_else(|| anyhow!("unknown provider '{name}' (expected gemini or ollama)"))?;
        config.provider = Some(provider.as_str().to_string());
    }
    if let Some(model) = &cli.model {
        config.default_model = Some(model.clone());
    }
    if let Some(db) = &cli.db {
        config.database_path = Some(db.clone());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config; a broken file is reported once logging is up
    let (mut config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::new(), Some(e)),
    };
    apply_overrides(&mut config, &cli)?;

    let data_dir = Config::data_dir()?;
    let log_dir = cli.log_dir.clone().unwrap_or_else(|| data_dir.join("logs"));
    let _log_guard = init_logging(&log_dir)?;
    if let Some(e) = config_error {
        warn!(error = %e, "config.json unreadable; using defaults");
    }

    let db_path = config.database_path()?;
    info!(db = %db_path.display(), provider = %config.provider().as_str(), "starting tasktalk");

    let db = Database::open(&db_path).with_context(|| format!("opening {}", db_path.display()))?;
    let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(db.clone())?);
    let chats = Arc::new(SqliteChatRepository::new(db)?);

    let saved_state: Arc<dyn SavedState> = match JsonSavedState::open(&data_dir.join("state.json")) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            warn!(error = %e, "saved state unreadable; starting fresh");
            Arc::new(MemorySavedState::default())
        }
    };

    let completion: Arc<dyn ai::CompletionSource> = match ai::from_config(&config) {
        Ok(source) => source,
        Err(e) => {
            warn!(error = %e, "completion provider unavailable");
            Arc::new(ai::UnavailableCompletion::new(e.to_string()))
        }
    };
    let (controller, events) = ConversationController::new(Collaborators {
        chats,
        completion,
        recognizer: Arc::new(CommandRecognizer::from_config(&config)),
        speech: Arc::new(CommandSpeechSink::from_config(&config)),
        permission: Arc::new(ConfigPermission::from_config(&config)),
        saved_state: Arc::clone(&saved_state),
    });
    let conversation = controller.spawn(events);

    let mut events = EventHandler::new();
    events.forward_conversation(conversation.subscribe());
    events.forward_tasks(tasks.observe());

    let mut app = App::new(tasks, Arc::clone(&saved_state), conversation, config.provider(), config.model());
    if cli.voice {
        app.screen = Screen::Chat;
        app.input_mode = InputMode::Normal;
        app.toggle_microphone();
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app, &mut events).await;
    tui::restore()?;

    app.conversation.shutdown().await;
    if let Err(e) = saved_state.flush().await {
        warn!(error = %e, "failed to write saved state");
    }
    info!("tasktalk exited");
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event).await?;
    }
    Ok(())
}
