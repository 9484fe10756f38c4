//! Tirage application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Open the draw-history database
//! 3. Either import a history file, or build the chat pipeline and serve
//!    the axum API

mod cli;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use tirage_api::routes;
use tirage_api::state::AppState;
use tirage_chat::{
    ChatPipeline, GenerativeModel, HttpModel, PipelineDeps, QueryStore, StoreQueries, StoreStats,
    SystemPrompts,
};
use tirage_core::config::TirageConfig;
use tirage_core::types::GameRules;
use tirage_storage::{Database, DrawRepository, ReadOnlyQueries, StatsService};

use cli::{CliArgs, Command};

/// Expand ~ to home directory in a path string.
fn resolve_path(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&path[2..])
    } else {
        PathBuf::from(path)
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

/// System prompts from the configured directory. Missing prompts disable
/// the generative path for that language.
fn load_prompts(dir: &str) -> SystemPrompts {
    if dir.is_empty() {
        tracing::warn!("No system prompt directory configured; replies use the local fallback");
        return SystemPrompts::default();
    }
    let dir = resolve_path(dir);
    match SystemPrompts::load_dir(&dir) {
        Ok(prompts) => prompts,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to load system prompts");
            SystemPrompts::default()
        }
    }
}

fn import(repo: &DrawRepository, rules: &GameRules, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let reader = BufReader::new(File::open(file)?);
    let imported = repo.import(reader, rules)?;
    tracing::info!(file = %file.display(), imported, "Import finished");
    Ok(())
}

async fn serve(
    config: TirageConfig,
    db: Arc<Database>,
    repo: DrawRepository,
    rules: GameRules,
) -> Result<(), Box<dyn std::error::Error>> {
    let stats = StatsService::new(repo, rules);
    let model: Option<Arc<dyn GenerativeModel>> = match HttpModel::from_config(&config.llm) {
        Some(m) => {
            tracing::info!(endpoint = %config.llm.endpoint, model = %config.llm.model, "Generative model configured");
            Some(Arc::new(m))
        }
        None => {
            tracing::warn!("No API key configured; replies use the local fallback");
            None
        }
    };
    let queries: Option<Arc<dyn QueryStore>> = config.sql.enabled.then(|| {
        Arc::new(StoreQueries::new(ReadOnlyQueries::new(Arc::clone(&db)))) as Arc<dyn QueryStore>
    });

    let deps = PipelineDeps {
        stats: Arc::new(StoreStats::new(Arc::new(stats))),
        queries,
        model,
        prompts: load_prompts(&config.chat.system_prompt_dir),
    };
    let pipeline = ChatPipeline::new(&config, deps);
    tracing::info!(
        game = ?config.game.kind,
        default_language = %config.chat.default_language,
        "Chat pipeline ready"
    );

    let state = AppState::new(config.clone(), pipeline);
    routes::start_server(&config, state).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = TirageConfig::load_or_default(&config_file);
    config.apply_env_overrides();
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = &args.log_level {
        config.general.log_level = level.clone();
    }
    config.general.port = args.resolve_port(config.general.port);

    init_tracing(&config.general.log_level);
    tracing::info!("Starting Tirage v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Storage.
    let data_dir = resolve_path(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db_path = data_dir.join("tirage.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    let rules = GameRules::for_kind(config.game.kind);
    let repo = DrawRepository::new(Arc::clone(&db));

    match args.command {
        Some(Command::Import { ref file }) => import(&repo, &rules, file),
        Some(Command::Serve { .. }) | None => serve(config, db, repo, rules).await,
    }
}
