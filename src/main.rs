use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{Parser, Subcommand};
use postharvest::api::{self, ApiState};
use postharvest::app::{context::AppContext, orchestrator::Orchestrator};
use postharvest::domain::model::{AppConfig, AppMode, SqlDialect};
use postharvest::infra::{
    config::{pick_config_path, ConfigLoader},
    database::create_store,
    logging::{init_logging, BootError},
    random::MutexRng,
    system_clock::SystemClock,
    webdriver::WebDriverBrowser,
};
use postharvest::ports::store::PostStore;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "postharvest", version, about = "Harvests, scores and stores social posts")]
struct Cli {
    /// Path to config.toml; roster.toml is read from the same directory.
    #[arg(long, short, global = true, env = "POSTHARVEST_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest once, or repeatedly with --interval-secs.
    Run {
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Serve the read-only HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
    /// Write the most recent posts as a JSON array.
    Export {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
    /// Load and check the configuration, then exit.
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), BootError> {
    let cli = Cli::parse();
    let cfg_path = pick_config_path(cli.config);
    let cfg = ConfigLoader::load(&cfg_path)
        .await
        .map_err(|e| BootError::Fatal(format!("{}: {e}", cfg_path.display())))?;
    let _log_guard = init_logging(&cfg.logging)?;

    info!(timezone = %cfg.timezone, "Using timezone");
    info!(
        accounts = cfg.roster.len(),
        categories = cfg.roster.groups().len(),
        dialect = ?cfg.db_dialect,
        profile = ?cfg.profile,
        mode = ?cfg.mode,
        "Loaded config"
    );

    let res = match cli.command {
        Command::Validate => {
            info!(config = %cfg_path.display(), "Config is valid");
            Ok(())
        }
        Command::Run { interval_secs } => run(cfg, interval_secs).await,
        Command::Serve { bind } => serve(cfg, &bind).await,
        Command::Export { out, limit } => export(cfg, &out, limit).await,
    };
    if let Err(e) = &res {
        error!(error = %e, "Fatal error");
    }
    res
}

async fn open_store(cfg: &AppConfig) -> Result<Arc<dyn PostStore>, BootError> {
    let store = create_store(cfg)
        .await
        .map_err(|e| BootError::Fatal(e.to_string()))?;
    store
        .migrate()
        .await
        .map_err(|e| BootError::Fatal(e.to_string()))?;
    Ok(store)
}

async fn run(cfg: AppConfig, interval_secs: Option<u64>) -> Result<(), BootError> {
    if matches!(cfg.mode, AppMode::Dev) && cfg.db_dialect == SqlDialect::Sqlite {
        warn!(db_path = %cfg.sqlite_path.display(), "Dev mode enabled, deleting database");
        let _ = tokio::fs::remove_file(&cfg.sqlite_path).await;
    }

    let store = open_store(&cfg).await?;
    let browser = WebDriverBrowser::new(&cfg.browser).map_err(|e| BootError::Fatal(e.to_string()))?;
    let ctx = AppContext::new(cfg, store, browser, SystemClock, MutexRng::new());
    let mut orchestrator = Orchestrator::new(ctx);

    match interval_secs {
        Some(secs) => orchestrator
            .run_forever(Duration::from_secs(secs.max(1)))
            .await
            .map_err(|e| BootError::Fatal(e.to_string())),
        None => {
            let report = orchestrator
                .run_once()
                .await
                .map_err(|e| BootError::Fatal(e.to_string()))?;
            info!(
                accepted = report.accepted,
                stored = report.stored,
                failed_accounts = ?report.failed_accounts,
                "Run finished"
            );
            Ok(())
        }
    }
}

async fn serve(cfg: AppConfig, bind: &str) -> Result<(), BootError> {
    let store = open_store(&cfg).await?;
    let app = api::router(ApiState {
        store,
        clock: Arc::new(SystemClock),
    });
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| BootError::Fatal(format!("bind {bind}: {e}")))?;
    info!(bind, "HTTP API listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| BootError::Fatal(format!("http server error: {e}")))
}

async fn export(cfg: AppConfig, out: &Path, limit: i64) -> Result<(), BootError> {
    let store = open_store(&cfg).await?;
    let posts = store
        .recent(limit.max(1))
        .await
        .map_err(|e| BootError::Fatal(e.to_string()))?;
    let json = serde_json::to_string_pretty(&posts)
        .map_err(|e| BootError::Fatal(format!("serialize export: {e}")))?;
    tokio::fs::write(out, json)
        .await
        .map_err(|e| BootError::Fatal(format!("write {}: {e}", out.display())))?;
    info!(posts = posts.len(), out = %out.display(), "Exported posts");
    Ok(())
}
