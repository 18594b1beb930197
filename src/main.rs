//! Keyquiz - keyword-triggered learning quizzes
//!
//! Entry point for the keyquiz server and its topic management commands.

use clap::{Parser, Subcommand};
use keyquiz_core::{
    api::{ApiServer, ApiState},
    error::{KeyquizError, Result},
    HttpQuizBackend, KeyquizConfig, QuizBackend, QuizCoordinator, QuizHistory, SessionRegistry,
    SqliteStateStore, StateStore, TopicRegistration, TrackerHandle, TrackingEngine, WebDisplay,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(name = "keyquiz")]
#[command(about = "Keyword-triggered learning quizzes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the user data directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Database path (overrides KEYQUIZ_DB_PATH and the config file)
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the tracker and the HTTP API
    Serve {
        /// Listen address (overrides server.addr)
        #[arg(long)]
        addr: Option<String>,
    },

    /// Show tracked topics and their keyword counts
    Status,

    /// Manage tracked topics
    Topic {
        #[command(subcommand)]
        action: TopicCommands,
    },

    /// Show completed quizzes, most recent last
    History {
        /// Only show the last N entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum TopicCommands {
    /// Track a topic (replaces an existing topic of the same name)
    Add {
        name: String,

        /// Comma-separated keywords
        #[arg(short, long, value_delimiter = ',')]
        keywords: Vec<String>,

        /// Occurrences per quiz
        #[arg(short, long)]
        threshold: Option<u32>,

        /// Ask the quiz backend to suggest keywords as well
        #[arg(long)]
        generate: bool,
    },

    /// Stop tracking a topic
    Remove { name: String },

    /// Change how many occurrences trigger a quiz
    Threshold { name: String, threshold: u32 },
}

/// Everything the commands share
struct Runtime {
    config: KeyquizConfig,
    store: Arc<dyn StateStore>,
    sessions: Arc<SessionRegistry>,
    engine: Arc<TrackingEngine>,
    history: Arc<QuizHistory>,
}

impl Runtime {
    async fn open(config: KeyquizConfig) -> Result<Self> {
        let store: Arc<dyn StateStore> =
            Arc::new(SqliteStateStore::open(&config.storage.db_path).await?);
        let sessions = Arc::new(SessionRegistry::new());
        let engine = Arc::new(
            TrackingEngine::new(store.clone(), sessions.clone())
                .with_default_threshold(config.tracking.default_threshold),
        );
        let history = Arc::new(QuizHistory::with_limit(
            store.clone(),
            config.tracking.history_limit,
        ));

        Ok(Self {
            config,
            store,
            sessions,
            engine,
            history,
        })
    }
}

fn load_config(cli: &Cli) -> Result<(PathBuf, KeyquizConfig)> {
    let path = cli.config.clone().unwrap_or_else(KeyquizConfig::default_path);
    let mut config = KeyquizConfig::load(&path)?.with_env_overrides();
    if let Some(db_path) = &cli.db_path {
        config.storage.db_path = db_path.clone();
    }
    config.validate()?;
    Ok((path, config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG wins over --log-level when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.as_str().to_lowercase();
        EnvFilter::new(format!(
            "keyquiz={level},keyquiz_core={level},tower_http={level},hyper=warn,reqwest=warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // Write logs to stderr, not stdout
        .init();

    debug!("Keyquiz v{} starting...", env!("CARGO_PKG_VERSION"));

    let (config_path, config) = load_config(&cli)?;

    match cli.command {
        Commands::Init { force } => init(&config_path, &config, force),
        Commands::Serve { addr } => {
            let runtime = Runtime::open(config).await?;
            serve(runtime, addr).await
        }
        Commands::Status => {
            let runtime = Runtime::open(config).await?;
            status(&runtime).await
        }
        Commands::Topic { action } => {
            let runtime = Runtime::open(config).await?;
            topic(&runtime, action).await
        }
        Commands::History { limit } => {
            let runtime = Runtime::open(config).await?;
            history(&runtime, limit).await
        }
    }
}

fn init(path: &Path, config: &KeyquizConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(KeyquizError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    config.save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn serve(runtime: Runtime, addr: Option<String>) -> Result<()> {
    let Runtime {
        config,
        store,
        sessions,
        engine,
        history,
    } = runtime;

    let addr_str = addr.unwrap_or_else(|| config.server.addr.clone());
    let addr: SocketAddr = addr_str
        .parse()
        .map_err(|e| KeyquizError::Config(format!("Invalid listen address {:?}: {}", addr_str, e)))?;

    let backend: Arc<dyn QuizBackend> = Arc::new(HttpQuizBackend::new(&config.backend)?);
    let display = Arc::new(WebDisplay::new(history.clone()).with_store(store.clone()));
    if let Some(view_id) = display.restore().await? {
        info!("Reopened unfinished quiz as view {}", view_id);
    }
    let coordinator = Arc::new(
        QuizCoordinator::new(engine.clone(), sessions, backend, display.clone(), store)
            .with_backend_timeout(config.backend.timeout()),
    );

    let (tracker, actor_handle) = TrackerHandle::spawn(engine, coordinator).await?;
    info!("Quiz backend: {}", config.backend.base_url);

    let state = ApiState {
        tracker: tracker.clone(),
        display,
        history,
    };

    tokio::select! {
        result = ApiServer::new(addr, state).serve() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    tracker.stop();
    if let Err(e) = actor_handle.await {
        warn!("Tracker actor did not stop cleanly: {}", e);
    }
    Ok(())
}

async fn status(runtime: &Runtime) -> Result<()> {
    let status = runtime.engine.query_tracking_status().await?;
    if !status.is_tracking {
        println!("No topics tracked. Add one with `keyquiz topic add <name> -k a,b`.");
        return Ok(());
    }

    for topic in status.topics {
        println!("{} (quiz every {})", topic.name, topic.threshold);
        for keyword in &topic.keywords {
            let count = topic.keyword_counts.get(keyword).copied().unwrap_or(0);
            println!("  {:<24} {}", keyword, count);
        }
    }
    Ok(())
}

async fn topic(runtime: &Runtime, action: TopicCommands) -> Result<()> {
    match action {
        TopicCommands::Add {
            name,
            mut keywords,
            threshold,
            generate,
        } => {
            if generate {
                let backend = HttpQuizBackend::new(&runtime.config.backend)?;
                let response = backend.generate_keywords(vec![name.clone()]).await?;
                let suggested = response
                    .keywords_by_topic
                    .get(&name)
                    .cloned()
                    .unwrap_or_default();
                info!("Backend suggested {} keyword(s)", suggested.len());
                for keyword in suggested {
                    if !keywords.contains(&keyword) {
                        keywords.push(keyword);
                    }
                }
            }

            runtime
                .engine
                .register_topic(TopicRegistration {
                    name: name.clone(),
                    keywords,
                    threshold,
                })
                .await?;
            println!("Tracking {}", name);
        }
        TopicCommands::Remove { name } => {
            if !runtime.engine.remove_topic(&name).await? {
                return Err(KeyquizError::TopicNotFound(name));
            }
            println!("Stopped tracking {}", name);
        }
        TopicCommands::Threshold { name, threshold } => {
            runtime.engine.set_threshold(&name, threshold).await?;
            println!("{} now quizzes every {} occurrences", name, threshold);
        }
    }
    Ok(())
}

async fn history(runtime: &Runtime, limit: Option<usize>) -> Result<()> {
    let entries = runtime.history.entries().await?;
    let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
    if entries.is_empty() {
        println!("No quizzes completed yet.");
    }
    for record in entries.into_iter().skip(skip) {
        println!(
            "{}  {} / {}",
            record.completed_at.to_rfc3339(),
            record.topic,
            record.keyword
        );
    }
    Ok(())
}
