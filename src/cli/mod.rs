use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod chat;
pub mod init;
pub mod migrate;
pub mod serve;

use crate::chat::{SessionController, SqliteChatStore};
use crate::core::AppConfig;
use crate::core::db::{async_db, initialize_db};
use crate::exa::ExaClient;
use crate::openai::{Completion, OpenAiClient};

#[derive(Subcommand)]
enum Command {
    /// Create the storage directory and the chat database
    Init {},
    /// Apply pending chat database migrations
    Migrate {},
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Start an interactive chat session
    Chat {
        /// Start in web search mode
        #[arg(long, action, default_value = "false")]
        search: bool,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    // Writes to stderr so log lines don't interleave with chat output
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Wire the configured clients and store into a session controller,
/// bringing the database schema up to date first.
pub async fn session_controller(config: &AppConfig) -> Result<SessionController> {
    std::fs::create_dir_all(&config.storage_path)?;
    let db = async_db(&config.db_path).await?;
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await?;
    let store = Arc::new(SqliteChatStore::new(db));

    let completion: Arc<dyn Completion> = Arc::new(OpenAiClient::new(
        &config.openai_api_hostname,
        &config.openai_api_key,
        &config.openai_model,
        &config.system_message,
    ));
    let search = Arc::new(ExaClient::new(
        &config.exa_api_hostname,
        &config.exa_api_key,
        config.search_num_results,
        Arc::clone(&completion),
    ));

    Ok(SessionController::builder(completion, search, store).build())
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let config = AppConfig::default();

    // Handle each sub command
    match args.command {
        Some(Command::Init {}) => {
            init_tracing(&format!("{}=info", env!("CARGO_CRATE_NAME")));
            init::run(&config).await?;
        }
        Some(Command::Migrate {}) => {
            init_tracing(&format!("{}=info", env!("CARGO_CRATE_NAME")));
            migrate::run(&config).await?;
        }
        Some(Command::Serve { host, port }) => {
            // axum logs rejections from built-in extractors with the `axum::rejection`
            // target, at `TRACE` level. `axum::rejection=trace` enables showing those events
            init_tracing(&format!(
                "{}=debug,tower_http=debug,axum::rejection=trace",
                env!("CARGO_CRATE_NAME")
            ));
            serve::run(host, port, config).await?;
        }
        Some(Command::Chat { search }) => {
            init_tracing(&format!("{}=warn", env!("CARGO_CRATE_NAME")));
            chat::run(&config, search).await?;
        }
        None => {}
    }

    Ok(())
}
