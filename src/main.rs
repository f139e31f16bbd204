use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pulseboard::{api, cache::TtlCache, config::ServerConfig, db};

#[derive(Parser)]
#[command(name = "pulseboard")]
#[command(about = "Team objective tracking with pulse checks and health scoring")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Pulseboard server
    Serve {
        /// Port for HTTP API (overrides PULSEBOARD_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Database file path (overrides PULSEBOARD_DB)
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "pulseboard=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = ServerConfig::from_env();
    let (port, database) = match cli.command {
        Some(Commands::Serve { port, database }) => {
            (port.unwrap_or(config.port), database.or(config.database))
        }
        None => (config.port, config.database),
    };

    let db = match database {
        Some(path) => db::Database::open(path)?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;

    let app = api::create_router(db, TtlCache::new());

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Pulseboard server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
