use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use targeting::config::Settings;
use targeting::models::{TargetingCriteria, TargetingRequest};
use targeting::{api, db};

#[derive(Parser)]
#[command(name = "tgt")]
#[command(about = "Compile and preview beneficiary targeting criteria")]
struct Cli {
    /// SQLite database file (overrides TARGETING_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Address to bind (overrides TARGETING_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides TARGETING_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Compile criteria against a program's schema and report errors
    Validate {
        #[arg(long)]
        program: Uuid,

        /// JSON file with criteria or a full targeting request
        file: PathBuf,
    },
    /// Run criteria over a program's population
    Preview {
        #[arg(long)]
        program: Uuid,

        /// JSON file with criteria or a full targeting request
        file: PathBuf,

        /// Reference date for derived fields (YYYY-MM-DD), defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "targeting=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database(settings: &Settings) -> anyhow::Result<db::Database> {
    let db = match &settings.db_path {
        Some(path) => db::Database::open(path.clone())
            .with_context(|| format!("Failed to open database at {}", path.display()))?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

/// Accepts either `{"criteria": ..., "exclusions": ...}` or bare criteria.
fn read_request(path: &Path) -> anyhow::Result<TargetingRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))?;

    let request = if value.get("criteria").is_some() {
        serde_json::from_value(value)?
    } else {
        TargetingRequest {
            criteria: serde_json::from_value::<TargetingCriteria>(value)?,
            exclusions: None,
        }
    };
    Ok(request)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut settings = Settings::from_env();
    if let Some(path) = cli.db {
        settings.db_path = Some(path);
    }

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            serve(settings).await?;
        }
        Some(Commands::Validate { program, file }) => {
            let db = open_database(&settings)?;
            let request = read_request(&file)?;
            let summary = db.validate_targeting(program, &request, Utc::now().date_naive())?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Some(Commands::Preview {
            program,
            file,
            as_of,
        }) => {
            let db = open_database(&settings)?;
            let request = read_request(&file)?;
            let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let preview = db.preview_targeting(program, &request, as_of)?;
            println!("{}", serde_json::to_string_pretty(&preview)?);
        }
        None => serve(settings).await?,
    }

    Ok(())
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let db = open_database(&settings)?;
    let app = api::create_router_with_settings(db, &settings);

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Targeting server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
