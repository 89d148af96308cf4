use anyhow::Result;
use billing_core::ValidationMode;
use clap::Parser;
use database_layer::DatabasePool;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use medledger_server::{create_app, MedLedgerServer, ServerConfig};

/// MedLedger HTTP API server
#[derive(Parser, Debug)]
#[command(name = "medledger-server")]
#[command(about = "Multi-tenant medical billing records API server")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "8080", env = "PORT")]
    port: u16,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Root directory for stored attachments
    #[arg(long, env = "MEDLEDGER_UPLOAD_DIR", default_value = "./uploads")]
    upload_dir: PathBuf,

    /// Foreign-reference failure reporting: fail-fast or exhaustive
    #[arg(long, env = "MEDLEDGER_VALIDATION_MODE", default_value = "fail-fast")]
    validation_mode: ValidationMode,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.verbose);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting MedLedger server");

    let pool = DatabasePool::new(&args.database_url).await?;
    pool.migrate().await?;

    let config = ServerConfig {
        validation_mode: args.validation_mode,
        upload_dir: args.upload_dir,
    };
    let server = MedLedgerServer::new(pool, config);
    let app = create_app(server);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("MedLedger server listening on http://{}", addr);
    info!("Health check available at http://{}/health", addr);
    info!("API v1 available at http://{}/api/v1", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "medledger_server=debug,billing_core=debug,database_layer=debug,tower_http=debug,sqlx=info"
    } else {
        "medledger_server=info,billing_core=info,database_layer=info,tower_http=info,sqlx=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
