use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use moisture_hub::{
    config::resolve_database_url,
    db::Database,
    logging::init_logging,
    server::{self, ServerConfig},
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Soil moisture telemetry API", long_about = None)]
struct Args {
    /// Bind host
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Listening port
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,
    /// Database connection string (SQLite path or sqlite:// url)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,
    /// Plain-text secret file read when no database url is given
    #[arg(long, default_value = "database_url.txt")]
    database_url_file: PathBuf,
    /// Directory uploaded models are stored in and served from
    #[arg(long, default_value = "uploads")]
    uploads_dir: PathBuf,
    /// Optional dashboard directory served at /
    #[arg(long)]
    static_dir: Option<PathBuf>,
    /// Run migrations and exit (for testing/deployment)
    #[arg(long, default_value_t = false)]
    migrate_only: bool,
}

#[actix_web::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let url = resolve_database_url(args.database_url.as_deref(), &args.database_url_file)
        .inspect_err(|e| error!("Database configuration failed: {e:#}"))?;
    let db = Arc::new(Database::new(url));
    // connect eagerly so a bad store aborts startup
    db.connect()
        .inspect_err(|e| error!("Database connection failed: {e:#}"))?;

    if args.migrate_only {
        info!("migrations applied, exiting due to --migrate-only flag");
        return Ok(());
    }

    let cfg = ServerConfig {
        host: args.host,
        port: args.port,
        uploads_dir: args.uploads_dir,
        static_dir: args.static_dir,
    };
    server::run(cfg, db).await
}
