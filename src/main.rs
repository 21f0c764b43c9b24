use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use pixly::config::Config;
use pixly::db::Database;
use pixly::http::{self, AppState};
use pixly::{logging, storage};

struct Args {
    config_path: Option<PathBuf>,
    bind: Option<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config_path: None,
        bind: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("pixly {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    parsed.bind = Some(args[i + 1].clone());
                    i += 1;
                } else {
                    eprintln!("Error: --bind requires an address argument");
                    std::process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"pixly - photo catalogue with in-place image edits

USAGE:
    pixly [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --bind, -b ADDR     Listen address (overrides [server] bind)
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PIXLY_CONFIG        Path to config file (overrides default location)
    PIXLY_LOG           Log filter (trace, debug, info, warn, error)
    PIXLY_BIND          Listen address
    DATABASE_URL        postgres:// URL of the metadata store
    ACCESS_KEY_ID, SECRET_KEY, BUCKET
                        S3 credentials and bucket
    IMAGE_URL           Prefix of public display URLs

Config file location: $XDG_CONFIG_HOME/pixly/config.toml

See also: pixly-admin --help"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    let mut config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    logging::init(&config.logging)?;

    let db = Database::open(&config.database)?;
    db.initialize()?;
    let store = storage::open_store(&config.storage)?;

    let state = AppState::new(&config, Arc::new(db), store);
    let app = http::router(state, config.server.max_upload_bytes);

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("Listening on {}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(http::shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}
