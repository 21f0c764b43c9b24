//! Pixly maintenance tool.
//!
//! Works directly against the configured metadata and object stores, without
//! a running server:
//!
//! ```bash
//! pixly-admin upload ./IMG_0001.JPG --photographer "Ansel" --caption "Half Dome"
//! pixly-admin show 12
//! pixly-admin edit 12 left
//! ```
//!
//! The response cache of a running server is not reachable from here; its
//! entries expire after `[cache] ttl_secs`.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use pixly::cache::ResponseCache;
use pixly::config::Config;
use pixly::db::{Database, PictureId};
use pixly::edit::{CanonicalEncoding, EditEngine, EditOperation, EditOrchestrator};
use pixly::upload::{UploadRequest, Uploader};
use pixly::{logging, storage};

enum Command {
    Upload {
        file: PathBuf,
        photographer: String,
        caption: String,
    },
    Show(PictureId),
    Edit(PictureId, EditOperation),
}

struct AdminArgs {
    config_path: Option<PathBuf>,
    command: Command,
}

fn main() -> Result<()> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e:#}");
            print_help();
            std::process::exit(1);
        }
    };

    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    logging::init(&config.logging)?;

    let db = Arc::new(Database::open(&config.database)?);
    db.initialize()?;
    let store = storage::open_store(&config.storage)?;
    let cache = Arc::new(ResponseCache::new(&config.cache));

    match args.command {
        Command::Upload {
            file,
            photographer,
            caption,
        } => {
            let bytes =
                std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let uploader = Uploader::new(db, store, cache, config.display.image_url.clone());
            let picture = uploader.upload(UploadRequest {
                file_name,
                photographer,
                caption,
                bytes,
            })?;
            println!("{}\t{}", picture.id, picture.display_url());
        }
        Command::Show(id) => {
            let picture = db.get_picture(id)?.with_context(|| format!("Picture {id} not found"))?;
            println!("{}", serde_json::to_string_pretty(&picture)?);
        }
        Command::Edit(id, op) => {
            let orchestrator = EditOrchestrator::new(
                db,
                store,
                cache,
                EditEngine::new(CanonicalEncoding::from_config(&config.edit)),
                config.cache.invalidation,
                config.edit.staging_dir.clone(),
            );
            let url = orchestrator.edit_and_publish(id, op)?;
            info!(id, operation = %op, "Edit applied from admin tool");
            println!("{url}");
        }
    }

    Ok(())
}

fn parse_args() -> Result<AdminArgs> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut positional = Vec::new();
    let mut photographer = None;
    let mut caption = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("pixly-admin {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(value(&args, i, "--config")?));
                i += 1;
            }
            "--photographer" | "-p" => {
                photographer = Some(value(&args, i, "--photographer")?.to_string());
                i += 1;
            }
            "--caption" => {
                caption = Some(value(&args, i, "--caption")?.to_string());
                i += 1;
            }
            arg if arg.starts_with('-') => bail!("Unknown argument: {arg}"),
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    let command = match positional.as_slice() {
        [cmd, file] if cmd == "upload" => Command::Upload {
            file: PathBuf::from(file),
            photographer: photographer.context("upload requires --photographer")?,
            caption: caption.context("upload requires --caption")?,
        },
        [cmd, id] if cmd == "show" => Command::Show(parse_id(id)?),
        [cmd, id, op] if cmd == "edit" => Command::Edit(parse_id(id)?, op.parse()?),
        [] => bail!("Missing command"),
        _ => bail!("Unrecognised command: {}", positional.join(" ")),
    };

    Ok(AdminArgs {
        config_path,
        command,
    })
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .with_context(|| format!("{flag} requires an argument"))
}

fn parse_id(raw: &str) -> Result<PictureId> {
    raw.parse()
        .with_context(|| format!("Invalid picture id: {raw}"))
}

fn print_help() {
    println!(
        r#"pixly-admin - maintenance commands for Pixly

USAGE:
    pixly-admin [OPTIONS] upload FILE --photographer NAME --caption TEXT
    pixly-admin [OPTIONS] show ID
    pixly-admin [OPTIONS] edit ID OPERATION

OPERATIONS:
    left, right, grayscale, posterize, emboss, blur, color, contrast, brightness

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PIXLY_CONFIG        Path to config file (overrides default location)
    PIXLY_LOG           Log filter (trace, debug, info, warn, error)"#
    );
}
