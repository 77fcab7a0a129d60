//! Pantry Sync - household pantry & grocery-list server
//!
//! Serves the grocery-list reconciliation API over a local SQLite database.

use clap::Parser;
use pantry_sync::database::init_schema;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Household pantry server - tracks inventory and derives the shopping list
#[derive(Parser, Debug)]
#[command(name = "pantry_sync")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, default_value_t = default_db_path())]
    database: String,

    /// Port for the HTTP API
    #[arg(short, long, default_value_t = 8080)]
    port: u16,
}

/// Returns the default database path: ~/.local/share/pantry_sync/pantry.db
fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pantry_sync")
        .join("pantry.db")
        .to_string_lossy()
        .to_string()
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let db_path = PathBuf::from(&args.database);

    log::info!("Starting pantry_sync...");
    log::info!("Database path: {}", db_path.display());

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.exists() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::error!("Failed to create database directory: {}", e);
                std::process::exit(1);
            }
            log::info!("Created directory: {}", parent.display());
        }
    }

    // Open database connection
    let conn = match Connection::open(&db_path) {
        Ok(conn) => {
            log::info!("Opened database: {}", db_path.display());
            conn
        }
        Err(e) => {
            log::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize database schema
    if let Err(e) = init_schema(&conn) {
        log::error!("Failed to initialize database schema: {}", e);
        std::process::exit(1);
    }

    // Wrap connection in Arc<Mutex> for thread-safe sharing across handlers
    let db = Arc::new(Mutex::new(conn));

    if let Err(e) = pantry_sync::web::serve(db, args.port).await {
        log::error!("Web server error: {}", e);
        std::process::exit(1);
    }
}
