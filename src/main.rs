//! xdatabase - Main entry point.
//!
//! Command-line front-end for the xdatabase client: run queries, non-query
//! statements and blob transfers against SQLite, MySQL and MS Access.

use clap::Parser;
use humansize::{BINARY, format_size};
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use xdatabase::config::{Command, Config};
use xdatabase::format::{OutputFormat, render};
use xdatabase::models::{Statement, Value, masked_connection_string};
use xdatabase::{DbClient, DbError};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so query output on stdout stays clean
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(client: &mut DbClient, config: &Config) -> Result<(), DbError> {
    match &config.command {
        Command::Test => {
            client.test_connection(&config.connection).await?;
            println!("Connection OK ({})", client.db_type());
        }
        Command::Query { sql, params } => {
            let start = Instant::now();
            let table = client.select_table(sql, params).await?;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            println!("{}", render(&table, config.format, elapsed_ms));
        }
        Command::Cell { sql, params } => {
            let value: Value = client.select_cell(sql, params).await?;
            match config.format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string(&value).map_err(|e| DbError::internal(e.to_string()))?
                ),
                _ => println!("{}", value),
            }
        }
        Command::Execute { sql, params } => {
            let rows_affected = match sql.as_slice() {
                [single] => client.execute(single, params).await?,
                _ if !params.is_empty() => {
                    return Err(DbError::invalid_input(
                        "--param can only be used with a single statement",
                    ));
                }
                many => {
                    let statements: Vec<Statement> = many
                        .iter()
                        .map(|s| Statement::new(s.as_str()))
                        .collect();
                    client.execute_batch(&statements).await?
                }
            };
            println!("Query OK, {} rows affected", rows_affected);
        }
        Command::PutFile { path, sql, param } => {
            let size = tokio::fs::metadata(path).await?.len();
            let rows_affected = client.insert_file(path, sql, param).await?;
            println!(
                "Stored {} ({}), {} rows affected",
                path.display(),
                format_size(size, BINARY),
                rows_affected
            );
        }
        Command::SaveBlob { path, sql, params } => {
            let written = client.select_binary_and_save(path, sql, params).await?;
            println!("Saved {} to {}", format_size(written, BINARY), path.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    let client_config = config.client_config()?;
    info!(
        backend = %client_config.db_type,
        connection = %masked_connection_string(&config.connection),
        "Starting xdatabase v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mut client = DbClient::from_config(client_config);
    let result = run(&mut client, &config).await;

    if let Err(e) = client.close().await {
        error!(error = %e, "Failed to close connection");
    }

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        if let Some(suggestion) = e.suggestion() {
            eprintln!("Hint: {}", suggestion);
        }
        return Err(e.into());
    }

    Ok(())
}
