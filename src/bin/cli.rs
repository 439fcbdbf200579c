use clap::{Parser, Subcommand};
use std::error::Error;
use std::io::{self, Write};
use std::path::Path;
use std::process;

use bridge_event_relayer::blockchain::strip_hex_prefix;
use bridge_event_relayer::config::AppConfig;
use bridge_event_relayer::state::{SqliteStore, StateStore};

#[derive(Parser)]
#[command(name = "relayer-cli")]
#[command(about = "Inspect the durable state of the bridge event relayer")]
#[command(version)]
struct Cli {
    /// SQLite state database (defaults to state.db_path from configuration)
    #[arg(long, global = true)]
    database: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the stored block cursor
    Cursor,
    /// List relayed transfers, newest first
    Processed {
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Check whether a transaction id has been relayed
    Check {
        /// bytes32 transaction id, with or without 0x
        transaction_id: String,
    },
    /// Print a configuration template
    SampleConfig,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let stdout = io::stdout();
    if let Err(e) = execute(&cli, &mut stdout.lock()) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn execute(cli: &Cli, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
    if let Commands::SampleConfig = cli.command {
        write!(out, "{}", AppConfig::generate_sample_config()?)?;
        return Ok(());
    }

    let db_path = match &cli.database {
        Some(path) => path.clone(),
        None => {
            let mut config = AppConfig::load_from_file()?;
            config.apply_env_overrides()?;
            config.state.db_path
        }
    };
    let store = open_database(&db_path)?;

    match &cli.command {
        Commands::Cursor => {
            let cursor = store.load_cursor()?;
            let updated_at = store.cursor_updated_at()?;
            let processed = store.processed_count()?;
            if cli.json {
                writeln!(
                    out,
                    "{}",
                    serde_json::json!({
                        "next_from_block": cursor,
                        "updated_at": updated_at,
                        "processed_count": processed,
                    })
                )?;
            } else {
                match cursor {
                    Some(block) => writeln!(out, "Next block to scan: {}", block)?,
                    None => writeln!(out, "No cursor stored yet")?,
                }
                if let Some(ts) = updated_at.and_then(|ts| chrono::DateTime::from_timestamp(ts as i64, 0)) {
                    writeln!(out, "Last updated:       {}", ts.to_rfc3339())?;
                }
                writeln!(out, "Relayed transfers:  {}", processed)?;
            }
        }
        Commands::Processed { limit, offset } => {
            let rows = store.recent_processed(*limit, *offset)?;
            if cli.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?;
            } else if rows.is_empty() {
                writeln!(out, "No relayed transfers")?;
            } else {
                for row in rows {
                    writeln!(
                        out,
                        "{}  block={}  chain={}  recipient={}  amount={}",
                        row.transaction_id, row.block_number, row.destination_chain_id, row.recipient, row.amount
                    )?;
                }
            }
        }
        Commands::Check { transaction_id } => {
            let id = transaction_id_key(transaction_id)?;
            let row = store.get_processed(&id)?;
            if cli.json {
                writeln!(
                    out,
                    "{}",
                    serde_json::json!({ "transaction_id": id, "processed": row.is_some(), "record": row })
                )?;
            } else {
                match row {
                    Some(row) => writeln!(
                        out,
                        "{} was relayed (block {}, source tx {})",
                        row.transaction_id, row.block_number, row.source_tx_hash
                    )?,
                    None => writeln!(out, "{} has not been relayed", id)?,
                }
            }
        }
        Commands::SampleConfig => {}
    }

    Ok(())
}

fn open_database(db_path: &str) -> Result<SqliteStore, Box<dyn Error>> {
    if !Path::new(db_path).exists() {
        return Err(format!(
            "no state database at '{}'; run the listener with STATE_BACKEND=sqlite first",
            db_path
        )
        .into());
    }
    Ok(SqliteStore::new(db_path)?)
}

/// Stored form of a transaction id: lowercase, `0x`-prefixed, 32 bytes
fn transaction_id_key(input: &str) -> Result<String, String> {
    let digits = strip_hex_prefix(input);
    if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("'{}' is not a bytes32 transaction id", input));
    }
    Ok(format!("0x{}", digits.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_event_relayer::models::CanonicalTransferRecord;
    use tempfile::TempDir;

    fn run(args: &[&str]) -> Result<String, String> {
        let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;
        let mut out = Vec::new();
        execute(&cli, &mut out).map_err(|e| e.to_string())?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn seeded_database(dir: &TempDir) -> String {
        let path = dir.path().join("state.db").to_str().unwrap().to_string();
        let mut store = SqliteStore::new(&path).unwrap();
        store
            .mark_processed(&CanonicalTransferRecord {
                transaction_id: format!("0x{}", "aa".repeat(32)),
                destination_chain_id: 5,
                recipient: format!("0x{}", "bb".repeat(20)),
                amount: "1000".to_string(),
                source_tx_hash: format!("0x{}", "cd".repeat(32)),
                block_number: 950,
            })
            .unwrap();
        store.save_cursor(1_001).unwrap();
        path
    }

    #[test]
    fn test_transaction_id_key_normalizes_input() {
        let expected = format!("0x{}", "aa".repeat(32));
        assert_eq!(transaction_id_key(&"AA".repeat(32)).unwrap(), expected);
        assert_eq!(transaction_id_key(&format!("0X{}", "Aa".repeat(32))).unwrap(), expected);
        assert_eq!(transaction_id_key(&format!(" 0x{} ", "aa".repeat(32))).unwrap(), expected);

        assert!(transaction_id_key("0x1234").is_err());
        assert!(transaction_id_key(&format!("0x{}", "zz".repeat(32))).is_err());
    }

    #[test]
    fn test_missing_database_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.db");
        let path = path.to_str().unwrap();

        let err = run(&["relayer-cli", "--database", path, "cursor"]).unwrap_err();
        assert!(err.contains("no state database"), "unexpected error: {}", err);
        assert!(!Path::new(path).exists());
    }

    #[test]
    fn test_check_finds_record_with_any_prefix_and_case() {
        let dir = TempDir::new().unwrap();
        let path = seeded_database(&dir);
        let upper = "AA".repeat(32);

        let output = run(&["relayer-cli", "--database", &path, "check", &upper]).unwrap();
        assert!(output.contains("was relayed (block 950"), "output was {}", output);

        let output = run(&["relayer-cli", "--database", &path, "--json", "check", &format!("0x{}", "ee".repeat(32))]).unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["processed"], false);
        assert!(json["record"].is_null());
    }

    #[test]
    fn test_cursor_and_processed_listing() {
        let dir = TempDir::new().unwrap();
        let path = seeded_database(&dir);

        let output = run(&["relayer-cli", "--database", &path, "--json", "cursor"]).unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["next_from_block"], 1_001);
        assert_eq!(json["processed_count"], 1);

        let output = run(&["relayer-cli", "--database", &path, "processed", "--limit", "5"]).unwrap();
        assert!(output.contains("block=950  chain=5"), "output was {}", output);
        assert!(output.contains("amount=1000"));
    }

    #[test]
    fn test_sample_config_needs_no_database() {
        let output = run(&["relayer-cli", "--database", "/nonexistent/state.db", "sample-config"]).unwrap();
        assert!(output.contains("[chain]"));
        assert!(output.contains("[listener]"));
    }
}
