use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::{fs, path::Path, path::PathBuf};

#[derive(Parser)]
#[command(name = "xtask", about = "ticketbot workspace tasks")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Validate a ticket store against schemas/tickets.schema.json
    ValidateStore { file: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::ValidateStore { file } => validate_store(&file),
    }
}

/// Keys must name their ticket and stay within `1..=lastId`; the schema cannot say that.
fn id_problems(data: &Value) -> Vec<String> {
    let Some(map) = data.as_object() else { return Vec::new() };
    let last_id = map.get("lastId").and_then(Value::as_u64).unwrap_or(0);
    map.iter()
        .filter(|(k, _)| *k != "lastId")
        .filter_map(|(key, ticket)| {
            let id = ticket.get("id").and_then(Value::as_str).unwrap_or_default();
            if id != key {
                Some(format!("key {key} holds ticket id {id:?}"))
            } else if key.parse::<u64>().map_or(true, |n| n == 0 || n > last_id) {
                Some(format!("ticket {key} is outside 1..={last_id}"))
            } else {
                None
            }
        })
        .collect()
}

fn validate_store(path: &Path) -> Result<()> {
    let schema_text = include_str!("../../schemas/tickets.schema.json");
    let schema: Value = serde_json::from_str(schema_text)?;
    let compiled = jsonschema::validator_for(&schema)?;
    let data_text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let data: Value = serde_json::from_str(&data_text).with_context(|| "parse json")?;
    let mut errors: Vec<String> = compiled.iter_errors(&data).map(|e| e.to_string()).collect();
    errors.extend(id_problems(&data));
    if !errors.is_empty() {
        eprintln!("Invalid: {}", path.display());
        for e in errors {
            eprintln!("- {}", e);
        }
        std::process::exit(1);
    }
    println!("OK: {}", path.display());
    Ok(())
}
