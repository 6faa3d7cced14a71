// ticketbot/src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ticketbot::{ConfigManager, Handler, Inbound};

#[derive(Parser)]
#[command(name = "ticketbot", version, about = "Chat-driven ticket tracker over stdin/stdout")]
struct Args {
    /// Workspace root: holds .ticketbot/config.toml and relative store/trivia paths
    #[arg(long, default_value = ".")]
    workspace: PathBuf,
    /// Sender name for every line (defaults to $USER)
    #[arg(long)]
    user: Option<String>,
    /// Room name; omit to talk to the bot directly
    #[arg(long)]
    room: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ConfigManager::load(&args.workspace).context("load configuration")?;

    let filter = std::env::var("RUST_LOG").ok()
        .or_else(|| config.get().log.filter)
        .unwrap_or_else(|| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let user = args.user.or_else(|| std::env::var("USER").ok()).unwrap_or_else(|| "someone".into());
    let mut handler = Handler::new(&args.workspace);
    let mut reloads = config.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!(workspace = %args.workspace.display(), %user, room = ?args.room, "ticketbot listening on stdin");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(text) = line? else { break };
                let msg = Inbound { text, user_name: user.clone(), room: args.room.clone() };
                match handler.handle(&config.get(), &msg) {
                    Ok(Some(reply)) => println!("{reply}"),
                    Ok(None) => {}
                    Err(e) => {
                        error!(error = %format!("{e:#}"), "message failed");
                        println!("{e:#}");
                    }
                }
            }
            changed = reloads.recv() => match changed {
                Ok(cfg) => info!(prefix = cfg.prefix(), whitelisted = ?cfg.bot.whitelisted, "configuration reloaded"),
                Err(e) => warn!(error = %e, "missed configuration updates"),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }
    Ok(())
}
