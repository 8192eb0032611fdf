//! Command-line access to a local orion store

use clap::{Parser, Subcommand};
use orion::common::format_timestamp_millis;
use orion::storage::{NodeEntry, Structure, ValueInfo};
use orion::{Config, Orion, Status};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "orion")]
#[command(about = "orion coordination store CLI")]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory, overrides the config file
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Namespace
    #[arg(long, default_value = "default")]
    ns: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a node
    Get {
        /// Path
        path: String,
    },

    /// Create or overwrite a node
    Put {
        /// Path
        path: String,

        /// Value
        value: String,
    },

    /// Remove a node without children
    Rm {
        /// Path
        path: String,
    },

    /// List the direct children of a directory
    Ls {
        /// Directory path
        path: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a user
    Add { name: String, token: String },

    /// Remove a user
    Del { name: String },

    /// List users
    List,

    /// Check a user's token
    Auth { name: String, token: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.store.data_dir = dir;
    }

    tracing_subscriber::registry()
        .with(log_filter(&config))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // one-shot commands never schedule work
    config.scheduler.threads = 1;

    let ctx = Orion::open(&config)?;
    let result = run(&ctx, &cli.ns, cli.command);
    ctx.shutdown(false);
    // close the store before a possible process::exit
    drop(ctx);

    if let Err(e) = result {
        let status = e.status();
        tracing::debug!("command failed: {}", e);
        eprintln!("{}: {}", status, e);
        std::process::exit(status.code());
    }
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn log_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

fn run(ctx: &Orion, ns: &str, command: Commands) -> orion::Result<()> {
    match command {
        Commands::Get { path } => {
            let info = ctx.tree().get(ns, &path)?;
            println!("{}", String::from_utf8_lossy(&info.value));
            println!("  Type: {}", if info.temp { "temp" } else { "permanent" });
            if info.intermediate {
                println!("  Intermediate: true");
            }
            if let Some(owner) = &info.owner {
                println!("  Owner: {}", owner);
            }
            println!("  Last modified: {}", format_timestamp_millis(info.last_modified));
        }

        Commands::Put { path, value } => {
            ctx.tree().put(ns, &path, &ValueInfo::permanent(value))?;
            println!("{}", Status::Ok);
        }

        Commands::Rm { path } => {
            ctx.tree().remove(ns, &path)?;
            println!("{}", Status::Ok);
        }

        Commands::Ls { path, json } => {
            let entries = ctx
                .tree()
                .list(ns, &path)?
                .collect::<orion::Result<Vec<_>>>()?;
            if json {
                let out: Vec<_> = entries.iter().map(entry_json).collect();
                let text = serde_json::to_string_pretty(&out)
                    .map_err(|e| orion::Error::Internal(e.to_string()))?;
                println!("{}", text);
            } else {
                for entry in &entries {
                    println!(
                        "{}\t{}\t{}",
                        entry.key,
                        format_timestamp_millis(entry.info.last_modified),
                        String::from_utf8_lossy(&entry.info.value)
                    );
                }
            }
        }

        Commands::User { command } => match command {
            UserCommands::Add { name, token } => {
                ctx.auth().add(&name, &token)?;
                println!("{}", Status::Ok);
            }
            UserCommands::Del { name } => {
                ctx.auth().del(&name)?;
                println!("{}", Status::Ok);
            }
            UserCommands::List => {
                for user in ctx.auth().list()? {
                    println!("{}", user);
                }
            }
            UserCommands::Auth { name, token } => {
                if !ctx.auth().auth(&name, &token) {
                    return Err(orion::Error::Invalid(format!("authentication failed for {}", name)));
                }
                println!("{}", Status::Ok);
            }
        },
    }
    Ok(())
}

fn entry_json(entry: &NodeEntry) -> serde_json::Value {
    serde_json::json!({
        "path": entry.key,
        "value": String::from_utf8_lossy(&entry.info.value),
        "temp": entry.info.temp,
        "intermediate": entry.info.intermediate,
        "owner": entry.info.owner,
        "last_modified": format_timestamp_millis(entry.info.last_modified),
    })
}
