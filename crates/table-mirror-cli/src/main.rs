mod commands;
mod config;
mod mirrors;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use table_mirror::RemoteSource;
use table_mirror_supabase::SupabaseSource;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "table-mirror")]
#[command(about = "Mirror remote tables into a local JSON snapshot and serve its status")]
struct Cli {
    /// Config file (defaults to ~/.config/table-mirror/mirror.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run every mirror in the background and serve status over HTTP (default)
    Serve,
    /// Run one sync cycle per mirror and exit
    Sync {
        /// Only sync this mirror
        #[arg(long)]
        label: Option<String>,
    },
    /// Show whether each mirror has a snapshot and how old it is
    Status {
        /// Only report this mirror
        #[arg(long)]
        label: Option<String>,
    },
    /// Summarize a mirror's snapshot
    Show {
        /// Mirror to show (defaults to the first enabled mirror)
        #[arg(long)]
        label: Option<String>,
        /// Print the snapshot file as stored
        #[arg(long)]
        raw: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_source(app: &AppConfig) -> Result<Arc<dyn RemoteSource>> {
    let config = app.supabase_config(|name| std::env::var(name).ok())?;
    let source = SupabaseSource::new(config).context("failed to build Supabase client")?;
    Ok(Arc::new(source))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let app = config::load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let mirrors = mirrors::open(&app, None)?;
            let source = build_source(&app)?;
            commands::serve::run(&app, mirrors, source).await
        }
        Command::Sync { label } => {
            let mirrors = mirrors::open(&app, label.as_deref())?;
            let source = build_source(&app)?;
            let total = mirrors.len();
            let mut failed = 0usize;

            for mirror in &mirrors {
                let engine = mirror.engine(Arc::clone(&source))?;
                if let Err(e) = commands::sync::run(&engine).await {
                    eprintln!("warning: sync failed for [{}]: {e}", mirror.label());
                    failed += 1;
                }
            }

            let succeeded = total - failed;
            if succeeded == 0 {
                anyhow::bail!("all {total} mirrors failed to sync");
            }
            if failed > 0 {
                eprintln!("Synced {succeeded} mirrors ({failed} failed)");
            }
            Ok(())
        }
        Command::Status { label } => {
            let mirrors = mirrors::open(&app, label.as_deref())?;
            commands::status::run(&mirrors)
        }
        Command::Show { label, raw } => {
            let mirrors = mirrors::open(&app, label.as_deref())?;
            let mirror = mirrors.first().context("no mirrors configured")?;
            commands::show::run(mirror, raw)
        }
    }
}
