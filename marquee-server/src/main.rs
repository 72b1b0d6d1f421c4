//! Marquee server binary
//!
//! ```bash
//! marquee serve --config config.toml --port 8000 --seed seed.json
//! marquee verify --data-dir ./data/marquee
//! ```

mod seed;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use marquee_core::config::MarqueeConfig;
use marquee_core::session::SessionStore;
use marquee_core::store::Journal;
use marquee_core::{App, HttpServer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "marquee", about = "Movie catalog with reviews and petitions", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// TOML config file; missing means defaults
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,

        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        /// Journal directory
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Keep all data in memory (nothing is journaled)
        #[arg(long)]
        in_memory: bool,

        /// JSON file with users and movies, loaded when the store is empty
        #[arg(long)]
        seed: Option<PathBuf>,

        /// JSON purchase ledger exported by the order system
        #[arg(long)]
        orders: Option<PathBuf>,
    },
    /// Check the journal's checksums and hash chain
    Verify {
        #[arg(long, default_value = "./data/marquee")]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { config, port, host, data_dir, in_memory, seed, orders } => {
            serve(ServeArgs { config, port, host, data_dir, in_memory, seed, orders }).await
        }
        Commands::Verify { data_dir } => verify(&data_dir),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

struct ServeArgs {
    config: PathBuf,
    port: Option<u16>,
    host: Option<String>,
    data_dir: Option<PathBuf>,
    in_memory: bool,
    seed: Option<PathBuf>,
    orders: Option<PathBuf>,
}

impl ServeArgs {
    /// CLI flags override file and environment
    fn apply(&self, config: &mut MarqueeConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.storage.data_dir = dir.clone();
        }
        if self.in_memory {
            config.storage.in_memory = true;
        }
        if let Some(orders) = &self.orders {
            config.orders.ledger_path = Some(orders.clone());
        }
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let mut config = MarqueeConfig::load_from(&args.config)?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    marquee_core::logging::init(&config.logging);

    let app = Arc::new(App::from_config(&config)?);

    if let Some(path) = &args.seed {
        let applied = seed::apply(&app, path).await?;
        if applied {
            log::info!("Seeded store from {}", path.display());
        } else {
            log::info!("Store already has data, skipping seed {}", path.display());
        }
    }

    spawn_session_cleanup(&app, config.sessions.cleanup_interval_secs);

    let server = HttpServer::new(app, config.server.clone()).bind().await?;
    server
        .serve_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
}

fn spawn_session_cleanup(app: &App, interval_secs: u64) {
    let sessions = app.session_store();
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            timer.tick().await;
            match sessions.cleanup_expired().await {
                Ok(count) if count > 0 => log::info!("Removed {} expired sessions", count),
                Ok(_) => {}
                Err(e) => log::error!("Session cleanup failed: {}", e),
            }
        }
    });
}

fn verify(data_dir: &std::path::Path) -> Result<()> {
    if !data_dir.exists() {
        bail!("No journal directory at {}", data_dir.display());
    }
    let report = Journal::verify(data_dir)
        .with_context(|| format!("Journal in {} failed verification", data_dir.display()))?;

    println!("{} events verified", report.events);
    if let Some(hash) = report.last_hash {
        println!("chain head {}", hash);
    }
    Ok(())
}
