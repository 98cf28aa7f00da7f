use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bondster_import::actor::{ActorSystem, Envelope};
use bondster_import::clock::SystemClock;
use bondster_import::config::{default_config_path, ResolvedConfig};
use bondster_import::duration::format_duration;
use bondster_import::metrics::Metrics;
use bondster_import::openbank::{LedgerClient, VaultClient};
use bondster_import::scheduler::Scheduler;
use bondster_import::storage::{load_identity, EncryptedStorage, FileStorage, Storage, TokenStore};
use bondster_import::sync::WorkflowContext;
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "bondster-import")]
#[command(about = "Imports Bondster statements into the openbank ledger")]
struct Cli {
    /// Path to config file.
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Run a single synchronization tick, wait for it and exit.
    #[arg(long)]
    once: bool,
}

fn build_context(config: &ResolvedConfig, metrics: Arc<Metrics>) -> Result<WorkflowContext> {
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let identity = load_identity(&config.identity_file)?;
    let encrypted: Arc<dyn Storage> = Arc::new(EncryptedStorage::new(
        FileStorage::new(config.encrypted_root()),
        identity,
    ));
    let plaintext: Arc<dyn Storage> = Arc::new(FileStorage::new(config.plaintext_root()));

    Ok(WorkflowContext {
        tenant: config.tenant.clone(),
        vault: VaultClient::new(http.clone(), config.gateways.vault.clone()),
        ledger: LedgerClient::new(http.clone(), config.gateways.ledger.clone()),
        bondster_url: config.gateways.bondster.clone(),
        http,
        tokens: TokenStore::new(encrypted),
        plaintext,
        metrics,
        clock: Arc::new(SystemClock),
    })
}

/// Reads stdin on a plain thread so a blocked read never holds up runtime
/// shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Failed to read bus input");
                    break;
                }
            }
        }
    });
    rx
}

/// Feeds bus frames to the actor system until input closes or shutdown.
async fn read_frames(actors: Arc<ActorSystem>, mut shutdown: watch::Receiver<bool>) {
    let mut frames = spawn_stdin_reader();
    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) if frame.trim().is_empty() => {}
                Some(frame) => actors.deliver(&frame),
                None => {
                    debug!("Bus input closed");
                    break;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Writes replies to stdout, one frame per line.
async fn write_frames(mut outbound: mpsc::UnboundedReceiver<Envelope>) {
    let mut stdout = tokio::io::stdout();
    while let Some(envelope) = outbound.recv().await {
        let frame = format!("{}\n", envelope.encode());
        if let Err(err) = stdout.write_all(frame.as_bytes()).await {
            warn!(error = %err, "Failed to write reply");
            continue;
        }
        if let Err(err) = stdout.flush().await {
            warn!(error = %err, "Failed to flush replies");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ResolvedConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .json(),
        )
        .init();

    info!(
        tenant = %config.tenant,
        data_dir = %config.data_dir.display(),
        sync_rate = %format_duration(config.sync_rate),
        "Starting importer"
    );

    let metrics = Arc::new(Metrics::new());
    let ctx = Arc::new(build_context(&config, metrics.clone())?);
    let tokens = ctx.tokens.clone();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_frames(outbound_rx));

    let actors = Arc::new(ActorSystem::new(ctx, outbound_tx, shutdown_rx.clone()));
    let scheduler = Scheduler::new(actors.clone(), tokens, metrics.clone(), config.sync_rate);

    if cli.once {
        scheduler.tick().await?;
        actors.settle().await;
        actors.drain().await;
        let _ = shutdown_tx.send(true);
    } else {
        let reader = tokio::spawn(read_frames(actors.clone(), shutdown_rx.clone()));
        tokio::select! {
            _ = scheduler.run(shutdown_rx.clone()) => {}
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!(error = %err, "Failed to listen for shutdown signal");
                }
                info!("Shutdown requested");
            }
        }
        let _ = shutdown_tx.send(true);
        if let Err(err) = reader.await {
            warn!(error = %err, "Bus reader failed");
        }
        actors.drain().await;
    }

    // actors release the outbound channel once they observe the shutdown
    drop(scheduler);
    drop(actors);
    if let Err(err) = writer.await {
        warn!(error = %err, "Reply writer failed");
    }
    let snapshot = metrics.snapshot();
    info!(
        statements_downloaded = snapshot.statements_downloaded,
        accounts_ensured = snapshot.accounts_ensured,
        transactions_imported = snapshot.transactions_imported,
        "Importer stopped"
    );
    Ok(())
}
