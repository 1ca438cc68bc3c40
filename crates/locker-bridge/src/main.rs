//! SmartLocker bridge entry point.
//!
//! Usage: smartlocker-bridge [run|check|pending|sync] [options]
//!
//! Without a subcommand the bridge runs. Settings come from
//! `~/.smartlocker/config.json`, then `SMARTLOCKER_*` environment
//! variables, then the flags below.

use anyhow::{Context, Result};
use authority_client::{Authority, WebhookClient};
use bridge_config_and_utils::{init_logging, Config, OfflinePolicy, Paths};
use clap::{Parser, Subcommand};
use locker_bridge::{Bridge, Overrides, ShutdownSignals};
use pending_action_store::PendingActionStore;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info};

/// Bridge between a locker controller and its borrow/return authority.
#[derive(Parser, Debug)]
#[command(name = "smartlocker-bridge", version)]
#[command(about = "Bridge between a locker controller and its borrow/return authority")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Webhook URL of the remote authority.
    #[arg(long, global = true)]
    webhook_url: Option<String>,

    /// Serial device the locker is bound to (e.g. /dev/rfcomm0).
    #[arg(long, global = true, conflicts_with = "listen")]
    device: Option<PathBuf>,

    /// Accept the locker over TCP on this address instead of a device.
    #[arg(long, global = true)]
    listen: Option<String>,

    /// Answer to borrows while the authority is unreachable (optimistic, pessimistic).
    #[arg(long, global = true)]
    offline_policy: Option<OfflinePolicy>,

    /// State directory (default ~/.smartlocker).
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Run the bridge (default).
    Run,
    /// Check that the authority webhook answers.
    Check,
    /// List actions waiting to be reported to the authority.
    Pending,
    /// Run one reconciliation pass now.
    Sync,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            log_level: self.log_level.clone(),
            webhook_url: self.webhook_url.clone(),
            device: self.device.clone(),
            listen: self.listen.clone(),
            offline_policy: self.offline_policy,
        }
    }

    fn paths(&self) -> Result<Paths> {
        match self.base_dir {
            Some(ref dir) => Ok(Paths::with_base_dir(dir.clone())),
            None => Paths::new().context("resolving home directory"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = cli.paths()?;
    paths.ensure_dirs().context("creating state directory")?;

    let mut config = Config::load(&paths).context("loading configuration")?;
    cli.overrides().apply(&mut config);

    init_logging(&config.log_level, Some(&paths));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config, &paths).await,
        Commands::Check => check(&config).await,
        Commands::Pending => pending(&config, &paths),
        Commands::Sync => sync(config, &paths).await,
    }
}

async fn run(config: Config, paths: &Paths) -> Result<()> {
    info!("SmartLocker bridge starting...");

    let bridge = Bridge::new(config, paths).context("building bridge")?;

    let mut signals = ShutdownSignals::new().context("installing signal handlers")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut task = tokio::spawn(bridge.run(shutdown_rx));

    tokio::select! {
        result = &mut task => {
            let result = result.context("bridge task panicked")?;
            if let Err(ref e) = result {
                error!(error = %e, "Bridge exited with error");
            }
            result?;
        }
        signal_name = signals.recv() => {
            info!(signal = signal_name, "Received shutdown signal, stopping...");
            let _ = shutdown_tx.send(true);
            task.await.context("bridge task panicked")??;
        }
    }

    Ok(())
}

async fn check(config: &Config) -> Result<()> {
    let client = WebhookClient::from_config(config)?;
    println!("Webhook: {}", client.url());

    match client.ping().await {
        Ok(()) => {
            println!("Authority reachable");
            Ok(())
        }
        Err(e) => {
            println!("Authority NOT reachable: {}", e);
            Err(e.into())
        }
    }
}

fn pending(config: &Config, paths: &Paths) -> Result<()> {
    let store = PendingActionStore::open(config.pending_file(paths));
    let actions = store.list();

    println!("Pending file: {}", store.path().display());
    if actions.is_empty() {
        println!("No pending actions");
        return Ok(());
    }

    println!("{} pending action(s):", actions.len());
    for action in actions {
        println!(
            "  {:<6}  {:<32}  {}",
            action.kind.as_str(),
            action.student_id.as_str(),
            action.created_at.to_rfc3339()
        );
    }
    Ok(())
}

async fn sync(config: Config, paths: &Paths) -> Result<()> {
    let bridge = Bridge::new(config, paths).context("building bridge")?;
    let report = bridge.sync_once().await;

    println!(
        "Attempted {}, synced {}, remaining {}",
        report.attempted, report.synced, report.remaining
    );
    Ok(())
}
