//! Multi-tenant configuration distribution service.
//!
//! # Architecture Overview
//!
//! ```text
//!   backing store (git / S3 / in-memory seed)
//!        │ find_all / find / save / delete
//!        ▼
//!   ┌───────────────────────┐      announce(stamp, paths)
//!   │  VersionedProxyCache  │ ───────────────────────────▶ message bus
//!   └──────────┬────────────┘
//!              │ apply(docs) under the mutation lock
//!              ▼
//!   ┌───────────────────────┐
//!   │      ConfigStore      │  alias inheritance
//!   │  (published snapshot) │  processor chain ($include, ${...})
//!   └──────────┬────────────┘
//!              │ lock-free reads
//!              ▼
//!        consumer services
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use tenant_config::cache::{
    BroadcastAnnouncer, FanoutAnnouncer, InMemoryBackingStore, TracingAnnouncer,
    VersionedProxyCache,
};
use tenant_config::config::load_or_default;
use tenant_config::observability::{logging, metrics};
use tenant_config::processors::ProcessorChain;
use tenant_config::store::ConfigStore;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "tenant-config", version, about = "Multi-tenant configuration service")]
struct Args {
    /// Settings file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed directory, overriding `[seed].directory`.
    #[arg(long)]
    seed_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut config = load_or_default(args.config.as_deref())?;
    if let Some(dir) = args.seed_dir {
        config.seed.directory = Some(dir);
    }

    logging::init_logging(&config.observability);
    tracing::info!("tenant-config v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let chain = ProcessorChain::from_config(&config.processors);
    tracing::info!(
        processors = ?chain.names(),
        tenants_root = %config.store.tenants_root,
        lock_timeout_secs = config.store.lock_timeout_secs,
        "Configuration loaded"
    );
    let store = Arc::new(ConfigStore::new(
        config.store.layout(),
        chain,
        config.store.lock_timeout(),
    ));

    let backing = Arc::new(InMemoryBackingStore::new());
    if let Some(dir) = &config.seed.directory {
        let docs = InMemoryBackingStore::read_directory(dir)?;
        let stamp = backing.seed(&docs).await;
        tracing::info!(directory = %dir.display(), documents = docs.len(), stamp = %stamp, "Seeded backing store");
    }

    let events = Arc::new(BroadcastAnnouncer::new(256));
    let mut rx = events.subscribe();
    let announcer = FanoutAnnouncer::new()
        .with(Arc::new(TracingAnnouncer))
        .with(events);
    let cache = VersionedProxyCache::new(backing, store, Arc::new(announcer));

    let changed = cache.refresh_all().await?;
    tracing::info!(
        changed = changed.len(),
        documents = cache.store().snapshot().persisted_count(),
        "Initial sync complete"
    );

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => tracing::debug!(id = %event.id, stamp = %event.stamp, paths = event.paths.len(), "Change event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Change event receiver lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, shutting down");
                break;
            }
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
