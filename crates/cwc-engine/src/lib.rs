//! Live-state reconciliation engine: the shared job cache, the parent
//! poller, and the child resolver, coordinated over two independent
//! cadences without ever blocking the rendering loop.

pub mod cache;
pub mod gate;
pub mod poller;
pub mod resolver;

pub use cache::{JobCache, Snapshot};
pub use gate::FetchGate;

use cwc_client::{GatewayService, RuntimeService};
use cwc_core::WatchConfig;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Out-of-band notifications from the poll loops to the process owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineSignal {
    /// Authentication or configuration failure; the loops have stopped and
    /// the process should exit non-zero.
    Fatal(String),
}

/// Handle to the two running poll loops.
pub struct Engine {
    shutdown: watch::Sender<bool>,
    poller: JoinHandle<()>,
    resolver: JoinHandle<()>,
}

impl Engine {
    /// Start the parent poller and child resolver against a shared cache.
    /// The returned receiver yields fatal signals; everything else is
    /// observable through `JobCache::snapshot`.
    pub fn spawn(
        cache: Arc<JobCache>,
        gateway: Arc<dyn GatewayService>,
        runtime: Arc<dyn RuntimeService>,
        config: WatchConfig,
    ) -> (Self, mpsc::Receiver<EngineSignal>) {
        let (signal_tx, signal_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let poller = tokio::spawn(poller::run_parent_poller(
            cache.clone(),
            gateway,
            config.clone(),
            signal_tx,
            shutdown_rx.clone(),
        ));
        let resolver = tokio::spawn(resolver::run_child_resolver(
            cache,
            runtime,
            config,
            shutdown_rx,
        ));

        (
            Self {
                shutdown: shutdown_tx,
                poller,
                resolver,
            },
            signal_rx,
        )
    }

    /// Stop both loops and wait for them to drain. In-flight child fetches
    /// are detached tasks; they complete against the cache but nothing reads
    /// it afterwards.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.poller.await;
        let _ = self.resolver.await;
    }
}
