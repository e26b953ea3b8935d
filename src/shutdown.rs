//! Graceful shutdown coordinator (§4.10). `SIGTERM`/`SIGINT` stop accepting
//! new client work and give registered components a bounded window to
//! drain in-flight queries before the process exits. Grounded on the
//! teacher's `graceful_shutdown.rs`, with the resolver-cache-specific step
//! removed — this process has no cache, only state the event loop persists
//! itself (the trust-anchor store) before calling [`GracefulShutdown::run`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::time::timeout;
use tracing::{error, info, warn};

type ShutdownResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type ShutdownFn = Box<dyn Fn() -> tokio::task::JoinHandle<ShutdownResult> + Send + Sync>;

const DRAIN_GRACE: Duration = Duration::from_millis(500);
const COMPONENT_TIMEOUT: Duration = Duration::from_secs(5);

struct ShutdownComponent {
    name: String,
    shutdown_fn: ShutdownFn,
}

pub struct GracefulShutdown {
    shutdown_tx: broadcast::Sender<()>,
    components: Arc<Mutex<Vec<ShutdownComponent>>>,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        GracefulShutdown {
            shutdown_tx,
            components: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub async fn register_component<F, Fut>(&self, name: impl Into<String>, shutdown_fn: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ShutdownResult> + Send + 'static,
    {
        let component = ShutdownComponent {
            name: name.into(),
            shutdown_fn: Box::new(move || {
                let fut = shutdown_fn();
                tokio::spawn(fut)
            }),
        };
        self.components.lock().await.push(component);
    }

    pub async fn run(&self) {
        info!("initiating graceful shutdown");

        if self.shutdown_tx.send(()).is_err() {
            warn!("no listeners subscribed to shutdown signal");
        }

        tokio::time::sleep(DRAIN_GRACE).await;

        let components = self.components.lock().await;
        let mut handles = Vec::with_capacity(components.len());
        for component in components.iter() {
            info!(component = %component.name, "shutting down component");
            handles.push((component.name.clone(), (component.shutdown_fn)()));
        }
        drop(components);

        for (name, handle) in handles {
            match timeout(COMPONENT_TIMEOUT, handle).await {
                Ok(Ok(Ok(()))) => info!(component = %name, "component shut down"),
                Ok(Ok(Err(e))) => error!(component = %name, error = %e, "component shutdown failed"),
                Ok(Err(e)) => error!(component = %name, error = %e, "component shutdown task panicked"),
                Err(_) => warn!(component = %name, "component shutdown timed out"),
            }
        }

        info!("graceful shutdown complete");
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}
