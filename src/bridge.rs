//! Bridge
//!
//! Owns the lane set and the HTTP listener lifecycle. The listener runs its own tokio runtime
//! on a dedicated thread so that the privileged host thread never blocks on network I/O.

use crate::config::BridgeConfig;
use crate::dispatcher::{Dispatcher, PayloadInterpreter};
use crate::error::BridgeError;
use crate::queue::LaneSet;
use crate::scheduler::Scheduler;
use crate::server::{self, ServerState};
use axum::Router;
use parking_lot::Mutex;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<Result<(), BridgeError>>,
}

pub struct Bridge {
    config: BridgeConfig,
    lanes: Arc<LaneSet>,
    listener: Mutex<Option<ListenerHandle>>,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            lanes: Arc::new(LaneSet::new()),
            listener: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Shared handle to the lane queues
    pub fn lanes(&self) -> Arc<LaneSet> {
        Arc::clone(&self.lanes)
    }

    /// Build a scheduler that drains this bridge's lanes.
    ///
    /// The scheduler must be ticked from the thread that owns `environment`.
    pub fn scheduler<I: PayloadInterpreter>(
        &self,
        interpreter: I,
        environment: I::Environment,
    ) -> Scheduler<I> {
        Scheduler::new(self.lanes(), Dispatcher::new(interpreter, environment))
    }

    pub fn is_running(&self) -> bool {
        self.listener.lock().is_some()
    }

    /// Address the listener is bound to, if running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().as_ref().map(|l| l.local_addr)
    }

    /// Bind the configured address and start serving.
    ///
    /// Binding happens on the calling thread so address errors surface here. Port 0 picks an
    /// ephemeral port; the bound address is returned.
    pub fn start(&self) -> Result<SocketAddr, BridgeError> {
        let mut slot = self.listener.lock();
        if slot.is_some() {
            return Err(BridgeError::AlreadyRunning);
        }

        let addr = self.config.server.socket_addr()?;
        let std_listener =
            std::net::TcpListener::bind(addr).map_err(|source| BridgeError::Bind { addr, source })?;
        std_listener.set_nonblocking(true)?;
        let local_addr = std_listener.local_addr()?;

        let app = server::router(ServerState::new(
            self.lanes(),
            self.config.default_timeout(),
        ));
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let grace = self.config.server.shutdown_grace();

        let thread = std::thread::Builder::new()
            .name("skillbridge-http".to_string())
            .spawn(move || -> Result<(), BridgeError> {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .thread_name("skillbridge-worker")
                    .build()?;
                let result = runtime.block_on(serve(std_listener, app, shutdown_rx, grace));
                // Waiters still parked on undrained commands must not hold up the join
                runtime.shutdown_background();
                result
            })?;

        info!(addr = %local_addr, "Bridge listening");
        *slot = Some(ListenerHandle {
            local_addr,
            shutdown,
            thread,
        });
        Ok(local_addr)
    }

    /// Stop accepting requests and join the listener thread.
    ///
    /// In-flight `/execute` requests get `server.shutdown_grace_ms` to finish; any still waiting
    /// after that are dropped with their connections. Commands still queued stay in the lanes
    /// and run on later ticks.
    pub fn stop(&self) -> Result<(), BridgeError> {
        let handle = self.listener.lock().take().ok_or(BridgeError::NotRunning)?;

        let _ = handle.shutdown.send(());
        let result = handle
            .thread
            .join()
            .map_err(|_| BridgeError::Server("listener thread panicked".to_string()))?;

        match &result {
            Ok(()) => info!(addr = %handle.local_addr, "Bridge stopped"),
            Err(e) => error!(addr = %handle.local_addr, error = %e, "Listener exited with error"),
        }
        result
    }
}

/// Serve until `shutdown` fires, then drain in-flight requests for at most `grace`.
async fn serve(
    std_listener: std::net::TcpListener,
    app: Router,
    shutdown: oneshot::Receiver<()>,
    grace: Duration,
) -> Result<(), BridgeError> {
    let listener = tokio::net::TcpListener::from_std(std_listener)?;
    let (draining, drain_started) = oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.await;
            let _ = draining.send(());
        })
        .into_future();

    tokio::select! {
        served = server => served?,
        _ = async {
            let _ = drain_started.await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "Shutdown grace elapsed; dropping requests still waiting on commands"
            );
        }
    }
    Ok(())
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}
