//! Daemon-mode lifecycle orchestration.
//!
//! # Responsibilities
//! - Connect the persistence backend before anything is bound
//! - Bind the listener and serve the pipeline
//! - Start daemon-only background work (metrics exporter, window purge)
//! - On termination: stop accepting, drain under a deadline, disconnect
//!
//! # Design Decisions
//! - Fail fast: a connect failure returns before any port is bound
//! - The drain deadline starts when shutdown is triggered
//! - A missed deadline is reported as [`Termination::Forced`]; exiting the
//!   process is the caller's decision
//! - The backend is only disconnected after a clean drain

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::GatewayConfig;
use crate::database::Database;
use crate::http::server::{Gateway, HttpServer};
use crate::lifecycle::{LifecycleError, LifecycleState, Shutdown, Termination};
use crate::observability::metrics;

/// Drives one daemon run from connect to termination.
pub struct Orchestrator {
    config: Arc<GatewayConfig>,
    database: Arc<dyn Database>,
    gateway: Gateway,
    app: Router,
    shutdown: Shutdown,
    state: watch::Sender<LifecycleState>,
}

impl Orchestrator {
    pub fn new(config: Arc<GatewayConfig>, database: Arc<dyn Database>, routes: Router) -> Self {
        let gateway = Gateway::new(config.clone());
        let app = gateway.assemble(routes);
        let (state, _) = watch::channel(LifecycleState::Uninitialized);
        Self {
            config,
            database,
            gateway,
            app,
            shutdown: Shutdown::new(),
            state,
        }
    }

    /// Observe lifecycle transitions.
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Handle that starts the drain when triggered, same as a signal.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    fn transition(&self, next: LifecycleState) {
        let previous = self.state.send_replace(next);
        tracing::debug!(from = previous.name(), to = next.name(), "Lifecycle transition");
    }

    /// Run until `signal` resolves (or the shutdown handle is triggered),
    /// then drain.
    ///
    /// Returns an error without binding anything if the backend cannot be
    /// reached, or if the listener cannot be bound.
    pub async fn run<S>(self, signal: S) -> Result<Termination, LifecycleError>
    where
        S: Future + Send + 'static,
    {
        self.transition(LifecycleState::ConnectingDependencies);
        if let Err(e) = self.database.connect().await {
            tracing::error!(error = %e, "Persistence backend connection failed, not starting");
            self.transition(LifecycleState::Terminated);
            return Err(LifecycleError::DependencyConnect(e));
        }

        let address = self.config.server.bind_address();
        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(source) => {
                self.disconnect().await;
                self.transition(LifecycleState::Terminated);
                return Err(LifecycleError::Bind { address, source });
            }
        };
        let local_addr = listener.local_addr().map_err(LifecycleError::Serve)?;

        self.transition(LifecycleState::Listening(local_addr));
        tracing::info!(
            address = %local_addr,
            environment = %self.config.environment,
            "Gateway listening"
        );

        self.start_metrics();
        let purge = self.gateway.spawn_rate_limit_purge(self.shutdown.wait());

        let trigger = self.shutdown.clone();
        let signal_task = tokio::spawn(async move {
            signal.await;
            trigger.trigger();
        });

        let mut server = tokio::spawn(
            HttpServer::new(self.app.clone()).run(listener, self.shutdown.wait()),
        );

        tokio::select! {
            result = &mut server => {
                // Server stopped on its own; nothing left to drain.
                signal_task.abort();
                purge.abort();
                self.disconnect().await;
                self.transition(LifecycleState::Terminated);
                return match result {
                    Ok(Ok(())) => Ok(Termination::Clean),
                    Ok(Err(e)) => Err(LifecycleError::Serve(e)),
                    Err(e) => Err(LifecycleError::Serve(std::io::Error::other(e))),
                };
            }
            () = self.shutdown.wait() => {}
        }

        signal_task.abort();
        self.transition(LifecycleState::Draining);
        let deadline = self.config.shutdown.drain_timeout();
        tracing::info!(
            in_flight = self.gateway.in_flight().active_count(),
            deadline_ms = deadline.as_millis() as u64,
            "Draining connections"
        );

        match tokio::time::timeout(deadline, &mut server).await {
            Ok(result) => {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!(error = %e, "Server error during drain"),
                    Err(e) => tracing::error!(error = %e, "Server task failed during drain"),
                }
                self.disconnect().await;
                self.transition(LifecycleState::Terminated);
                tracing::info!(
                    served = self.gateway.in_flight().total_count(),
                    "Shutdown complete"
                );
                Ok(Termination::Clean)
            }
            Err(_) => {
                let abandoned = self.gateway.in_flight().active_count();
                server.abort();
                self.transition(LifecycleState::Terminated);
                tracing::error!(
                    abandoned,
                    deadline_ms = deadline.as_millis() as u64,
                    "Drain deadline exceeded, abandoning in-flight requests"
                );
                Ok(Termination::Forced { abandoned })
            }
        }
    }

    fn start_metrics(&self) {
        let observability = &self.config.observability;
        if !observability.metrics_enabled {
            return;
        }
        match observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::warn!(error = %e, "Metrics exporter not started");
                }
            }
            Err(e) => tracing::warn!(
                metrics_address = %observability.metrics_address,
                error = %e,
                "Invalid metrics address"
            ),
        }
    }

    async fn disconnect(&self) {
        if let Err(e) = self.database.disconnect().await {
            tracing::warn!(error = %e, "Persistence backend disconnect failed");
        }
    }
}
