//! Persistence backend collaborator.
//!
//! The gateway only ever needs two things from the backend: establish the
//! shared connection at startup and release it at shutdown. Query handling
//! lives with the route handlers that own the backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::config::DatabaseConfig;

/// Error type for backend connection management.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connecting to {address} timed out after {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    #[error("failed to close connection: {0}")]
    Disconnect(#[source] std::io::Error),
}

/// Connection lifecycle of the persistence backend.
#[async_trait]
pub trait Database: Send + Sync {
    /// Establish the shared connection. Calling it again once connected is a no-op.
    async fn connect(&self) -> Result<(), DatabaseError>;

    /// Release the connection. Callers treat failures as best-effort.
    async fn disconnect(&self) -> Result<(), DatabaseError>;
}

/// Backend used when no persistence address is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDatabase;

#[async_trait]
impl Database for NullDatabase {
    async fn connect(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Holds a single TCP connection to the backend for the process lifetime.
#[derive(Debug)]
pub struct TcpDatabase {
    address: String,
    connect_timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl TcpDatabase {
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
            stream: Mutex::new(None),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.stream.lock().await.is_some()
    }
}

#[async_trait]
impl Database for TcpDatabase {
    async fn connect(&self) -> Result<(), DatabaseError> {
        let mut stream = self.stream.lock().await;
        if stream.is_some() {
            return Ok(());
        }

        let connected = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| DatabaseError::Timeout {
                address: self.address.clone(),
                timeout: self.connect_timeout,
            })?
            .map_err(|source| DatabaseError::Connect {
                address: self.address.clone(),
                source,
            })?;

        tracing::info!(address = %self.address, "Persistence backend connected");
        *stream = Some(connected);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DatabaseError> {
        if let Some(mut stream) = self.stream.lock().await.take() {
            stream.shutdown().await.map_err(DatabaseError::Disconnect)?;
            tracing::info!(address = %self.address, "Persistence backend disconnected");
        }
        Ok(())
    }
}

/// Build the backend described by configuration.
pub fn from_config(config: &DatabaseConfig) -> Arc<dyn Database> {
    match &config.address {
        Some(address) => Arc::new(TcpDatabase::new(
            address.clone(),
            Duration::from_secs(config.connect_timeout_secs),
        )),
        None => Arc::new(NullDatabase),
    }
}
