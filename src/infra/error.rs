use std::net::SocketAddr;

use thiserror::Error;

use crate::application::repos::RepoError;

/// Failures raised while bootstrapping or running the binary itself.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to connect to the database")]
    Connect(#[source] sqlx::Error),
    #[error("failed to apply migrations")]
    Migrate(#[source] sqlx::migrate::MigrateError),
    #[error("repository error")]
    Repository(#[from] RepoError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    /// True when the database could not be reached or prepared.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            InfraError::Connect(_) | InfraError::Migrate(_) | InfraError::Repository(_)
        )
    }
}
