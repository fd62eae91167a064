use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::infra::error::InfraError;

/// Full error chain attached to a response so the logging middleware can
/// record what the client only sees summarised.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn detail(&self) -> String {
        self.messages.join(": ")
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code reported by the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Infra(InfraError::Configuration { .. }) => 78,
            AppError::Infra(err) if err.is_unavailable() => 69,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::RepoError;

    #[test]
    fn report_collects_source_chain() {
        let outer = InfraError::Bind {
            addr: "127.0.0.1:8080".parse().unwrap(),
            source: std::io::Error::other("address in use"),
        };
        let report = ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &outer);

        assert_eq!(report.messages.len(), 2);
        assert_eq!(report.detail(), "failed to bind 127.0.0.1:8080: address in use");
    }

    #[test]
    fn configuration_errors_use_config_exit_code() {
        assert_eq!(AppError::from(InfraError::configuration("x")).exit_code(), 78);
        assert_eq!(AppError::unexpected("boom").exit_code(), 1);
        assert_eq!(
            AppError::from(InfraError::Repository(RepoError::Timeout)).exit_code(),
            69
        );
    }
}
