// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Gateway error types.

use std::io;
use thiserror::Error;

/// Errors returned by gateway calls.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway answered with an error.
    #[error("Gateway {method} failed: {message}")]
    Rpc {
        method: String,
        code: Option<String>,
        message: String,
    },

    /// No answer within the call budget.
    #[error("Gateway {method} timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    /// Failed to reach the gateway endpoint.
    #[error("Failed to connect to gateway: {0}")]
    ConnectFailed(String),

    /// Reading or writing the connection failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The connection closed before a response arrived.
    #[error("Gateway connection closed")]
    Closed,

    /// The gateway answered with a payload of the wrong shape.
    #[error("Invalid gateway response for {method}: {message}")]
    InvalidResponse { method: String, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GatewayError {
    /// Create a transport error from an IO error with context.
    pub fn from_io_error(context: &str, err: io::Error) -> Self {
        GatewayError::Transport(format!("{}: {}", context, err))
    }

    pub fn rpc(method: impl Into<String>, code: Option<String>, message: impl Into<String>) -> Self {
        GatewayError::Rpc {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout { .. })
    }

    /// Structured error code, when the gateway sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            GatewayError::Rpc { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Human-readable message without the method prefix.
    pub fn message(&self) -> String {
        match self {
            GatewayError::Rpc { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Serialization(err.to_string())
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::rpc("sessions.patch", None, "invalid model: gpt-9");
        assert_eq!(err.to_string(), "Gateway sessions.patch failed: invalid model: gpt-9");
        assert_eq!(err.message(), "invalid model: gpt-9");
    }

    #[test]
    fn test_timeout_detection() {
        let err = GatewayError::Timeout {
            method: "agent.wait".to_string(),
            timeout_ms: 3000,
        };
        assert!(err.is_timeout());
        assert!(!GatewayError::Closed.is_timeout());
    }

    #[test]
    fn test_code() {
        let err = GatewayError::rpc("agent", Some("UNAVAILABLE".to_string()), "busy");
        assert_eq!(err.code(), Some("UNAVAILABLE"));
        assert_eq!(GatewayError::Closed.code(), None);
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let err = GatewayError::from_io_error("writing request", io_err);
        assert!(err.to_string().contains("writing request"));
        assert!(err.to_string().contains("pipe closed"));
    }
}
