// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transport seam between the gateway client and the wire.

use std::io;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};

use super::error::GatewayError;

/// Raw request/response access to the gateway.
///
/// Implementations must fail with [`GatewayError::Timeout`] when no answer
/// arrives within `timeout`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn call(&self, method: &str, params: Value, timeout: Duration) -> Result<Value, GatewayError>;
}

pub trait GatewayIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> GatewayIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type GatewayStream = Box<dyn GatewayIo>;

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

/// Open a stream to the gateway endpoint.
pub async fn connect(path: &Path) -> io::Result<GatewayStream> {
    #[cfg(unix)]
    {
        let stream = UnixStream::connect(path).await?;
        Ok(Box::new(stream))
    }

    #[cfg(windows)]
    {
        let name = pipe_name_from_path(path);
        let client = ClientOptions::new().open(&name)?;
        Ok(Box::new(client))
    }
}

#[cfg(windows)]
fn pipe_name_from_path(path: &Path) -> String {
    let name = path.to_string_lossy().to_string();
    if name.starts_with(r"\\.\pipe\") {
        name
    } else {
        format!(r"\\.\pipe\{}", name)
    }
}
