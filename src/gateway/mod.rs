// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Gateway access.
//!
//! The gateway hosts agent sessions in another process. This module exposes a
//! typed client over a pluggable [`GatewayTransport`]; [`SocketTransport`]
//! speaks newline-delimited JSON frames over a local socket.
//!
//! # Architecture
//!
//! ```text
//! orchestrator ──► GatewayClient ──► dyn GatewayTransport ──► gateway process
//!                                          │
//!                       agent events ◄─────┘ (SocketTransport reader task)
//! ```

mod client;
mod error;
pub mod protocol;
mod socket;
mod transport;

pub use client::{
    latest_assistant_text, GatewayClient, DEFAULT_ABORT_TIMEOUT, DEFAULT_CALL_TIMEOUT,
    HISTORY_LIMIT, WAIT_SLACK,
};
pub use error::{GatewayError, GatewayResult};
pub use protocol::{
    AgentAccepted, AgentEvent, AgentParams, ChatMessage, Lane, LifecyclePhase, LifecycleUpdate,
    ListParams, SendParams, SessionPatch, SessionRow, WaitResponse, WaitStatus,
};
pub use socket::SocketTransport;
pub use transport::{connect, GatewayIo, GatewayStream, GatewayTransport};
