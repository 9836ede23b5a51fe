// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracing and metrics.
//!
//! - **Tracing**: `tracing` events and `#[instrument]` spans on the spawn and
//!   announce entry points, rendered by a `tracing-subscriber` fmt layer
//! - **Metrics**: per-method gateway call counts and latency, tool calls, and
//!   counters for spawn statuses and announce outcomes
//!
//! ```rust,ignore
//! use sidekick::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::for_cli(verbose))?;
//! ```
//!
//! Metric recording is compiled in with the default `telemetry` feature.

mod init;
pub mod metrics;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use metrics::{CallMetrics, Histogram, Metrics, MetricsSnapshot, OperationMetrics, GLOBAL_METRICS};
