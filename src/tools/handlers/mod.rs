// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool handler implementations.

mod sessions_spawn;

pub use sessions_spawn::{SessionsSpawnHandler, SESSIONS_SPAWN};
