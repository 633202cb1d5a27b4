// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the kirim messaging service.
//!
//! A thin axum surface over [`kirim_service::GatewayService`]: session
//! management behind bearer-token auth, send endpoints behind an API key,
//! and an unauthenticated health probe. All domain behavior lives below the
//! service seam; handlers validate shape, map errors to status codes, and
//! nothing else.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{build_router, start_server, GatewayState};
