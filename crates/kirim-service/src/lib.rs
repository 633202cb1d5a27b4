// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session and outbound operations exposed to callers of the core.
//!
//! [`GatewayService`] is the seam the HTTP layer (or any other caller)
//! drives: session pairing and teardown, the synchronous and deferred send
//! paths, listings, and usage counts. Input validation lives in
//! [`validation`] so the rules are testable without a running gateway.

pub mod service;
pub mod validation;

pub use service::{AllTimeCounts, CreatedSession, GatewayService, Page, SendInput};
