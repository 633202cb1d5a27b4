// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between kirim components.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility: the
//! connection manager, dispatcher, scheduler, and service layer hold
//! `Arc<dyn ...>` references so tests can substitute in-memory fakes.

pub mod client;
pub mod storage;

pub use client::{ClientFactory, PendingClient, WhatsappClient};
pub use storage::Storage;
