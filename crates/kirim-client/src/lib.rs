// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client connection manager and outbound dispatcher.
//!
//! This crate owns everything between a session row and the external
//! messaging system:
//!
//! - [`ClientRegistry`] -- the process-local map of live client handles,
//!   exposed only through accessor operations.
//! - [`ClientManager`] -- the pairing state machine: QR issuance, ready
//!   transitions, lazy reconnect with stored credentials, and teardown.
//!   Durable session flags are always written before in-memory eviction.
//! - [`Dispatcher`] -- delivers exactly one item through a session's live
//!   client, reconnecting transparently, returning `None` on any failure so
//!   the scheduler loop never crashes on a single bad send.
//! - [`BridgeFactory`] -- the production [`kirim_core::ClientFactory`],
//!   speaking REST to a local WhatsApp-Web bridge.

pub mod bridge;
pub mod dispatch;
pub mod manager;
pub mod pairing;
pub mod registry;

pub use bridge::{BridgeClient, BridgeFactory};
pub use dispatch::{DispatchRequest, Dispatcher};
pub use manager::{ClientManager, InitOutcome};
pub use pairing::{await_pairing, PairingOutcome};
pub use registry::ClientRegistry;
