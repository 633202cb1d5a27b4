// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `kirim-core::types` for use across
//! trait boundaries. This module re-exports them for convenience within the
//! storage crate.

pub use kirim_core::types::{
    DeliveryStatus, Environment, OutboundFilter, OutboundItem, OutboundKind, Session,
    SessionPatch,
};
