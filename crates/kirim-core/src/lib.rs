// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the kirim WhatsApp gateway.
//!
//! This crate provides the error type, domain model types, and the trait
//! seams between components: the persistence contract ([`Storage`]), the
//! live external client handle ([`WhatsappClient`]), and the factory that
//! performs the pairing handshake ([`ClientFactory`]). All other workspace
//! crates depend on the definitions here.

pub mod error;
pub mod traits;
pub mod types;

pub use error::KirimError;
pub use traits::{ClientFactory, PendingClient, Storage, WhatsappClient};
pub use types::{
    ClientEvent, DeliveryStatus, Environment, MediaPayload, MessageId, OutboundFilter,
    OutboundItem, OutboundKind, Session, SessionPatch,
};
