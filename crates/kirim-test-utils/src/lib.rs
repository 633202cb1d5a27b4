// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the kirim workspace.
//!
//! Provides deterministic in-memory fakes for the two external seams:
//! [`MockClientFactory`]/[`MockWhatsappClient`] for the messaging client and
//! [`MemoryStorage`] for the persistence layer.

pub mod memory_storage;
pub mod mock_client;

pub use memory_storage::MemoryStorage;
pub use mock_client::{MockClientFactory, MockWhatsappClient, SentRecord};
