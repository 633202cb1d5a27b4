// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types shared across the kirim workspace.
//!
//! String-backed enums use the uppercase wire values the persistence layer
//! stores (`PENDING`, `DEVELOPMENT`, ...), so `Display`/`FromStr` round-trip
//! through the database without a separate mapping layer.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Confirmation identifier returned by the external client for a delivered item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Billing environment an outbound item is metered against.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    Development,
    Production,
}

/// Delivery lifecycle of an outbound item.
///
/// `Pending` is the only retryable state; the other three are terminal and
/// must never be overwritten.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
    Disconnected,
}

impl DeliveryStatus {
    /// Whether this status is terminal (no scheduler tick may change it).
    pub fn is_terminal(self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }
}

/// The two client tiers sharing the outbound-item lifecycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OutboundKind {
    Message,
    Notification,
}

/// A tenant's paired WhatsApp identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub phone: String,
    pub is_ready: bool,
    pub is_deleted: bool,
    pub is_disconnected: bool,
    /// Per-session send ceiling for the current hour.
    pub hourly_limit: i64,
    /// Per-session send ceiling for the current day.
    pub daily_limit: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Session {
    /// A session can carry traffic only when paired and not torn down.
    pub fn is_usable(&self) -> bool {
        self.is_ready && !self.is_deleted && !self.is_disconnected
    }
}

/// Partial update of a session's lifecycle flags.
///
/// `None` fields are left untouched by the storage layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub is_ready: Option<bool>,
    pub is_deleted: Option<bool>,
    pub is_disconnected: Option<bool>,
}

impl SessionPatch {
    /// Patch marking a session ready after successful pairing.
    pub fn ready() -> Self {
        Self {
            is_ready: Some(true),
            ..Self::default()
        }
    }

    /// Patch marking a session disconnected (auth failure or external disconnect).
    pub fn disconnected() -> Self {
        Self {
            is_disconnected: Some(true),
            ..Self::default()
        }
    }

    /// Patch marking a session deleted; deletion implies disconnection.
    pub fn deleted() -> Self {
        Self {
            is_deleted: Some(true),
            is_disconnected: Some(true),
            ..Self::default()
        }
    }
}

/// A message or notification tracked through pending → terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundItem {
    pub id: String,
    pub session_id: String,
    pub kind: OutboundKind,
    pub target_phone: String,
    pub body: String,
    pub media_url: Option<String>,
    pub country_code: String,
    pub environment: Environment,
    pub status: DeliveryStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Optional filters for outbound item listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboundFilter {
    pub kind: Option<OutboundKind>,
    pub status: Option<DeliveryStatus>,
    pub environment: Option<Environment>,
}

/// Lifecycle events emitted by the external client during and after pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A QR code was issued for the user to scan.
    Qr(String),
    /// Credentials were accepted; the client is not yet usable.
    Authenticated,
    /// The client is connected and can send.
    Ready,
    /// Authentication was rejected, with the underlying reason.
    AuthFailure(String),
    /// The connection dropped, with the underlying reason.
    Disconnected(String),
}

/// A fetched media attachment, sent with the item body as caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub mime_type: String,
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_wire_values() {
        for (status, wire) in [
            (DeliveryStatus::Pending, "PENDING"),
            (DeliveryStatus::Delivered, "DELIVERED"),
            (DeliveryStatus::Failed, "FAILED"),
            (DeliveryStatus::Disconnected, "DISCONNECTED"),
        ] {
            assert_eq!(status.to_string(), wire);
            assert_eq!(DeliveryStatus::from_str(wire).unwrap(), status);
        }
    }

    #[test]
    fn environment_round_trips_through_wire_values() {
        assert_eq!(Environment::Development.to_string(), "DEVELOPMENT");
        assert_eq!(Environment::Production.to_string(), "PRODUCTION");
        assert_eq!(
            Environment::from_str("PRODUCTION").unwrap(),
            Environment::Production
        );
    }

    #[test]
    fn only_pending_is_retryable() {
        assert!(!DeliveryStatus::Pending.is_terminal());
        assert!(DeliveryStatus::Delivered.is_terminal());
        assert!(DeliveryStatus::Failed.is_terminal());
        assert!(DeliveryStatus::Disconnected.is_terminal());
    }

    #[test]
    fn deleted_patch_implies_disconnected() {
        let patch = SessionPatch::deleted();
        assert_eq!(patch.is_deleted, Some(true));
        assert_eq!(patch.is_disconnected, Some(true));
        assert_eq!(patch.is_ready, None);
    }

    #[test]
    fn usable_requires_ready_and_live() {
        let mut session = Session {
            id: "s1".into(),
            user_id: "u1".into(),
            phone: "81234".into(),
            is_ready: true,
            is_deleted: false,
            is_disconnected: false,
            hourly_limit: 100,
            daily_limit: 1000,
            created_at: "2026-01-01T00:00:00.000Z".into(),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        };
        assert!(session.is_usable());

        session.is_disconnected = true;
        assert!(!session.is_usable());

        session.is_disconnected = false;
        session.is_deleted = true;
        assert!(!session.is_usable());
    }

    #[test]
    fn kind_serializes_uppercase() {
        let json = serde_json::to_string(&OutboundKind::Notification).unwrap();
        assert_eq!(json, r#""NOTIFICATION""#);
    }
}
