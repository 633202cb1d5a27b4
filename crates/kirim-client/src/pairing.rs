// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pairing state machine.
//!
//! The external client reports its handshake as a stream of events. Instead
//! of scattering per-event callbacks, one blocking [`await_pairing`] call
//! consumes the stream until the first decisive event and returns it as a
//! [`PairingOutcome`]. Every attempt is bounded by a timeout so a hung
//! handshake cannot stall a caller indefinitely.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::trace;

use kirim_core::ClientEvent;

/// Decisive result of one pairing wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingOutcome {
    /// A QR code was issued; the caller should surface it for scanning.
    QrIssued(String),
    /// The client reached its ready state and can send.
    Ready,
    /// Authentication failed or the connection dropped, with the reason.
    Failed(String),
    /// No decisive event arrived within the timeout.
    TimedOut(Duration),
}

/// Wait for the first decisive pairing event.
///
/// `Authenticated` is an intermediate state and is skipped; a closed event
/// stream counts as a failure. The receiver is left usable so the caller can
/// keep waiting after a `QrIssued` outcome (the scan happens out-of-band).
pub async fn await_pairing(
    events: &mut mpsc::Receiver<ClientEvent>,
    timeout: Duration,
) -> PairingOutcome {
    let wait = async {
        loop {
            match events.recv().await {
                Some(ClientEvent::Qr(qr)) => return PairingOutcome::QrIssued(qr),
                Some(ClientEvent::Ready) => return PairingOutcome::Ready,
                Some(ClientEvent::Authenticated) => {
                    trace!("client authenticated, waiting for ready");
                }
                Some(ClientEvent::AuthFailure(reason)) => {
                    return PairingOutcome::Failed(format!("auth_failure: {reason}"));
                }
                Some(ClientEvent::Disconnected(reason)) => {
                    return PairingOutcome::Failed(format!("disconnected: {reason}"));
                }
                None => return PairingOutcome::Failed("event stream closed".to_string()),
            }
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(outcome) => outcome,
        Err(_) => PairingOutcome::TimedOut(timeout),
    }
}
