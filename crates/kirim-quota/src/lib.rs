// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quota classification and send pacing.
//!
//! Two concerns live here:
//!
//! - [`EnvironmentClassifier`] decides, fresh at send time, whether an item
//!   counts against the free development tier or the metered production
//!   tier, from the tenant's rolling calendar-month volume.
//! - [`SendLimiter`] enforces each session's hourly/daily send ceilings
//!   with windowed counters, giving the synchronous path a 429-style
//!   rejection and the scheduler a principled per-tick bound.

pub mod classifier;
pub mod limiter;

pub use classifier::{month_window, EnvironmentClassifier};
pub use limiter::SendLimiter;
