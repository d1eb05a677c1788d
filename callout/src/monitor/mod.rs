/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Periodic pollers built on the scheduler.
//!
//! Each poller owns one [`Callout`](crate::Callout) that re-arms itself from
//! its own callback and publishes what it reads through a
//! [`Publish`](crate::publish::Publish) sink.  Dropping the poller drops the
//! callout, which stops it.

pub mod clock;
pub mod load;

pub use clock::GlobalClock;
pub use load::{CounterSource, CpuTicks, LoadMonitor};
