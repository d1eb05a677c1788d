/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Callout – deferred-callback scheduler
//!
//! "Invoke this function at (or after) this wall-clock second", served by a
//! single dispatch thread that sleeps until the next deadline.
//!
//! ```text
//! lib.rs
//! ├── clock        – UnixTime, Clock trait, system / manual clocks, calendar fields
//! ├── handle       – Callout (owning timer handle), CalloutRef (callback side)
//! ├── scheduler/   – Scheduler, dispatch loop, pending-callout arena, errors
//! ├── publish      – "publish named value" sink used by pollers
//! ├── monitor/     – minute-boundary clock and CPU-load pollers
//! └── config/      – calloutd YAML configuration
//! ```

pub mod clock;
pub mod config;
pub mod handle;
pub mod monitor;
pub mod publish;
pub mod scheduler;

pub use clock::{Clock, ClockZone, ManualClock, SystemClock, UnixTime};
pub use handle::{Callback, Callout, CalloutRef};
pub use scheduler::{Scheduler, SchedulerError};
