/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Minute-boundary clock publisher.
//!
//! Publishes, under the configured root (default `clock`):
//!
//! | Path | Value |
//! |---|---|
//! | `<root>.unixtime` | seconds since the epoch |
//! | `<root>.hour` | 0–23 |
//! | `<root>.minute` | 0–59 |
//! | `<root>.dayminute` | `hour * 60 + minute` |
//!
//! once at start and then at the top of every minute.

use std::sync::Arc;

use tracing::debug;

use crate::clock::{calendar_at, ClockZone, UnixTime};
use crate::config::ClockPublisherConfig;
use crate::handle::{Callout, CalloutRef};
use crate::publish::{Publish, Value};
use crate::scheduler::Scheduler;

struct Inner {
    sink: Arc<dyn Publish>,
    root: String,
    zone: ClockZone,
}

/// Running clock publisher.  Stops when dropped.
pub struct GlobalClock {
    callout: Callout,
}

impl GlobalClock {
    /// Publish the current time now and keep it updated every minute.
    pub fn start(
        scheduler: &Scheduler,
        sink: Arc<dyn Publish>,
        config: &ClockPublisherConfig,
    ) -> Self {
        let inner = Arc::new(Inner {
            sink,
            root: config.root.clone(),
            zone: config.zone,
        });
        let callout = scheduler.callout();
        update(inner, &callout.handle());
        Self { callout }
    }

    /// When the next update is scheduled.
    pub fn next_update(&self) -> Option<UnixTime> {
        self.callout.deadline()
    }
}

fn update(inner: Arc<Inner>, callout: &CalloutRef) {
    let now = callout.now();
    let cal = calendar_at(now, inner.zone);
    let root = inner.root.as_str();

    inner.sink.publish(&[root, "unixtime"], Value::Int(now.as_secs()));
    inner.sink.publish(&[root, "hour"], Value::Int(cal.hour.into()));
    inner.sink.publish(&[root, "minute"], Value::Int(cal.minute.into()));
    inner.sink.publish(&[root, "dayminute"], Value::Int(cal.day_minute.into()));

    debug!(hour = cal.hour, minute = cal.minute, next = %cal.next_minute, "clock updated");

    let next = cal.next_minute;
    callout.arm_absolute(next, move |fired| update(inner, fired));
}
