/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Periodic CPU-load sampler.
//!
//! A [`CounterSource`] supplies cumulative idle / total tick counters (the
//! shape of `/proc/stat`); the monitor turns consecutive samples into a load
//! ratio and publishes:
//!
//! | Path | Value |
//! |---|---|
//! | `cpuinfo.available` | `1` after every successful sample |
//! | `cpuinfo.load` | aggregate load in `[0, 1]` |
//! | `cpuinfo.cpus.<n>.name` | `"CPU<n>"`, published once |
//! | `cpuinfo.cpus.<n>.load` | per-CPU load in `[0, 1]` |
//!
//! The first sample only primes the counters.
//!
//! # Drift
//! Each tick re-arms at `previous deadline + interval`, not `now + interval`,
//! so a late firing does not push every later one back.  If the dispatcher is
//! a whole interval or more behind, the missed ticks are skipped rather than
//! fired in a burst.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::clock::UnixTime;
use crate::handle::{Callout, CalloutRef};
use crate::publish::{Publish, Value};
use crate::scheduler::Scheduler;

// ── Source ────────────────────────────────────────────────────────────────────

/// Cumulative tick counters for one CPU (or the aggregate line).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTicks {
    /// CPU index, or `None` for the all-CPU aggregate.
    pub cpu: Option<u32>,
    pub idle: u64,
    pub total: u64,
}

/// Supplier of [`CpuTicks`] samples.
pub trait CounterSource: Send {
    fn sample(&mut self) -> anyhow::Result<Vec<CpuTicks>>;
}

/// Load over the interval between two samples: `1 - Δidle / Δtotal`,
/// clamped to `[0, 1]`.
///
/// `None` when no ticks elapsed.  Counters that went backwards count as zero
/// elapsed ticks.
pub fn cpu_load(prev: &CpuTicks, cur: &CpuTicks) -> Option<f64> {
    let idle = cur.idle.saturating_sub(prev.idle);
    let total = cur.total.saturating_sub(prev.total);
    if total == 0 {
        return None;
    }
    Some((1.0 - idle as f64 / total as f64).clamp(0.0, 1.0))
}

// ── Sampler ───────────────────────────────────────────────────────────────────

struct Sampler {
    source: Box<dyn CounterSource>,
    sink: Arc<dyn Publish>,
    last: BTreeMap<Option<u32>, CpuTicks>,
    named: BTreeSet<u32>,
    interval_secs: i64,
}

impl Sampler {
    fn run(&mut self) {
        let samples = match self.source.sample() {
            Ok(samples) => samples,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "CPU counter sample failed");
                return;
            }
        };

        for cur in samples {
            let Some(prev) = self.last.insert(cur.cpu, cur) else {
                continue;
            };
            let Some(load) = cpu_load(&prev, &cur) else {
                continue;
            };

            match cur.cpu {
                None => self.sink.publish(&["cpuinfo", "load"], Value::Float(load)),
                Some(n) => {
                    let id = n.to_string();
                    if self.named.insert(n) {
                        self.sink.publish(
                            &["cpuinfo", "cpus", id.as_str(), "name"],
                            Value::String(format!("CPU{n}")),
                        );
                    }
                    self.sink
                        .publish(&["cpuinfo", "cpus", id.as_str(), "load"], Value::Float(load));
                }
            }
        }

        self.sink.publish(&["cpuinfo", "available"], Value::Int(1));
    }
}

// ── LoadMonitor ───────────────────────────────────────────────────────────────

/// Running load sampler.  Stops when dropped.
pub struct LoadMonitor {
    callout: Callout,
}

impl LoadMonitor {
    /// Prime the counters now and sample every `interval_secs` (at least 1).
    pub fn start(
        scheduler: &Scheduler,
        sink: Arc<dyn Publish>,
        source: Box<dyn CounterSource>,
        interval_secs: i64,
    ) -> Self {
        let interval_secs = interval_secs.max(1);
        let sampler = Arc::new(Mutex::new(Sampler {
            source,
            sink,
            last: BTreeMap::new(),
            named: BTreeSet::new(),
            interval_secs,
        }));

        sampler.lock().run();

        let callout = scheduler.callout();
        let first = scheduler.clock().add_seconds(scheduler.now(), interval_secs);
        callout.arm_absolute(first, move |fired| tick(sampler, fired, first));
        Self { callout }
    }

    /// When the next sample is scheduled.
    pub fn next_sample(&self) -> Option<UnixTime> {
        self.callout.deadline()
    }
}

fn tick(sampler: Arc<Mutex<Sampler>>, fired: &CalloutRef, due: UnixTime) {
    let interval = sampler.lock().interval_secs;
    let now = fired.now();

    let mut next = due.add_seconds(interval);
    if next <= now {
        trace!(due = %due, now = %now, "load monitor behind; skipping missed ticks");
        next = now.add_seconds(interval);
    }

    // Re-arm before sampling so a slow source cannot delay the schedule.
    let again = Arc::clone(&sampler);
    fired.arm_absolute(next, move |f| tick(again, f, next));

    sampler.lock().run();
}

// ── Tests ─────────────────────────────────────────────────────────────────────
