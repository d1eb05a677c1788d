/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Narrow "publish a named value" capability used by the pollers.
//!
//! The scheduler never sees this; it is what periodic callbacks do with a
//! reading once they have it.  A path is a sequence of segment names, e.g.
//! `["cpuinfo", "cpus", "0", "load"]`.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::Mutex;
use tracing::info;

/// A published reading.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:.3}"),
            Value::String(v) => write!(f, "{v:?}"),
        }
    }
}

/// Destination for published values.
pub trait Publish: Send + Sync {
    fn publish(&self, path: &[&str], value: Value);
}

// ── MemorySink ────────────────────────────────────────────────────────────────

/// Keeps the last value per path, keyed by the dot-joined path.
#[derive(Debug, Default)]
pub struct MemorySink {
    values: Mutex<BTreeMap<String, Value>>,
    writes: Mutex<u64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value published at `path` (dot-separated, e.g. `"clock.hour"`).
    pub fn get(&self, path: &str) -> Option<Value> {
        self.values.lock().get(path).cloned()
    }

    /// Copy of every path and its last value, sorted by path.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values.lock().clone()
    }

    /// Total number of `publish` calls so far.
    pub fn writes(&self) -> u64 {
        *self.writes.lock()
    }
}

impl Publish for MemorySink {
    fn publish(&self, path: &[&str], value: Value) {
        self.values.lock().insert(path.join("."), value);
        *self.writes.lock() += 1;
    }
}

// ── TracingSink ───────────────────────────────────────────────────────────────

/// Emits every publication as an `info` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl Publish for TracingSink {
    fn publish(&self, path: &[&str], value: Value) {
        info!(path = %path.join("."), %value, "publish");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_keeps_last_value_per_path() {
        let sink = MemorySink::new();
        sink.publish(&["clock", "hour"], Value::Int(3));
        sink.publish(&["clock", "hour"], Value::Int(4));
        sink.publish(&["cpuinfo", "cpus", "0", "name"], Value::String("CPU0".into()));

        assert_eq!(sink.get("clock.hour"), Some(Value::Int(4)));
        assert_eq!(
            sink.get("cpuinfo.cpus.0.name"),
            Some(Value::String("CPU0".into()))
        );
        assert_eq!(sink.get("clock.minute"), None);
        assert_eq!(sink.writes(), 3);
        assert_eq!(sink.snapshot().len(), 2);
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::Int(-2).to_string(), "-2");
        assert_eq!(Value::Float(0.25).to_string(), "0.250");
        assert_eq!(Value::String("x".into()).to_string(), "\"x\"");
    }
}
