/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Time source for the scheduler.
//!
//! Deadlines are whole seconds since the Unix epoch ([`UnixTime`]).  The
//! scheduler never reads the system clock directly; it goes through a
//! [`Clock`] so tests can inject a [`ManualClock`] and step time explicitly.
//!
//! ```text
//! Clock::now()    ──►  "is the earliest deadline due?"
//! Clock::until()  ──►  how long the dispatcher may sleep
//! ```

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeZone, Timelike, Utc};
use serde::Deserialize;

// ── UnixTime ──────────────────────────────────────────────────────────────────

/// Absolute point in time with one-second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UnixTime(i64);

impl UnixTime {
    pub const fn from_secs(secs: i64) -> Self {
        UnixTime(secs)
    }

    pub const fn as_secs(self) -> i64 {
        self.0
    }

    /// `self + secs`, saturating at the ends of the `i64` range.
    pub fn add_seconds(self, secs: i64) -> Self {
        UnixTime(self.0.saturating_add(secs))
    }

    /// Whole seconds from `earlier` to `self`, or `0` if `earlier` is later.
    pub fn seconds_since(self, earlier: UnixTime) -> u64 {
        self.0.saturating_sub(earlier.0).max(0) as u64
    }
}

impl fmt::Display for UnixTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

// ── Clock trait ───────────────────────────────────────────────────────────────

/// Source of "current time" for the scheduler and its pollers.
pub trait Clock: Send + Sync + 'static {
    /// Current time.
    fn now(&self) -> UnixTime;

    /// `t + secs`.
    fn add_seconds(&self, t: UnixTime, secs: i64) -> UnixTime {
        t.add_seconds(secs)
    }

    /// Real time the dispatcher should sleep before `deadline` becomes due.
    ///
    /// Never negative.  A zero result makes the dispatcher re-check at once.
    fn until(&self, deadline: UnixTime) -> Duration {
        Duration::from_secs(deadline.seconds_since(self.now()))
    }
}

// ── SystemClock ───────────────────────────────────────────────────────────────

/// Wall clock backed by `chrono::Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UnixTime {
        UnixTime(Utc::now().timestamp())
    }

    /// Millisecond-precise wait: a deadline `T` is due at `T.000`, not at
    /// `now + (T - floor(now))` seconds.
    fn until(&self, deadline: UnixTime) -> Duration {
        let now_ms = Utc::now().timestamp_millis();
        let due_ms = deadline.0.saturating_mul(1_000);
        Duration::from_millis(due_ms.saturating_sub(now_ms).max(0) as u64)
    }
}

// ── ManualClock ───────────────────────────────────────────────────────────────

/// Hand-driven clock for tests.
///
/// Clones share the same underlying time.  Moving the clock does not wake a
/// sleeping dispatcher by itself; follow it with
/// [`Scheduler::poke`](crate::Scheduler::poke).
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    secs: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: UnixTime) -> Self {
        Self {
            secs: Arc::new(AtomicI64::new(start.0)),
        }
    }

    pub fn set(&self, t: UnixTime) {
        self.secs.store(t.0, Ordering::SeqCst);
    }

    /// Move the clock by `secs` (negative values move it backwards).
    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> UnixTime {
        UnixTime(self.secs.load(Ordering::SeqCst))
    }
}

// ── Calendar helper ───────────────────────────────────────────────────────────

/// Time zone used to break a [`UnixTime`] into calendar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockZone {
    #[default]
    Local,
    Utc,
}

/// Broken-down view of one instant, plus the start of the following minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarSnapshot {
    pub hour: u32,
    pub minute: u32,
    /// `hour * 60 + minute`.
    pub day_minute: u32,
    /// Absolute time of the next `hh:mm:00`.
    pub next_minute: UnixTime,
}

/// Break `t` into calendar fields in `zone` and find the top of the next
/// minute (seconds zeroed, minute incremented, then normalised back to an
/// absolute time).
pub fn calendar_at(t: UnixTime, zone: ClockZone) -> CalendarSnapshot {
    let snapshot = match zone {
        ClockZone::Local => calendar_in(&Local, t),
        ClockZone::Utc => calendar_in(&Utc, t),
    };

    // Out-of-range timestamps: fall back to plain UTC minute arithmetic.
    snapshot.unwrap_or_else(|| {
        let secs_of_day = t.0.rem_euclid(86_400);
        let hour = (secs_of_day / 3_600) as u32;
        let minute = ((secs_of_day / 60) % 60) as u32;
        CalendarSnapshot {
            hour,
            minute,
            day_minute: hour * 60 + minute,
            next_minute: UnixTime(t.0.div_euclid(60).saturating_add(1).saturating_mul(60)),
        }
    })
}

fn calendar_in<Tz: TimeZone>(tz: &Tz, t: UnixTime) -> Option<CalendarSnapshot> {
    let dt = tz.timestamp_opt(t.0, 0).single()?;
    let hour = dt.hour();
    let minute = dt.minute();
    let next = dt.with_second(0)?.checked_add_signed(chrono::Duration::minutes(1))?;

    Some(CalendarSnapshot {
        hour,
        minute,
        day_minute: hour * 60 + minute,
        next_minute: UnixTime(next.timestamp()),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── UnixTime ──────────────────────────────────────────────────────────────

    #[test]
    fn add_seconds_saturates() {
        assert_eq!(UnixTime(i64::MAX).add_seconds(10), UnixTime(i64::MAX));
        assert_eq!(UnixTime(i64::MIN).add_seconds(-10), UnixTime(i64::MIN));
        assert_eq!(UnixTime(100).add_seconds(-40), UnixTime(60));
    }

    #[test]
    fn seconds_since_never_negative() {
        assert_eq!(UnixTime(10).seconds_since(UnixTime(4)), 6);
        assert_eq!(UnixTime(4).seconds_since(UnixTime(10)), 0);
    }

    // ── ManualClock ───────────────────────────────────────────────────────────

    #[test]
    fn manual_clock_clones_share_time() {
        let a = ManualClock::new(UnixTime(1_000));
        let b = a.clone();
        a.advance(5);
        assert_eq!(b.now(), UnixTime(1_005));
        b.set(UnixTime(7));
        assert_eq!(a.now(), UnixTime(7));
    }

    #[test]
    fn manual_clock_until_is_clamped_to_zero() {
        let c = ManualClock::new(UnixTime(50));
        assert_eq!(c.until(UnixTime(53)), Duration::from_secs(3));
        assert_eq!(c.until(UnixTime(50)), Duration::ZERO);
        assert_eq!(c.until(UnixTime(10)), Duration::ZERO);
    }

    #[test]
    fn system_clock_until_past_deadline_is_zero() {
        let c = SystemClock;
        assert_eq!(c.until(UnixTime(0)), Duration::ZERO);
        // a deadline two seconds out never asks for more than two seconds
        let d = c.now().add_seconds(2);
        assert!(c.until(d) <= Duration::from_secs(2));
    }

    // ── calendar_at ───────────────────────────────────────────────────────────

    #[test]
    fn calendar_fields_in_utc() {
        // 1970-01-02 13:45:17 UTC
        let t = UnixTime(86_400 + 13 * 3_600 + 45 * 60 + 17);
        let cal = calendar_at(t, ClockZone::Utc);
        assert_eq!(cal.hour, 13);
        assert_eq!(cal.minute, 45);
        assert_eq!(cal.day_minute, 13 * 60 + 45);
        assert_eq!(cal.next_minute, UnixTime(86_400 + 13 * 3_600 + 46 * 60));
    }

    #[test]
    fn next_minute_rolls_over_the_day() {
        // 23:59:30 UTC → next boundary is midnight
        let t = UnixTime(23 * 3_600 + 59 * 60 + 30);
        let cal = calendar_at(t, ClockZone::Utc);
        assert_eq!(cal.hour, 23);
        assert_eq!(cal.minute, 59);
        assert_eq!(cal.next_minute, UnixTime(86_400));
    }

    #[test]
    fn exact_minute_boundary_moves_to_following_minute() {
        let cal = calendar_at(UnixTime(600), ClockZone::Utc);
        assert_eq!(cal.next_minute, UnixTime(660));
    }

    #[test]
    fn local_next_minute_is_strictly_later_and_within_a_minute() {
        let t = UnixTime(1_700_000_123);
        let cal = calendar_at(t, ClockZone::Local);
        assert!(cal.next_minute > t);
        assert!(cal.next_minute.seconds_since(t) <= 60);
        assert!(cal.hour < 24 && cal.minute < 60);
    }

    #[test]
    fn zone_deserializes_lowercase() {
        let z: ClockZone = serde_yaml::from_str("utc").unwrap();
        assert_eq!(z, ClockZone::Utc);
        let z: ClockZone = serde_yaml::from_str("local").unwrap();
        assert_eq!(z, ClockZone::Local);
    }
}
