/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Caller-side timer handles.
//!
//! # Ownership model
//! A [`Callout`] is created by [`Scheduler::callout`] and owns one slot in
//! the scheduler.  It cannot be cloned, and dropping it disarms it and frees
//! the slot, so an armed callout can never outlive the thing that owns it.
//!
//! Callbacks receive a [`CalloutRef`]: a cheap, cloneable, non-owning name for
//! the callout that just fired.  It is how a callback re-arms itself.  Once
//! the owning `Callout` is gone every `CalloutRef` to it goes stale and all
//! operations on it become no-ops.
//!
//! ```text
//! Callout::arm_*  ──►  armed  ──(deadline ≤ now)──►  firing (unarmed, lock released)
//!      ▲                 │                               │
//!      │              disarm                   callback(&CalloutRef)
//!      │                 ▼                               │
//!      └──────────────  idle  ◄──────(no re-arm)─────────┘
//! ```
//!
//! [`Scheduler::callout`]: crate::Scheduler::callout

use std::fmt;
use std::sync::Arc;

use crate::clock::UnixTime;
use crate::scheduler::pending::CalloutId;
use crate::scheduler::Shared;

/// Boxed callback stored for an armed callout.
///
/// Captured state takes the place of an opaque context pointer.
pub type Callback = Box<dyn FnOnce(&CalloutRef) + Send + 'static>;

// ── Callout ───────────────────────────────────────────────────────────────────

/// A reusable timer owned by its caller.
///
/// All mutation goes through the scheduler's lock; the handle itself carries
/// no state beyond its slot id.
pub struct Callout {
    id: CalloutId,
    shared: Arc<Shared>,
}

impl Callout {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        let id = shared.allocate();
        Self { id, shared }
    }

    /// Fire `callback` once at `when`.
    ///
    /// An earlier registration of this callout is replaced, never duplicated.
    /// Safe to call from any thread, including from a firing callback.
    pub fn arm_absolute<F>(&self, when: UnixTime, callback: F)
    where
        F: FnOnce(&CalloutRef) + Send + 'static,
    {
        self.shared.arm(self.id, when, Box::new(callback));
    }

    /// Fire `callback` once, `delta_secs` seconds from now.
    pub fn arm_relative<F>(&self, delta_secs: i64, callback: F)
    where
        F: FnOnce(&CalloutRef) + Send + 'static,
    {
        self.arm_absolute(self.shared.after(delta_secs), callback);
    }

    /// Cancel a pending firing.
    ///
    /// Returns `true` if the callout was armed.  A callback already running
    /// is not affected.
    pub fn disarm(&self) -> bool {
        self.shared.disarm(self.id)
    }

    pub fn is_armed(&self) -> bool {
        self.shared.is_armed(self.id)
    }

    /// Deadline of the pending firing, if armed.
    pub fn deadline(&self) -> Option<UnixTime> {
        self.shared.deadline(self.id)
    }

    /// Non-owning handle to this callout.
    pub fn handle(&self) -> CalloutRef {
        CalloutRef {
            id: self.id,
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for Callout {
    fn drop(&mut self) {
        self.shared.release(self.id);
    }
}

impl fmt::Debug for Callout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callout")
            .field("id", &self.id)
            .field("deadline", &self.deadline())
            .finish()
    }
}

// ── CalloutRef ────────────────────────────────────────────────────────────────

/// Non-owning handle to a [`Callout`], as passed to its callback.
#[derive(Clone)]
pub struct CalloutRef {
    id: CalloutId,
    shared: Arc<Shared>,
}

impl CalloutRef {
    pub(crate) fn new(id: CalloutId, shared: Arc<Shared>) -> Self {
        Self { id, shared }
    }

    /// Same as [`Callout::arm_absolute`].
    ///
    /// Returns `false` (and drops `callback`) if the owning `Callout` is gone.
    pub fn arm_absolute<F>(&self, when: UnixTime, callback: F) -> bool
    where
        F: FnOnce(&CalloutRef) + Send + 'static,
    {
        self.shared.arm(self.id, when, Box::new(callback))
    }

    /// Same as [`Callout::arm_relative`].
    pub fn arm_relative<F>(&self, delta_secs: i64, callback: F) -> bool
    where
        F: FnOnce(&CalloutRef) + Send + 'static,
    {
        self.arm_absolute(self.shared.after(delta_secs), callback)
    }

    pub fn disarm(&self) -> bool {
        self.shared.disarm(self.id)
    }

    pub fn is_armed(&self) -> bool {
        self.shared.is_armed(self.id)
    }

    pub fn deadline(&self) -> Option<UnixTime> {
        self.shared.deadline(self.id)
    }

    /// Current time on the scheduler's clock.
    pub fn now(&self) -> UnixTime {
        self.shared.now()
    }
}

impl fmt::Debug for CalloutRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalloutRef").field("id", &self.id).finish()
    }
}
