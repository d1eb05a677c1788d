/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the callout scheduler.
//!
//! The scheduler has almost no failure surface:
//!
//! * arming and disarming cannot fail (a stale [`CalloutRef`] is a no-op,
//!   allocation failure aborts the process like any other `Vec` growth);
//! * callback panics are not caught; they unwind the dispatch thread with
//!   the queue lock released.
//!
//! What remains is starting and stopping the dispatch thread itself.
//!
//! [`CalloutRef`]: crate::CalloutRef

use thiserror::Error;

/// Error returned by [`Scheduler::start`](super::Scheduler::start) and
/// [`Scheduler::shutdown`](super::Scheduler::shutdown).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The OS refused to create the dispatch thread.
    #[error("failed to spawn dispatch thread '{name}'")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A callback panicked and took the dispatch thread down with it.
    ///
    /// Every callout armed at that point stayed pending and never fired.
    #[error("dispatch thread '{name}' panicked: {message}")]
    DispatcherPanicked { name: String, message: String },
}

/// Best-effort text of a panic payload, for [`SchedulerError::DispatcherPanicked`].
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("<non-string panic payload>")
    }
}
