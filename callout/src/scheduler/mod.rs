//! The callout scheduler.
//!
//! [`Scheduler`] owns a mutex-protected [`Pending`] set of armed callouts, a
//! condition variable, and exactly one dispatch thread.  The dispatch thread
//! fires due callouts in deadline order and otherwise sleeps until the next
//! deadline or until an arm / disarm / [`poke`](Scheduler::poke) wakes it.
//!
//! # Monitor invariants
//!
//! | Rule | Where |
//! |---|---|
//! | All access to `Pending` holds `State`'s mutex | every `Shared` method, the dispatch loop |
//! | A callout is unarmed before its callback starts | `Pending::pop_due` |
//! | The lock is released while user code runs | `MutexGuard::unlocked` in `dispatch` |
//! | Sleep decision and wait are atomic w.r.t. arm | `Condvar::wait_for` releases the lock it was called with |
//! | Displaced callbacks are dropped unlocked | `Shared::arm` / `disarm` / `release` |
//!
//! The last rule matters because a callback may own other [`Callout`]s, and
//! dropping one of those takes the lock again.
//!
//! # Example
//! ```rust,no_run
//! use callout::Scheduler;
//!
//! let scheduler = Scheduler::with_system_clock()?;
//! let timer = scheduler.callout();
//! timer.arm_relative(1, |fired| {
//!     // periodic: re-arm the same callout from inside its own callback
//!     fired.arm_relative(1, |_| {});
//! });
//! # Ok::<(), callout::SchedulerError>(())
//! ```

pub mod error;
pub(crate) mod pending;

pub use error::SchedulerError;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, info, trace};

use crate::clock::{Clock, SystemClock, UnixTime};
use crate::config::DispatcherConfig;
use crate::handle::{Callback, Callout, CalloutRef};

use error::panic_message;
use pending::{CalloutId, Pending};

// ── Shared monitor state ──────────────────────────────────────────────────────

struct State {
    pending: Pending,
    shutdown: bool,
}

/// State shared between the [`Scheduler`], its dispatch thread and every
/// [`Callout`] / [`CalloutRef`].
pub(crate) struct Shared {
    state: Mutex<State>,
    wakeup: Condvar,
    clock: Arc<dyn Clock>,
}

impl Shared {
    fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State {
                pending: Pending::new(),
                shutdown: false,
            }),
            wakeup: Condvar::new(),
            clock,
        }
    }

    pub(crate) fn now(&self) -> UnixTime {
        self.clock.now()
    }

    /// `now + delta_secs` on this scheduler's clock.
    pub(crate) fn after(&self, delta_secs: i64) -> UnixTime {
        self.clock.add_seconds(self.clock.now(), delta_secs)
    }

    pub(crate) fn allocate(&self) -> CalloutId {
        self.state.lock().pending.allocate()
    }

    pub(crate) fn release(&self, id: CalloutId) {
        let displaced = self.state.lock().pending.release(id);
        drop(displaced);
    }

    /// Insert `id` at `when`.
    ///
    /// `false` if `id` no longer names a callout or the scheduler has stopped.
    pub(crate) fn arm(&self, id: CalloutId, when: UnixTime, callback: Callback) -> bool {
        let outcome = {
            let mut state = self.state.lock();
            if state.shutdown {
                drop(state);
                trace!(?id, "arm after shutdown ignored");
                drop(callback);
                return false;
            }
            let outcome = state.pending.arm(id, when, callback);
            if outcome.is_ok() {
                // The new entry may be earlier than what the dispatcher sleeps on.
                self.wakeup.notify_one();
            }
            outcome
        };

        match outcome {
            Ok(displaced) => {
                trace!(?id, deadline = %when, rearmed = displaced.is_some(), "callout armed");
                drop(displaced);
                true
            }
            Err(rejected) => {
                trace!(?id, "arm on released callout ignored");
                drop(rejected);
                false
            }
        }
    }

    pub(crate) fn disarm(&self, id: CalloutId) -> bool {
        let displaced = self.state.lock().pending.detach(id);
        let was_armed = displaced.is_some();
        drop(displaced);
        if was_armed {
            trace!(?id, "callout disarmed");
        }
        was_armed
    }

    pub(crate) fn is_armed(&self, id: CalloutId) -> bool {
        self.state.lock().pending.is_armed(id)
    }

    pub(crate) fn deadline(&self, id: CalloutId) -> Option<UnixTime> {
        self.state.lock().pending.deadline(id)
    }
}

// ── Dispatch loop ─────────────────────────────────────────────────────────────

/// Body of the dispatch thread.  Returns only on shutdown.
fn dispatch(shared: Arc<Shared>) {
    debug!("dispatcher running");
    let mut state = shared.state.lock();

    while !state.shutdown {
        let now = shared.clock.now();

        if let Some((id, callback)) = state.pending.pop_due(now) {
            trace!(?id, now = %now, "firing callout");
            let fired = CalloutRef::new(id, Arc::clone(&shared));
            MutexGuard::unlocked(&mut state, || callback(&fired));
            continue;
        }

        match state.pending.next_deadline() {
            Some(deadline) => {
                let timeout = shared.clock.until(deadline);
                trace!(deadline = %deadline, ?timeout, "dispatcher sleeping");
                shared.wakeup.wait_for(&mut state, timeout);
            }
            None => {
                trace!("dispatcher idle");
                shared.wakeup.wait(&mut state);
            }
        }
    }

    let abandoned = state.pending.drain();
    drop(state);
    debug!(abandoned = abandoned.len(), "dispatcher stopped");
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

/// Deferred-callback scheduler with a single dispatch thread.
///
/// Construct one at process start and hand `&Scheduler` (or an
/// `Arc<Scheduler>`) to whatever needs timers.  Dropping it stops and joins
/// the dispatch thread; callouts that are still armed never fire.
pub struct Scheduler {
    shared: Arc<Shared>,
    dispatcher: Option<JoinHandle<()>>,
    thread_name: String,
}

impl Scheduler {
    /// Spawn the dispatch thread and return the running scheduler.
    ///
    /// # Errors
    /// [`SchedulerError::Spawn`] if the thread cannot be created.
    pub fn start(config: &DispatcherConfig, clock: Arc<dyn Clock>) -> Result<Self, SchedulerError> {
        let shared = Arc::new(Shared::new(clock));

        let mut builder = thread::Builder::new().name(config.thread_name.clone());
        if let Some(kb) = config.stack_size_kb {
            builder = builder.stack_size(kb.saturating_mul(1024));
        }

        let worker = Arc::clone(&shared);
        let handle = builder
            .spawn(move || dispatch(worker))
            .map_err(|source| SchedulerError::Spawn {
                name: config.thread_name.clone(),
                source,
            })?;

        info!(
            thread = %config.thread_name,
            stack_size_kb = ?config.stack_size_kb,
            "callout scheduler started"
        );

        Ok(Self {
            shared,
            dispatcher: Some(handle),
            thread_name: config.thread_name.clone(),
        })
    }

    /// Default dispatcher settings on the system wall clock.
    pub fn with_system_clock() -> Result<Self, SchedulerError> {
        Self::start(&DispatcherConfig::default(), Arc::new(SystemClock))
    }

    /// Create a new, unarmed callout bound to this scheduler.
    pub fn callout(&self) -> Callout {
        Callout::new(Arc::clone(&self.shared))
    }

    pub fn now(&self) -> UnixTime {
        self.shared.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.shared.clock)
    }

    /// Number of armed callouts.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Wake the dispatcher so it re-reads the clock.
    ///
    /// Needed after moving a [`ManualClock`](crate::ManualClock), or after a
    /// wall-clock step that should take effect before the current sleep ends.
    pub fn poke(&self) {
        let _state = self.shared.state.lock();
        self.shared.wakeup.notify_one();
    }

    /// Stop the dispatch thread and wait for it to exit.
    ///
    /// # Errors
    /// [`SchedulerError::DispatcherPanicked`] if a callback panicked earlier
    /// and killed the dispatch thread.
    pub fn shutdown(mut self) -> Result<(), SchedulerError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), SchedulerError> {
        let Some(handle) = self.dispatcher.take() else {
            return Ok(());
        };

        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.wakeup.notify_one();
        }

        // Dropped from inside a callback: the loop exits once it returns.
        if handle.thread().id() == thread::current().id() {
            debug!("shutdown requested on the dispatch thread; not joining");
            return Ok(());
        }

        match handle.join() {
            Ok(()) => {
                info!(thread = %self.thread_name, "callout scheduler stopped");
                Ok(())
            }
            Err(payload) => Err(SchedulerError::DispatcherPanicked {
                name: self.thread_name.clone(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "callout scheduler stopped abnormally");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
