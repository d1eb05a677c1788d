/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Storage for callouts and the deadline-ordered set of armed ones.
//!
//! Storage and ordering are kept apart:
//!
//! ```text
//! slots:  [ Idle | Armed{key,cb} | Vacant | Armed{key,cb} | ... ]   ← indexed by CalloutId
//! order:  BTreeMap<(deadline, seq), slot index>                      ← sorted view
//! ```
//!
//! A callout is armed iff its slot is `Armed`, iff its key is in `order`.
//! Detaching before re-inserting is a single `order.remove(&key)`.
//!
//! Equal deadlines are ordered by `seq`, a counter bumped on every arm, so
//! ties fire in arm order and a re-arm counts as a new arrival.
//!
//! Nothing here locks; [`Pending`] lives inside the scheduler's mutex.

use std::collections::BTreeMap;

use crate::clock::UnixTime;
use crate::handle::Callback;

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Slot index plus the generation it was handed out under.
///
/// A freed slot bumps its generation, so ids held by stale
/// [`CalloutRef`](crate::CalloutRef)s stop matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CalloutId {
    index: usize,
    generation: u32,
}

/// Position of an armed callout in the firing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    deadline: UnixTime,
    seq: u64,
}

// ── Slots ─────────────────────────────────────────────────────────────────────

struct Armed {
    key: QueueKey,
    callback: Callback,
}

enum SlotState {
    /// Free; links to the next free slot.
    Vacant { next_free: Option<usize> },
    /// Owned by a `Callout` but not armed.
    Idle,
    Armed(Armed),
}

struct Slot {
    generation: u32,
    state: SlotState,
}

// ── Pending ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct Pending {
    slots: Vec<Slot>,
    free_head: Option<usize>,
    order: BTreeMap<QueueKey, usize>,
    next_seq: u64,
}

impl Pending {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Hand out an idle slot for a new `Callout`.
    pub(crate) fn allocate(&mut self) -> CalloutId {
        if let Some(index) = self.free_head {
            let slot = &mut self.slots[index];
            if let SlotState::Vacant { next_free } = slot.state {
                self.free_head = next_free;
            }
            slot.state = SlotState::Idle;
            return CalloutId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len();
        self.slots.push(Slot {
            generation: 0,
            state: SlotState::Idle,
        });
        CalloutId {
            index,
            generation: 0,
        }
    }

    /// Return a slot to the free list, detaching it first if armed.
    ///
    /// The displaced callback, if any, is handed back so the caller can drop
    /// it outside the lock.
    pub(crate) fn release(&mut self, id: CalloutId) -> Option<Callback> {
        let displaced = self.detach(id);
        let free_head = self.free_head;
        let slot = self.slot_mut(id)?;
        slot.state = SlotState::Vacant {
            next_free: free_head,
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free_head = Some(id.index);
        displaced
    }

    /// Arm `id` for `when`, replacing any earlier registration.
    ///
    /// Returns `Err(callback)` when `id` is stale so the callback is not
    /// silently lost inside the lock; on success returns the displaced
    /// callback of the previous registration, if there was one.
    pub(crate) fn arm(
        &mut self,
        id: CalloutId,
        when: UnixTime,
        callback: Callback,
    ) -> Result<Option<Callback>, Callback> {
        if self.slot_mut(id).is_none() {
            return Err(callback);
        }
        let displaced = self.detach(id);

        let key = QueueKey {
            deadline: when,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.order.insert(key, id.index);

        if let Some(slot) = self.slot_mut(id) {
            slot.state = SlotState::Armed(Armed { key, callback });
        }
        Ok(displaced)
    }

    /// Remove `id` from the firing order and mark it idle.
    ///
    /// No-op (returns `None`) for idle or stale ids.
    pub(crate) fn detach(&mut self, id: CalloutId) -> Option<Callback> {
        let slot = self.slot_mut(id)?;
        match std::mem::replace(&mut slot.state, SlotState::Idle) {
            SlotState::Armed(armed) => {
                self.order.remove(&armed.key);
                Some(armed.callback)
            }
            other => {
                slot.state = other;
                None
            }
        }
    }

    pub(crate) fn is_armed(&self, id: CalloutId) -> bool {
        self.deadline(id).is_some()
    }

    pub(crate) fn deadline(&self, id: CalloutId) -> Option<UnixTime> {
        match &self.slot(id)?.state {
            SlotState::Armed(armed) => Some(armed.key.deadline),
            _ => None,
        }
    }

    /// Earliest armed deadline.
    pub(crate) fn next_deadline(&self) -> Option<UnixTime> {
        self.order.first_key_value().map(|(k, _)| k.deadline)
    }

    /// Detach the earliest callout if it is due at `now`.
    ///
    /// The slot is idle again by the time this returns, so the callback may
    /// re-arm it.
    pub(crate) fn pop_due(&mut self, now: UnixTime) -> Option<(CalloutId, Callback)> {
        let (&key, &index) = self.order.first_key_value()?;
        if key.deadline > now {
            return None;
        }
        let id = CalloutId {
            index,
            generation: self.slots[index].generation,
        };
        self.detach(id).map(|cb| (id, cb))
    }

    /// Disarm everything, returning the callbacks in firing order.
    pub(crate) fn drain(&mut self) -> Vec<Callback> {
        let order = std::mem::take(&mut self.order);
        order
            .into_values()
            .filter_map(|index| {
                let slot = &mut self.slots[index];
                match std::mem::replace(&mut slot.state, SlotState::Idle) {
                    SlotState::Armed(armed) => Some(armed.callback),
                    other => {
                        slot.state = other;
                        None
                    }
                }
            })
            .collect()
    }

    /// Number of armed callouts.
    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    fn slot(&self, id: CalloutId) -> Option<&Slot> {
        self.slots
            .get(id.index)
            .filter(|s| s.generation == id.generation && !matches!(s.state, SlotState::Vacant { .. }))
    }

    fn slot_mut(&mut self, id: CalloutId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index)
            .filter(|s| s.generation == id.generation && !matches!(s.state, SlotState::Vacant { .. }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::CalloutRef;
    use proptest::prelude::*;

    fn noop() -> Callback {
        Box::new(|_: &CalloutRef| {})
    }

    fn t(secs: i64) -> UnixTime {
        UnixTime::from_secs(secs)
    }

    /// Pop everything due at `now`, returning slot ids in firing order.
    fn drain(p: &mut Pending, now: UnixTime) -> Vec<CalloutId> {
        let mut fired = Vec::new();
        while let Some((id, _cb)) = p.pop_due(now) {
            fired.push(id);
        }
        fired
    }

    // ── allocate / release ────────────────────────────────────────────────────

    #[test]
    fn drain_disarms_everything() {
        let mut p = Pending::new();
        let a = p.allocate();
        let b = p.allocate();
        let idle = p.allocate();
        p.arm(a, t(5), noop()).ok().unwrap();
        p.arm(b, t(1), noop()).ok().unwrap();

        assert_eq!(p.drain().len(), 2);
        assert_eq!(p.len(), 0);
        assert!(!p.is_armed(a) && !p.is_armed(b) && !p.is_armed(idle));
        assert_eq!(p.next_deadline(), None);
        // slots stay owned and can be armed again
        assert!(p.arm(a, t(2), noop()).is_ok());
    }

    #[test]
    fn new_callout_is_idle() {
        let mut p = Pending::new();
        let id = p.allocate();
        assert!(!p.is_armed(id));
        assert_eq!(p.deadline(id), None);
        assert_eq!(p.len(), 0);
    }

    #[test]
    fn released_slot_is_reused_with_new_generation() {
        let mut p = Pending::new();
        let a = p.allocate();
        assert!(p.release(a).is_none());
        let b = p.allocate();
        assert_eq!(a.index, b.index);
        assert_ne!(a.generation, b.generation);
    }

    #[test]
    fn release_detaches_armed_callout() {
        let mut p = Pending::new();
        let a = p.allocate();
        p.arm(a, t(5), noop()).ok().unwrap();
        assert!(p.release(a).is_some(), "displaced callback handed back");
        assert_eq!(p.len(), 0);
        assert_eq!(p.next_deadline(), None);
    }

    #[test]
    fn stale_id_is_rejected_everywhere() {
        let mut p = Pending::new();
        let stale = p.allocate();
        p.release(stale);
        let _fresh = p.allocate();

        assert!(p.arm(stale, t(1), noop()).is_err());
        assert!(p.detach(stale).is_none());
        assert!(!p.is_armed(stale));
        assert!(p.release(stale).is_none());
        assert_eq!(p.len(), 0);
    }

    // ── arm / detach ──────────────────────────────────────────────────────────

    #[test]
    fn rearm_replaces_previous_membership() {
        let mut p = Pending::new();
        let a = p.allocate();
        assert!(p.arm(a, t(10), noop()).ok().unwrap().is_none());
        let displaced = p.arm(a, t(3), noop()).ok().unwrap();
        assert!(displaced.is_some());
        assert_eq!(p.len(), 1, "only one membership per callout");
        assert_eq!(p.deadline(a), Some(t(3)));
        assert_eq!(p.next_deadline(), Some(t(3)));
    }

    #[test]
    fn detach_idle_is_noop_and_leaves_others() {
        let mut p = Pending::new();
        let a = p.allocate();
        let b = p.allocate();
        p.arm(b, t(2), noop()).ok().unwrap();
        assert!(p.detach(a).is_none());
        assert!(p.detach(a).is_none());
        assert!(p.is_armed(b));
        assert_eq!(p.len(), 1);
    }

    // ── pop_due ───────────────────────────────────────────────────────────────

    #[test]
    fn pop_due_respects_now() {
        let mut p = Pending::new();
        let a = p.allocate();
        p.arm(a, t(10), noop()).ok().unwrap();
        assert!(p.pop_due(t(9)).is_none());
        let (id, _) = p.pop_due(t(10)).unwrap();
        assert_eq!(id, a);
        assert!(!p.is_armed(a), "unarmed before the callback runs");
    }

    #[test]
    fn equal_deadlines_fire_in_arm_order() {
        let mut p = Pending::new();
        let x = p.allocate();
        let y = p.allocate();
        let z = p.allocate();
        p.arm(y, t(1), noop()).ok().unwrap();
        p.arm(x, t(1), noop()).ok().unwrap();
        p.arm(z, t(1), noop()).ok().unwrap();
        assert_eq!(drain(&mut p, t(1)), vec![y, x, z]);
    }

    #[test]
    fn rearm_counts_as_new_arrival_for_ties() {
        let mut p = Pending::new();
        let x = p.allocate();
        let y = p.allocate();
        p.arm(x, t(1), noop()).ok().unwrap();
        p.arm(y, t(1), noop()).ok().unwrap();
        p.arm(x, t(1), noop()).ok().unwrap();
        assert_eq!(drain(&mut p, t(1)), vec![y, x]);
    }

    // ── properties ────────────────────────────────────────────────────────────

    proptest! {
        /// Firing order is sorted by deadline, ties by arm order.
        #[test]
        fn drain_order_is_deadline_then_arrival(deadlines in prop::collection::vec(0i64..20, 0..64)) {
            let mut p = Pending::new();
            let ids: Vec<CalloutId> = deadlines.iter().map(|_| p.allocate()).collect();
            for (id, d) in ids.iter().zip(&deadlines) {
                p.arm(*id, t(*d), noop()).ok().unwrap();
            }

            let mut expected: Vec<(i64, usize)> =
                deadlines.iter().copied().enumerate().map(|(i, d)| (d, i)).collect();
            expected.sort();
            let expected: Vec<CalloutId> = expected.into_iter().map(|(_, i)| ids[i]).collect();

            prop_assert_eq!(drain(&mut p, t(i64::MAX)), expected);
            prop_assert_eq!(p.len(), 0);
        }

        /// Arbitrary arm / detach / release sequences keep slots and order in step.
        #[test]
        fn membership_matches_model(ops in prop::collection::vec((0usize..8, 0u8..3, 0i64..50), 0..200)) {
            let mut p = Pending::new();
            let mut ids: Vec<CalloutId> = (0..8).map(|_| p.allocate()).collect();
            let mut model: Vec<Option<i64>> = vec![None; 8];

            for (which, op, when) in ops {
                match op {
                    0 => {
                        p.arm(ids[which], t(when), noop()).ok().unwrap();
                        model[which] = Some(when);
                    }
                    1 => {
                        p.detach(ids[which]);
                        model[which] = None;
                    }
                    _ => {
                        p.release(ids[which]);
                        ids[which] = p.allocate();
                        model[which] = None;
                    }
                }
            }

            for (id, m) in ids.iter().zip(&model) {
                prop_assert_eq!(p.deadline(*id), m.map(t));
            }
            prop_assert_eq!(p.len(), model.iter().filter(|m| m.is_some()).count());
            prop_assert_eq!(p.next_deadline(), model.iter().flatten().min().copied().map(t));
        }
    }
}
