//! Event arena and the time/priority ordered active queue
//!
//! Events live in an arena addressed by [`EventId`] handles for the level's
//! whole lifetime. The active list stays sorted by ascending trigger tick,
//! then descending priority; insertion scans from the front, which is cheap
//! for the small active sets levels carry.

use std::collections::HashMap;
use std::collections::VecDeque;

use crate::events::filter::MsgFilter;
use crate::level::Level;

/// Reserved listener group fired when an event has run its course
pub const LISTENER_GROUP_FINISHED: i32 = 0;

/// Handle of an event within its level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(usize);

/// Deferred game logic run when its event triggers
///
/// The logic is called after the event has been deactivated and its filters
/// applied. `origin` carries the triggering event, or `None` when the timer
/// drained the event from the active queue.
pub trait EventLogic {
    /// React to the trigger
    fn trigger(
        &mut self,
        level: &mut Level,
        event: EventId,
        msg: i32,
        value: i32,
        origin: Option<EventId>,
    );
}

impl<F> EventLogic for F
where
    F: FnMut(&mut Level, EventId, i32, i32, Option<EventId>),
{
    fn trigger(
        &mut self,
        level: &mut Level,
        event: EventId,
        msg: i32,
        value: i32,
        origin: Option<EventId>,
    ) {
        self(level, event, msg, value, origin);
    }
}

/// A listener registration on an event
#[derive(Debug, Clone, Copy)]
pub(crate) struct ListenerReg {
    /// Group the registration listens to; negative listens to every group
    pub group: i32,
    /// The event triggered when the group fires
    pub target: EventId,
    /// Message sent to the target; negative sends the group id instead
    pub msg: i32,
}

/// Arena slot of one event
pub(crate) struct EventSlot {
    /// The logic, absent while checked out for a trigger call
    pub logic: Option<Box<dyn EventLogic>>,
    /// Triggers that arrived while the logic was checked out
    pub pending: VecDeque<(i32, i32, Option<EventId>)>,
    pub active: bool,
    /// Tick the event should trigger at; kept on preserving deactivation
    pub trigger_tick: Option<i32>,
    pub priority: i32,
    pub listeners: Vec<ListenerReg>,
    pub filters: Vec<MsgFilter>,
}

/// The level's event arena and active queue
#[derive(Default)]
pub struct Scheduler {
    slots: Vec<EventSlot>,
    /// Active events ordered by ascending tick, then descending priority
    active: Vec<EventId>,
    names: HashMap<String, EventId>,
}

impl Scheduler {
    /// Create an empty scheduler
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add an event (deactivated) and return its handle
    pub(crate) fn add(&mut self, logic: Box<dyn EventLogic>, priority: i32) -> EventId {
        let id = EventId(self.slots.len());
        self.slots.push(EventSlot {
            logic: Some(logic),
            pending: VecDeque::new(),
            active: false,
            trigger_tick: None,
            priority,
            listeners: Vec::new(),
            filters: Vec::new(),
        });
        id
    }

    /// Record a string id for an event; an already-taken name is ignored
    pub(crate) fn name(&mut self, name: &str, id: EventId) {
        if name.is_empty() || self.names.contains_key(name) {
            return;
        }
        let _ = self.names.insert(name.to_owned(), id);
    }

    /// Look up an event by its string id
    pub(crate) fn lookup(&self, name: &str) -> Option<EventId> {
        self.names.get(name).copied()
    }

    /// Whether a handle addresses an event of this scheduler
    pub(crate) fn is_event(&self, id: EventId) -> bool {
        id.0 < self.slots.len()
    }

    pub(crate) fn slot(&self, id: EventId) -> &EventSlot {
        &self.slots[id.0]
    }

    pub(crate) fn slot_mut(&mut self, id: EventId) -> &mut EventSlot {
        &mut self.slots[id.0]
    }

    /// Move an event into the active queue for the given tick
    ///
    /// An already active event is re-spliced at its new position.
    pub(crate) fn activate(&mut self, id: EventId, tick: i32) {
        debug_assert!(self.is_event(id), "activate: unknown event");
        debug_assert!(tick >= 0, "activate: negative trigger tick");
        if self.slots[id.0].active {
            self.remove_active(id);
        }
        let slot = &mut self.slots[id.0];
        slot.active = true;
        slot.trigger_tick = Some(tick);
        let priority = slot.priority;
        let at = self
            .active
            .iter()
            .position(|other| {
                let other_slot = &self.slots[other.0];
                let other_tick = other_slot.trigger_tick.unwrap_or(i32::MAX);
                // stop at the first event the new one precedes
                !(other_tick < tick || (other_tick == tick && other_slot.priority > priority))
            })
            .unwrap_or(self.active.len());
        self.active.insert(at, id);
    }

    /// Deactivate an event, optionally keeping its scheduled tick readable
    pub(crate) fn deactivate(&mut self, id: EventId, preserve_tick: bool) {
        debug_assert!(self.is_event(id), "deactivate: unknown event");
        if !self.slots[id.0].active {
            return;
        }
        self.remove_active(id);
        let slot = &mut self.slots[id.0];
        slot.active = false;
        if !preserve_tick {
            slot.trigger_tick = None;
        }
    }

    /// The front of the active queue if it is due at `now`
    pub(crate) fn peek_due(&self, now: i32) -> Option<EventId> {
        let id = *self.active.first()?;
        let tick = self.slots[id.0].trigger_tick.unwrap_or(i32::MAX);
        if tick <= now { Some(id) } else { None }
    }

    /// Number of events in the arena
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    fn remove_active(&mut self, id: EventId) {
        if let Some(at) = self.active.iter().position(|other| *other == id) {
            let _ = self.active.remove(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Box<dyn EventLogic> {
        Box::new(|_: &mut Level, _: EventId, _: i32, _: i32, _: Option<EventId>| {})
    }

    #[test]
    fn test_active_queue_orders_by_tick_then_priority() {
        let mut sched = Scheduler::new();
        let e1 = sched.add(noop(), 1);
        let e2 = sched.add(noop(), 2);
        let e3 = sched.add(noop(), 0);
        sched.activate(e1, 5);
        sched.activate(e2, 5);
        sched.activate(e3, 3);
        assert_eq!(sched.active, vec![e3, e2, e1]);
        assert_eq!(sched.peek_due(2), None);
        assert_eq!(sched.peek_due(3), Some(e3));
    }

    #[test]
    fn test_reactivation_resplices() {
        let mut sched = Scheduler::new();
        let e1 = sched.add(noop(), 0);
        let e2 = sched.add(noop(), 0);
        sched.activate(e1, 10);
        sched.activate(e2, 20);
        sched.activate(e1, 30);
        assert_eq!(sched.active, vec![e2, e1]);
        assert_eq!(sched.slot(e1).trigger_tick, Some(30));
    }

    #[test]
    fn test_deactivation_preserves_tick_on_request() {
        let mut sched = Scheduler::new();
        let e1 = sched.add(noop(), 0);
        sched.activate(e1, 10);
        sched.deactivate(e1, true);
        assert!(!sched.slot(e1).active);
        assert_eq!(sched.slot(e1).trigger_tick, Some(10));
        sched.activate(e1, 4);
        sched.deactivate(e1, false);
        assert_eq!(sched.slot(e1).trigger_tick, None);
    }
}
