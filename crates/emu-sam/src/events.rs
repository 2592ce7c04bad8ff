//! Scheduled hardware events.
//!
//! A fixed pool of slots linked by index into two lists: free slots, and
//! active events sorted by due time. Due times are absolute cycle counts on
//! the same clock as the bus counter, so nothing needs rebasing at frame
//! boundaries.

/// Number of event slots. Every periodic event holds at most two slots at
/// once, so running out means an event is being scheduled in a loop.
pub const EVENT_SLOTS: usize = 16;

/// What a scheduled event does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Frame interrupt line goes active; reschedules itself a frame later.
    FrameIntStart,
    FrameIntEnd,
    /// Line interrupt on the line selected through the status port.
    LineIntStart,
    LineIntEnd,
    /// MIDI OUT interrupt window after a byte has been sent.
    MidiOutStart,
    MidiOutEnd,
    /// The MIDI transmitter is free for the next byte.
    MidiTransmitEnd,
    MouseReset,
    SamplerClock,
    TapeEdge,
    /// The ASIC accepts palette writes after power-on.
    AsicReady,
    /// Mid-frame input poll.
    InputUpdate,
    EndOfLine,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    kind: EventKind,
    due: u64,
    next: Option<u8>,
}

/// Fixed-capacity queue of pending events.
pub struct EventQueue {
    slots: [Slot; EVENT_SLOTS],
    /// Earliest active event.
    head: Option<u8>,
    free: Option<u8>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        let mut queue = Self {
            slots: [Slot {
                kind: EventKind::EndOfLine,
                due: 0,
                next: None,
            }; EVENT_SLOTS],
            head: None,
            free: None,
        };
        queue.clear();
        queue
    }

    /// Drop every active event.
    pub fn clear(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            slot.next = (i + 1 < EVENT_SLOTS).then_some((i + 1) as u8);
        }
        self.head = None;
        self.free = Some(0);
    }

    /// Schedule `kind` at cycle `due`.
    ///
    /// Events due at the same time fire in the order they were added.
    ///
    /// # Panics
    ///
    /// Panics if all slots are in use.
    pub fn add(&mut self, kind: EventKind, due: u64) {
        let Some(index) = self.free else {
            panic!("event pool exhausted scheduling {kind:?} at {due}");
        };
        self.free = self.slots[usize::from(index)].next;

        let mut prev = None;
        let mut cur = self.head;
        while let Some(c) = cur {
            let slot = &self.slots[usize::from(c)];
            if slot.due > due {
                break;
            }
            prev = cur;
            cur = slot.next;
        }

        self.slots[usize::from(index)] = Slot {
            kind,
            due,
            next: cur,
        };
        match prev {
            Some(p) => self.slots[usize::from(p)].next = Some(index),
            None => self.head = Some(index),
        }
    }

    /// Remove every pending event of `kind`.
    pub fn cancel(&mut self, kind: EventKind) {
        let mut prev: Option<u8> = None;
        let mut cur = self.head;
        while let Some(c) = cur {
            let next = self.slots[usize::from(c)].next;
            if self.slots[usize::from(c)].kind == kind {
                match prev {
                    Some(p) => self.slots[usize::from(p)].next = next,
                    None => self.head = next,
                }
                self.release(c);
            } else {
                prev = cur;
            }
            cur = next;
        }
    }

    /// Take the earliest event if it is due at or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<(EventKind, u64)> {
        let index = self.head?;
        let slot = self.slots[usize::from(index)];
        if slot.due > now {
            return None;
        }
        self.head = slot.next;
        self.release(index);
        Some((slot.kind, slot.due))
    }

    /// Due time of the earliest event.
    #[must_use]
    pub fn next_due(&self) -> Option<u64> {
        self.head.map(|h| self.slots[usize::from(h)].due)
    }

    /// Cycles from `now` until the first pending `kind`, or 0 if there is
    /// none (or it is already overdue).
    #[must_use]
    pub fn time_until(&self, kind: EventKind, now: u64) -> u64 {
        self.iter()
            .find(|&(k, _)| k == kind)
            .map_or(0, |(_, due)| due.saturating_sub(now))
    }

    #[must_use]
    pub fn is_pending(&self, kind: EventKind) -> bool {
        self.iter().any(|(k, _)| k == kind)
    }

    /// Active events in firing order.
    pub fn iter(&self) -> impl Iterator<Item = (EventKind, u64)> + '_ {
        std::iter::successors(self.head, |&i| self.slots[usize::from(i)].next)
            .map(|i| (self.slots[usize::from(i)].kind, self.slots[usize::from(i)].due))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    fn release(&mut self, index: u8) {
        self.slots[usize::from(index)].next = self.free;
        self.free = Some(index);
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
