//! City events with per-kind ring buffers.
//!
//! Events are emitted while buildings and walkers update and delivered in
//! one batch at the end of the tick. Listeners are read-only: they feed UI
//! refreshes, sounds and statistics and never change simulation state.
//!
//! A kind can be suppressed with [`EventBus::suppress`]; suppressed events
//! are dropped at emit time without allocating a buffer.

use crate::fixed::Ticks;
use crate::good::Good;
use crate::id::{BuildingId, WalkerId};
use crate::production::StallReason;
use crate::registry::BuildingKind;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Production --
    GoodsProduced {
        building: BuildingId,
        good: Good,
        quantity: u32,
        tick: Ticks,
    },
    GoodsConsumed {
        building: BuildingId,
        good: Good,
        quantity: u32,
        tick: Ticks,
    },
    GoodsSpoiled {
        building: BuildingId,
        good: Good,
        quantity: u32,
        tick: Ticks,
    },
    ProductionStalled {
        building: BuildingId,
        reason: StallReason,
        tick: Ticks,
    },
    /// A building's goods store changed; views showing it should refresh.
    StoreChanged {
        building: BuildingId,
        tick: Ticks,
    },

    // -- Logistics --
    WalkerDispatched {
        walker: WalkerId,
        origin: BuildingId,
        destination: Option<BuildingId>,
        tick: Ticks,
    },
    GoodsDelivered {
        walker: WalkerId,
        building: BuildingId,
        good: Good,
        quantity: u32,
        tick: Ticks,
    },
    /// No building within reach accepted the goods.
    NoDestination {
        origin: BuildingId,
        good: Good,
        quantity: u32,
        tick: Ticks,
    },
    /// Goods still on a cart when its walker was removed.
    GoodsLost {
        walker: WalkerId,
        good: Good,
        quantity: u32,
        tick: Ticks,
    },
    WalkerRemoved {
        walker: WalkerId,
        tick: Ticks,
    },

    // -- City --
    BuildingPlaced {
        building: BuildingId,
        kind: BuildingKind,
        tick: Ticks,
    },
    BuildingRemoved {
        building: BuildingId,
        tick: Ticks,
    },
    BuildingCollapsed {
        building: BuildingId,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GoodsProduced,
    GoodsConsumed,
    GoodsSpoiled,
    ProductionStalled,
    StoreChanged,
    WalkerDispatched,
    GoodsDelivered,
    NoDestination,
    GoodsLost,
    WalkerRemoved,
    BuildingPlaced,
    BuildingRemoved,
    BuildingCollapsed,
}

const EVENT_KIND_COUNT: usize = 13;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::GoodsProduced { .. } => EventKind::GoodsProduced,
            Event::GoodsConsumed { .. } => EventKind::GoodsConsumed,
            Event::GoodsSpoiled { .. } => EventKind::GoodsSpoiled,
            Event::ProductionStalled { .. } => EventKind::ProductionStalled,
            Event::StoreChanged { .. } => EventKind::StoreChanged,
            Event::WalkerDispatched { .. } => EventKind::WalkerDispatched,
            Event::GoodsDelivered { .. } => EventKind::GoodsDelivered,
            Event::NoDestination { .. } => EventKind::NoDestination,
            Event::GoodsLost { .. } => EventKind::GoodsLost,
            Event::WalkerRemoved { .. } => EventKind::WalkerRemoved,
            Event::BuildingPlaced { .. } => EventKind::BuildingPlaced,
            Event::BuildingRemoved { .. } => EventKind::BuildingRemoved,
            Event::BuildingCollapsed { .. } => EventKind::BuildingCollapsed,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity ring buffer. When full, the oldest event is dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Next write position.
    head: usize,
    len: usize,
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        let cap = self.capacity();
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % cap;
        self.len = (self.len + 1).min(cap);
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total events written since creation (including dropped).
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        let cap = self.capacity();
        let start = if self.len < cap { 0 } else { self.head };
        (0..self.len).filter_map(move |i| self.events[(start + i) % cap].as_ref())
    }

    pub fn clear(&mut self) {
        self.events.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A read-only event listener.
pub type Listener = Box<dyn FnMut(&Event)>;

/// Optional predicate that filters events for a listener.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

struct Subscription {
    listener: Listener,
    filter: Option<EventFilter>,
}

/// One ring buffer and one listener list per event kind.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    subscriptions: [Vec<Subscription>; EVENT_KIND_COUNT],
    default_capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            subscriptions: std::array::from_fn(|_| Vec::new()),
            default_capacity,
        }
    }

    /// Stop recording `kind`. Already buffered events of that kind are
    /// dropped.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Register a listener for `kind`. Listeners run in registration order.
    pub fn subscribe(&mut self, kind: EventKind, listener: Listener) {
        self.subscribe_filtered(kind, None, listener);
    }

    pub fn subscribe_filtered(
        &mut self,
        kind: EventKind,
        filter: Option<EventFilter>,
        listener: Listener,
    ) {
        self.subscriptions[kind.index()].push(Subscription { listener, filter });
    }

    /// Hand every buffered event to its listeners, then clear the buffers.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }
            let events: Vec<Event> = buffer.iter().cloned().collect();
            buffer.clear();

            for sub in &mut self.subscriptions[idx] {
                for event in &events {
                    if let Some(filter) = &sub.filter
                        && !filter(event)
                    {
                        continue;
                    }
                    (sub.listener)(event);
                }
            }
        }
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffer(kind).map_or(0, EventBuffer::len)
    }

    /// Total events ever emitted for a kind (including dropped).
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffer(kind).map_or(0, EventBuffer::total_written)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
