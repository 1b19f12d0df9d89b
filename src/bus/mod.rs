//! Publish/subscribe message bus between workers.
//!
//! ```text
//!  Sensor worker ──┐                       ┌──▶ Controller inbox
//!                  │  broadcast(msg)       │
//!  Webserver ──────┼──▶ MessageBus ────────┼──▶ Telemetry inbox
//!                  │  (kind filter)        │
//!  Controller ─────┘                       └──▶ Webserver inbox
//! ```
//!
//! Each worker owns one [`Subscriber`]: a bounded [`Inbox`] plus the set of
//! kinds it wants.  `broadcast` clones the message into every matching
//! inbox without blocking; a full inbox drops that copy and logs it.
//! There is no retry, acknowledgement or backpressure.
//!
//! The bus is an ordinary value owned by the runtime and shared by
//! reference (`Arc`), never a global.

pub mod dispatch;
pub mod message;

use core::cell::RefCell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::CriticalSectionMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, warn};

use crate::error::{BusError, Result};
use self::message::{KindSet, Message, MessageKind};

/// Messages an inbox holds before new arrivals are dropped.
pub const INBOX_DEPTH: usize = 16;

/// Maximum number of registered subscribers.
pub const MAX_SUBSCRIBERS: usize = 8;

type InboxChannel = Channel<CriticalSectionRawMutex, Message, INBOX_DEPTH>;

// ── Inbox ─────────────────────────────────────────────────────

/// Bounded FIFO shared between the bus (producer side) and one worker.
#[derive(Clone)]
pub struct Inbox {
    queue: Arc<InboxChannel>,
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Inbox {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Channel::new()),
        }
    }

    /// Non-blocking enqueue; `false` means the inbox was full.
    pub fn try_push(&self, msg: Message) -> bool {
        self.queue.try_send(msg).is_ok()
    }

    pub fn try_pop(&self) -> Option<Message> {
        self.queue.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Hand exactly the messages queued at entry to `f`, oldest first.
    /// Messages arriving meanwhile wait for the next drain.
    pub fn drain(&self, mut f: impl FnMut(Message)) -> usize {
        let pending = self.len();
        let mut taken = 0;
        while taken < pending {
            let Some(msg) = self.try_pop() else { break };
            f(msg);
            taken += 1;
        }
        taken
    }
}

// ── Subscriber ────────────────────────────────────────────────

#[derive(Clone)]
pub struct Subscriber {
    name: &'static str,
    inbox: Inbox,
    kinds: KindSet,
}

impl Subscriber {
    pub fn new(name: &'static str, kinds: impl IntoIterator<Item = MessageKind>) -> Self {
        Self {
            name,
            inbox: Inbox::new(),
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    pub fn is_subscribed(&self, kind: MessageKind) -> bool {
        self.kinds.contains(kind)
    }
}

// ── Bus ───────────────────────────────────────────────────────

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct MessageBus {
    registry: CriticalSectionMutex<RefCell<heapless::Vec<Subscriber, MAX_SUBSCRIBERS>>>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub const fn new() -> Self {
        Self {
            registry: CriticalSectionMutex::new(RefCell::new(heapless::Vec::new())),
        }
    }

    /// Add a subscriber.  Registering the same worker twice delivers
    /// every message to it twice.
    pub fn register(&self, sub: Subscriber) -> Result<()> {
        let name = sub.name;
        self.registry.lock(|reg| {
            reg.borrow_mut()
                .push(sub)
                .map_err(|_| BusError::RegistryFull)
        })?;
        debug!("MessageBus: registered '{}'", name);
        Ok(())
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock(|reg| reg.borrow().len())
    }

    /// Fan `msg` out to every subscriber of its kind.  Never fails; full
    /// inboxes are reported in the returned [`Delivery`] and logged.
    pub fn broadcast(&self, msg: &Message) -> Delivery {
        let kind = msg.kind();
        let mut delivery = Delivery::default();
        let mut dropped_at: heapless::Vec<&'static str, MAX_SUBSCRIBERS> = heapless::Vec::new();

        self.registry.lock(|reg| {
            for sub in reg.borrow().iter().filter(|s| s.is_subscribed(kind)) {
                if sub.inbox.try_push(msg.clone()) {
                    delivery.delivered += 1;
                } else {
                    delivery.dropped += 1;
                    let _ = dropped_at.push(sub.name);
                }
            }
        });

        for name in dropped_at {
            warn!("MessageBus: inbox '{}' full, dropped {:?}", name, kind);
        }
        delivery
    }

    /// Decode a wire frame and broadcast it.  Unknown kinds and malformed
    /// frames are rejected before any delivery.
    pub fn broadcast_frame(&self, frame: &[u8]) -> Result<Delivery> {
        let msg = Message::from_wire(frame)?;
        Ok(self.broadcast(&msg))
    }
}
