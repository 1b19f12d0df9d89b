//! Per-worker handler tables.
//!
//! A worker declares which kinds it handles by building a
//! [`HandlerTable`]: one plain `fn(&mut S, &Message) -> Result<()>` per
//! kind.  The same table produces the worker's [`Subscriber`] so the
//! subscription set and the handlers cannot drift apart.

use log::{debug, warn};

use super::message::{Message, MessageKind, Origin};
use super::{Inbox, Subscriber};
use crate::error::Result;

pub type Handler<S> = fn(&mut S, &Message) -> Result<()>;

pub struct HandlerTable<S> {
    entries: heapless::Vec<(MessageKind, Handler<S>), { MessageKind::ALL.len() }>,
}

impl<S> Default for HandlerTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> HandlerTable<S> {
    pub fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Register `handler` for `kind`, replacing any earlier entry.
    #[must_use]
    pub fn on(mut self, kind: MessageKind, handler: Handler<S>) -> Self {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 = handler;
        } else if self.entries.push((kind, handler)).is_err() {
            warn!("HandlerTable: no room for {:?}", kind);
        }
        self
    }

    pub fn kinds(&self) -> impl Iterator<Item = MessageKind> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn subscriber(&self, name: &'static str) -> Subscriber {
        Subscriber::new(name, self.kinds())
    }

    /// Run the handler for `msg`.  A kind without a handler is not an
    /// error: it is logged and ignored.
    pub fn dispatch(&self, state: &mut S, msg: &Message) -> Result<()> {
        match self.entries.iter().find(|(k, _)| *k == msg.kind()) {
            Some((_, handler)) => handler(state, msg),
            None => {
                debug!("HandlerTable: no handler for {:?}", msg.kind());
                Ok(())
            }
        }
    }
}

/// Drain `inbox` through `table` once.
///
/// Messages that `own` produced are skipped one at a time, so a worker
/// never reacts to its own broadcasts.  A failing handler is logged and
/// the remaining messages are still processed.  Returns the number of
/// messages handled.
pub fn process_inbox<S>(
    name: &str,
    own: Origin,
    inbox: &Inbox,
    table: &HandlerTable<S>,
    state: &mut S,
) -> usize {
    let mut handled = 0;
    inbox.drain(|msg| {
        if msg.origin == own {
            return;
        }
        if let Err(e) = table.dispatch(state, &msg) {
            warn!("{}: {:?} handler failed: {}", name, msg.kind(), e);
        }
        handled += 1;
    });
    handled
}
