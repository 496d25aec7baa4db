use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use enumset::EnumSet;
use tracing::{debug, warn};

use super::Session;
use crate::error::Result;
use crate::models::{EventKind, ResearchEvent, Scope};

/// Receives [`ResearchEvent`]s.
///
/// Listeners get mutable access to the session and may edit it while handling an
/// event; those edits fire their own events synchronously (or into the open batch).
/// An error stops delivery of the current event to the remaining listeners.
pub trait ResearchListener {
    fn on_event(&mut self, session: &mut Session, event: &ResearchEvent) -> Result<()>;
}

impl<F> ResearchListener for F
where
    F: FnMut(&mut Session, &ResearchEvent) -> Result<()>,
{
    fn on_event(&mut self, session: &mut Session, event: &ResearchEvent) -> Result<()> {
        self(session, event)
    }
}

pub type SharedListener = Rc<RefCell<dyn ResearchListener>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    scope: Scope,
    kinds: EnumSet<EventKind>,
    listener: SharedListener,
}

#[derive(Default)]
pub(super) struct Bus {
    registrations: Vec<Registration>,
    next_id: u64,
    depth: usize,
    draining: bool,
    queue: VecDeque<ResearchEvent>,
}

impl Session {
    pub fn add_listener(
        &mut self,
        scope: Scope,
        kinds: EnumSet<EventKind>,
        listener: SharedListener,
    ) -> ListenerId {
        let id = ListenerId(self.bus.next_id);
        self.bus.next_id += 1;
        self.bus.registrations.push(Registration {
            id,
            scope,
            kinds,
            listener,
        });
        id
    }

    /// Registers a closure. Use [`add_listener`](Self::add_listener) to keep a handle
    /// on a listener object.
    pub fn subscribe<F>(&mut self, scope: Scope, kinds: EnumSet<EventKind>, listener: F) -> ListenerId
    where
        F: FnMut(&mut Session, &ResearchEvent) -> Result<()> + 'static,
    {
        self.add_listener(scope, kinds, Rc::new(RefCell::new(listener)))
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.bus.registrations.len();
        self.bus.registrations.retain(|registration| registration.id != id);
        self.bus.registrations.len() != before
    }

    /// Drops the registrations made against `scope`; `Scope::Any` drops all of them.
    pub fn clear_listeners(&mut self, scope: Scope) {
        self.bus
            .registrations
            .retain(|registration| scope != Scope::Any && registration.scope != scope);
    }

    pub fn listener_count(&self, scope: Scope) -> usize {
        self.bus
            .registrations
            .iter()
            .filter(|registration| scope == Scope::Any || registration.scope == scope)
            .count()
    }

    pub fn is_batching(&self) -> bool {
        self.bus.depth > 0
    }

    /// Starts (or nests) a batch. Events are queued until the outermost
    /// [`leave_batch`](Self::leave_batch).
    pub fn enter_batch(&mut self) {
        self.bus.depth += 1;
        if self.bus.depth == 1 {
            debug!("entering batch mode");
        }
    }

    pub fn leave_batch(&mut self) {
        if self.bus.depth == 0 {
            warn!("leave_batch called outside of a batch");
            return;
        }
        self.bus.depth -= 1;
        if self.bus.depth == 0 {
            debug!(queued = self.bus.queue.len(), "leaving batch mode");
            self.drain();
        }
    }

    /// Closes every open batch and discards the queue.
    pub fn reset_batch(&mut self) {
        if !self.bus.queue.is_empty() {
            debug!(discarded = self.bus.queue.len(), "discarding batched events");
        }
        self.bus.depth = 0;
        self.bus.queue.clear();
    }

    /// Runs `f` inside a batch, draining when it returns.
    pub fn batch<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.enter_batch();
        let result = f(self);
        self.leave_batch();
        result
    }

    /// Clears the registry and refills it with `fill`, all in one batch that
    /// nests inside any batch the caller has open.
    ///
    /// If `fill` fails, the projects it created are cleared and every event queued
    /// since the registry was cleared is dropped, so listeners only learn that the
    /// earlier projects were removed.
    pub(crate) fn replace_projects(
        &mut self,
        fill: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.enter_batch();
        let replaced = match self.clear_projects() {
            Ok(()) => {
                let mark = self.bus.queue.len();
                let filled = fill(self);
                if filled.is_err() {
                    if let Err(cleanup) = self.clear_projects() {
                        warn!(%cleanup, "listener failed while clearing rejected projects");
                    }
                    debug!(
                        discarded = self.bus.queue.len().saturating_sub(mark),
                        "discarding events of a rejected load"
                    );
                    self.bus.queue.truncate(mark);
                }
                filled
            }
            Err(err) => Err(err),
        };
        self.leave_batch();
        replaced
    }

    pub(crate) fn fire(&mut self, event: ResearchEvent) -> Result<()> {
        if self.bus.depth > 0 {
            let event = event.coalesced();
            if !self.bus.queue.contains(&event) {
                self.bus.queue.push_back(event);
            }
            return Ok(());
        }
        self.deliver(event)
    }

    fn deliver(&mut self, mut event: ResearchEvent) -> Result<()> {
        match &mut event {
            ResearchEvent::GoalsChanged(change) => change.list = self.goals.clone(),
            ResearchEvent::PathChanged(change) => change.list = self.path.clone(),
            _ => {}
        }

        let kind = event.kind();
        let destination = event.destination();
        let targets: Vec<SharedListener> = self
            .bus
            .registrations
            .iter()
            .filter(|registration| {
                registration.kinds.contains(kind) && registration.scope.receives(destination)
            })
            .map(|registration| Rc::clone(&registration.listener))
            .collect();

        for target in targets {
            let Ok(mut listener) = target.try_borrow_mut() else {
                warn!(?kind, "listener is still handling an earlier event, skipping");
                continue;
            };
            listener.on_event(self, &event)?;
        }
        Ok(())
    }

    fn drain(&mut self) {
        // A listener that batches while we drain queues onto the same queue; its
        // leave_batch must not start a second drain underneath this one.
        if self.bus.draining {
            return;
        }
        self.bus.draining = true;
        while self.bus.depth == 0 {
            let Some(event) = self.bus.queue.pop_front() else {
                break;
            };
            if let Err(err) = self.deliver(event) {
                warn!(%err, "listener failed during batch delivery");
            }
        }
        self.bus.draining = false;
    }
}
