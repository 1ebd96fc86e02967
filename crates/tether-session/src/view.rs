//! Session views: what consumers hold instead of the transport handle.
//!
//! Every consumer gets its own [`SessionView`]. The view forwards calls to
//! the shared handle and remembers what the consumer asked for (callback
//! bindings and joins) so the registry can replay it after a reconnect and
//! so `dispose` can take all of it back without touching other views.
//!
//! When no connection can exist (no credential, no tenant) consumers get an
//! [`InertView`] instead. Both sit behind the [`View`] enum, so consumer
//! code never checks which one it has.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;
use tether_protocol::{EventName, Subscription};
use tether_transport::{Listener, TransportHandle};

use crate::registry::Core;

// ---------------------------------------------------------------------------
// EventSession
// ---------------------------------------------------------------------------

/// The four operations every view supports.
///
/// None of them fail or block.
pub trait EventSession {
    /// Registers `listener` for `event`. Lifecycle events (`connect`,
    /// `ready`) run the listener once the connection is ready instead.
    fn subscribe(&self, event: impl Into<EventName>, listener: Listener);

    /// Removes one registration of `listener` for `event` made through
    /// this view.
    fn unsubscribe(&self, event: impl Into<EventName>, listener: &Listener);

    /// Sends `event` with `params`. Events named `join<Channel>` are
    /// remembered as subscriptions.
    fn send(&self, event: &str, params: &[Value]);

    /// Retracts every subscription and callback made through this view.
    fn dispose(&self);
}

// ---------------------------------------------------------------------------
// ConnectionBackend
// ---------------------------------------------------------------------------

/// What a view forwards to: the live handle it was created for, or nothing
/// once that handle has been retired.
#[derive(Clone)]
pub(crate) enum ConnectionBackend {
    Live(Arc<dyn TransportHandle>),
    Absent,
}

impl ConnectionBackend {
    fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    fn attach(&self, event: &str, listener: &Listener) {
        if let Self::Live(handle) = self {
            handle.on(event, listener.clone());
        }
    }

    fn detach(&self, event: &str, listener: &Listener) {
        if let Self::Live(handle) = self {
            handle.off(event, listener);
        }
    }

    fn emit(&self, event: &str, params: &[Value]) {
        if let Self::Live(handle) = self {
            handle.emit(event, params);
        }
    }

    fn when_ready(&self, core: &Weak<Core>, listener: Listener) {
        if let (Self::Live(handle), Some(core)) = (self, core.upgrade()) {
            core.on_ready_for(handle.id(), Box::new(move || listener.call(&[])));
        }
    }
}

// ---------------------------------------------------------------------------
// SessionView
// ---------------------------------------------------------------------------

struct Binding {
    event: String,
    listener: Listener,
}

struct ViewState {
    backend: ConnectionBackend,
    bindings: Vec<Binding>,
    subscriptions: Vec<Subscription>,
}

/// The shared half of a view: what the registry reaches for replay.
///
/// Handle calls made for the view happen under its lock, except the attach
/// in `subscribe`.
pub(crate) struct ViewCell {
    id: u64,
    state: Mutex<ViewState>,
}

impl ViewCell {
    pub(crate) fn new(id: u64, handle: Arc<dyn TransportHandle>) -> Self {
        Self {
            id,
            state: Mutex::new(ViewState {
                backend: ConnectionBackend::Live(handle),
                bindings: Vec::new(),
                subscriptions: Vec::new(),
            }),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Detach-then-attach every binding, so a binding that survived the
    /// reconnect is not delivered twice.
    ///
    /// Runs under the view's lock, so it cannot interleave with `dispose` or
    /// with a binding being recorded. A disposed or retired view has an
    /// absent backend and is skipped.
    pub(crate) fn rebind(&self) {
        let state = self.lock();
        if !state.backend.is_live() {
            return;
        }
        for binding in &state.bindings {
            state.backend.detach(&binding.event, &binding.listener);
            state.backend.attach(&binding.event, &binding.listener);
        }
        if !state.bindings.is_empty() {
            tracing::debug!(view = self.id, count = state.bindings.len(), "rebound callbacks");
        }
    }

    /// Re-send a join for every recorded subscription, in recorded order.
    pub(crate) fn rejoin(&self) {
        let state = self.lock();
        if !state.backend.is_live() {
            return;
        }
        for sub in &state.subscriptions {
            tracing::debug!(view = self.id, channel = %sub.channel, "refreshing join");
            state.backend.emit(&sub.join_event(), &sub.params);
        }
    }

    /// Cut the view off from its handle. Recorded state is kept but
    /// nothing reaches the handle any more.
    pub(crate) fn detach_backend(&self) {
        self.lock().backend = ConnectionBackend::Absent;
    }
}

/// A consumer's view over the live connection.
///
/// Dropping the view disposes it.
pub struct SessionView {
    cell: Arc<ViewCell>,
    core: Weak<Core>,
}

impl SessionView {
    pub(crate) fn new(cell: Arc<ViewCell>, core: Weak<Core>) -> Self {
        Self { cell, core }
    }

    /// Subscriptions recorded so far, in order.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.cell.lock().subscriptions.clone()
    }

    /// Number of callback bindings recorded.
    pub fn binding_count(&self) -> usize {
        self.cell.lock().bindings.len()
    }

    /// Returns `false` once the handle this view was created for has been
    /// retired (tenant switch or shutdown) or the view was disposed.
    pub fn is_attached(&self) -> bool {
        self.cell.lock().backend.is_live()
    }
}

impl EventSession for SessionView {
    fn subscribe(&self, event: impl Into<EventName>, listener: Listener) {
        let backend = self.cell.lock().backend.clone();
        let name = match event.into() {
            EventName::Lifecycle(_) => {
                backend.when_ready(&self.core, listener);
                return;
            }
            EventName::Application(name) => name,
        };

        // Attached before it is recorded: a rebind fired from inside `on`
        // must not see the binding yet.
        backend.attach(&name, &listener);

        let mut state = self.cell.lock();
        if !state.backend.is_live() {
            // Disposed or retired while attaching.
            backend.detach(&name, &listener);
            return;
        }
        state.bindings.push(Binding {
            event: name,
            listener,
        });
    }

    fn unsubscribe(&self, event: impl Into<EventName>, listener: &Listener) {
        let EventName::Application(name) = event.into() else {
            return;
        };
        let mut state = self.cell.lock();
        let Some(i) = state
            .bindings
            .iter()
            .position(|b| b.event == name && b.listener.same_as(listener))
        else {
            return;
        };
        state.bindings.remove(i);
        state.backend.detach(&name, listener);
    }

    fn send(&self, event: &str, params: &[Value]) {
        if let EventName::Lifecycle(reserved) = EventName::parse(event) {
            tracing::warn!(event = reserved.wire_name(), "refusing to send a reserved lifecycle event");
            return;
        }
        let mut state = self.cell.lock();
        if let Some(sub) = Subscription::from_join(event, params) {
            tracing::debug!(view = self.cell.id, channel = %sub.channel, "joining");
            state.subscriptions.push(sub);
        }
        state.backend.emit(event, params);
    }

    fn dispose(&self) {
        {
            let mut state = self.cell.lock();
            let backend = std::mem::replace(&mut state.backend, ConnectionBackend::Absent);
            for sub in std::mem::take(&mut state.subscriptions) {
                backend.emit(&sub.leave_event(), &sub.params);
            }
            for binding in std::mem::take(&mut state.bindings) {
                backend.detach(&binding.event, &binding.listener);
            }
        }
        if let Some(core) = self.core.upgrade() {
            core.forget_view(self.cell.id);
        }
    }
}

impl Drop for SessionView {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for SessionView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionView")
            .field("id", &self.cell.id)
            .field("attached", &self.is_attached())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// InertView
// ---------------------------------------------------------------------------

/// A view with no connection behind it. Every operation is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct InertView;

impl EventSession for InertView {
    fn subscribe(&self, _event: impl Into<EventName>, _listener: Listener) {}

    fn unsubscribe(&self, _event: impl Into<EventName>, _listener: &Listener) {}

    fn send(&self, _event: &str, _params: &[Value]) {}

    fn dispose(&self) {}
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// What [`ConnectionRegistry::acquire`](crate::ConnectionRegistry::acquire)
/// returns.
#[derive(Debug)]
pub enum View {
    /// Backed by the live connection.
    Session(SessionView),
    /// No connection could be established.
    Inert(InertView),
}

impl View {
    /// Returns `true` for an inert view.
    pub fn is_inert(&self) -> bool {
        matches!(self, Self::Inert(_))
    }

    /// The session view, if this is one.
    pub fn as_session(&self) -> Option<&SessionView> {
        match self {
            Self::Session(view) => Some(view),
            Self::Inert(_) => None,
        }
    }
}

impl EventSession for View {
    fn subscribe(&self, event: impl Into<EventName>, listener: Listener) {
        match self {
            Self::Session(view) => view.subscribe(event, listener),
            Self::Inert(view) => view.subscribe(event, listener),
        }
    }

    fn unsubscribe(&self, event: impl Into<EventName>, listener: &Listener) {
        match self {
            Self::Session(view) => view.unsubscribe(event, listener),
            Self::Inert(view) => view.unsubscribe(event, listener),
        }
    }

    fn send(&self, event: &str, params: &[Value]) {
        match self {
            Self::Session(view) => view.send(event, params),
            Self::Inert(view) => view.send(event, params),
        }
    }

    fn dispose(&self) {
        match self {
            Self::Session(view) => view.dispose(),
            Self::Inert(view) => view.dispose(),
        }
    }
}

impl From<InertView> for View {
    fn from(view: InertView) -> Self {
        Self::Inert(view)
    }
}

impl From<SessionView> for View {
    fn from(view: SessionView) -> Self {
        Self::Session(view)
    }
}
