//! The connection registry: owner of the one live transport handle.
//!
//! Consumers never hold a transport handle. They call
//! [`ConnectionRegistry::acquire`] and get a [`View`]; the registry decides
//! whether that view rides on the existing handle, on a fresh one, or on
//! nothing at all.
//!
//! # Lifecycle
//!
//! ```text
//! acquire(tenant) ──→ same key?  ──yes──→ new view over the live handle
//!        │                │
//!        │                no
//!        │                ▼
//!        │          retire old handle (listeners off, disconnect,
//!        │          views detached, readiness cleared)
//!        │                ▼
//!        │          credential gate ──Missing/Malformed──→ inert view
//!        │                │        ──Expired──→ deferred reload + inert view
//!        │                ▼
//!        │          open handle, attach handle listeners, connect()
//!        ▼                ▼
//!   shutdown() ──→ retire            new view over the new handle
//! ```
//!
//! Reconnect replay is driven from the handle state machine in
//! [`crate::state`]. The handle's signal listener feeds it, and the
//! transition actions it returns (rebind, rejoin) run over every registered
//! view.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;
use tether_protocol::{LifecycleEvent, TenantId, TenantKey, UserId};
use tether_transport::{
    ConnectionId, Connector, DisconnectReason, Listener, TransportHandle, TransportSignal,
};

use crate::credential::{Clock, Credential, CredentialGate, SystemClock};
use crate::reload::{ReloadScheduler, Reloader};
use crate::state::{HandleEvent, HandleState, Transition};
use crate::store::{CredentialStore, TOKEN_KEY, USER_ID_KEY};
use crate::view::{InertView, SessionView, View, ViewCell};
use crate::{RegistryConfig, SessionError};

type ReadyCallback = Box<dyn FnOnce() + Send>;

// ---------------------------------------------------------------------------
// Core
// ---------------------------------------------------------------------------

struct Live {
    key: TenantKey,
    handle: Arc<dyn TransportHandle>,
}

#[derive(Default)]
struct CoreState {
    live: Option<Live>,
    ready: bool,
    pending_ready: Vec<ReadyCallback>,
    handle_state: HandleState,
    views: Vec<Weak<ViewCell>>,
    next_view: u64,
}

impl CoreState {
    fn is_live(&self, conn_id: ConnectionId) -> bool {
        self.live.as_ref().is_some_and(|l| l.handle.id() == conn_id)
    }

    fn live_views(&self) -> Vec<Arc<ViewCell>> {
        self.views.iter().filter_map(Weak::upgrade).collect()
    }
}

/// State shared between the registry, its views, and the handle listeners.
///
/// Every method takes the lock briefly and releases it before calling into
/// a view, the transport, or a consumer callback.
pub(crate) struct Core {
    state: Mutex<CoreState>,
}

impl Core {
    fn new() -> Self {
        Self {
            state: Mutex::new(CoreState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `callback` now if ready, otherwise once readiness is reached.
    fn on_ready(&self, callback: ReadyCallback) {
        let mut state = self.lock();
        if state.ready {
            drop(state);
            callback();
        } else {
            state.pending_ready.push(callback);
        }
    }

    /// Like [`on_ready`](Self::on_ready), but only while `conn_id` is still
    /// the live handle. A view created for a retired handle gets nothing.
    pub(crate) fn on_ready_for(&self, conn_id: ConnectionId, callback: ReadyCallback) {
        let mut state = self.lock();
        if !state.is_live(conn_id) {
            return;
        }
        if state.ready {
            drop(state);
            callback();
        } else {
            state.pending_ready.push(callback);
        }
    }

    pub(crate) fn forget_view(&self, id: u64) {
        self.lock()
            .views
            .retain(|w| w.upgrade().is_some_and(|cell| cell.id() != id));
    }

    fn install(&self, key: TenantKey, handle: Arc<dyn TransportHandle>) {
        let mut state = self.lock();
        state.live = Some(Live { key, handle });
        state.handle_state = HandleState::Disconnected;
        state.ready = false;
    }

    /// Registers a view over the live handle. `None` when nothing is live.
    fn attach_view(&self) -> Option<Arc<ViewCell>> {
        let mut state = self.lock();
        let handle = Arc::clone(&state.live.as_ref()?.handle);
        state.next_view += 1;
        let cell = Arc::new(ViewCell::new(state.next_view, handle));
        state.views.retain(|w| w.strong_count() > 0);
        state.views.push(Arc::downgrade(&cell));
        Some(cell)
    }

    /// Feeds `event` to the state machine if it concerns the live handle and
    /// performs the transition action.
    fn advance(&self, conn_id: ConnectionId, event: HandleEvent) {
        let (action, views, ready_callbacks) = {
            let mut state = self.lock();
            if !state.is_live(conn_id) {
                tracing::debug!(%conn_id, ?event, "ignoring event from a retired handle");
                return;
            }

            let (next, action) = state.handle_state.on_event(event);
            if next != state.handle_state {
                tracing::debug!(%conn_id, from = %state.handle_state, to = %next, "handle state");
            }
            state.handle_state = next;

            let mut ready_callbacks = Vec::new();
            if event == HandleEvent::Ready {
                state.ready = true;
                ready_callbacks = std::mem::take(&mut state.pending_ready);
            }

            let views = match action {
                Transition::None => Vec::new(),
                _ => state.live_views(),
            };
            (action, views, ready_callbacks)
        };

        // Runs on the first handshake too: joins flushed on open may precede
        // the server's `ready`.
        match action {
            Transition::Rebind => views.iter().for_each(|v| v.rebind()),
            Transition::Rejoin => views.iter().for_each(|v| v.rejoin()),
            Transition::None => {}
        }
        for callback in ready_callbacks {
            callback();
        }
    }

    /// Tears down the live handle, if any.
    fn retire(&self) {
        let (live, views, dropped) = {
            let mut state = self.lock();
            let Some(live) = state.live.take() else {
                return;
            };
            state.ready = false;
            state.handle_state = HandleState::Disconnected;
            let views = state.live_views();
            state.views.clear();
            (live, views, std::mem::take(&mut state.pending_ready))
        };

        live.handle.remove_all_listeners();
        live.handle.disconnect();
        for view in &views {
            view.detach_backend();
        }
        drop(dropped);

        tracing::info!(
            tenant = %live.key,
            conn_id = %live.handle.id(),
            views = views.len(),
            "retired handle"
        );
    }
}

// ---------------------------------------------------------------------------
// Handle listeners
// ---------------------------------------------------------------------------

/// What the handle-level listeners need. Holds the handle and the core
/// weakly: the handle owns these listeners.
struct HandleContext {
    conn_id: ConnectionId,
    key: TenantKey,
    core: Weak<Core>,
    handle: Weak<dyn TransportHandle>,
    credential: Credential,
    gate: CredentialGate,
    reload: ReloadScheduler,
}

impl HandleContext {
    fn on_signal(&self, signal: &TransportSignal) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        match *signal {
            TransportSignal::Connected { recovered } => {
                tracing::info!(tenant = %self.key, conn_id = %self.conn_id, recovered, "connected");
                core.advance(self.conn_id, HandleEvent::Connected { recovered });
            }
            TransportSignal::Disconnected(reason) => {
                core.advance(self.conn_id, HandleEvent::Disconnected);
                self.on_disconnect(&core, reason);
            }
        }
    }

    fn on_disconnect(&self, core: &Core, reason: DisconnectReason) {
        if !reason.is_transport_initiated() {
            tracing::info!(tenant = %self.key, conn_id = %self.conn_id, %reason, "disconnected");
            return;
        }
        tracing::warn!(tenant = %self.key, conn_id = %self.conn_id, %reason, "connection lost");

        if self.gate.expired_mid_session(&self.credential) {
            self.reload.reload_now();
            return;
        }
        if let Some(handle) = self.handle.upgrade() {
            core.advance(self.conn_id, HandleEvent::ConnectRequested);
            handle.connect();
        }
    }

    fn on_ready(&self) {
        if let Some(core) = self.core.upgrade() {
            tracing::info!(tenant = %self.key, conn_id = %self.conn_id, "ready");
            core.advance(self.conn_id, HandleEvent::Ready);
        }
    }
}

/// Attaches the signal listener, the catch-all tap and the `ready`
/// listener. Called once per handle.
fn attach_handle_listeners(handle: &Arc<dyn TransportHandle>, context: HandleContext) {
    let context = Arc::new(context);

    let ctx = Arc::clone(&context);
    handle.on_signal(Arc::new(move |signal: &TransportSignal| ctx.on_signal(signal)));

    let conn_id = context.conn_id;
    handle.on_any(Arc::new(move |event: &str, args: &[Value]| {
        tracing::debug!(%conn_id, event, args = args.len(), "inbound");
    }));

    let ctx = context;
    handle.on(
        LifecycleEvent::Ready.wire_name(),
        Listener::new(move |_| ctx.on_ready()),
    );
}

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

struct Inner<C, S> {
    config: RegistryConfig,
    connector: C,
    store: S,
    gate: CredentialGate,
    reload: ReloadScheduler,
    /// Serializes `acquire` and `shutdown`, so a key check and the
    /// retire/open that follows it cannot interleave with another caller.
    acquire_lock: Mutex<()>,
    core: Arc<Core>,
}

/// Owns at most one live transport handle and hands out views over it.
///
/// Cheap to clone: clones share the same handle and views.
///
/// # Example
///
/// ```rust,ignore
/// let registry = ConnectionRegistry::builder(WebSocketConnector, store)
///     .config(RegistryConfig::with_endpoint("wss://api.example.com/socket"))
///     .reloader(|| restart_login())
///     .build();
///
/// let view = registry.acquire(Some(TenantId::from(17u64)));
/// view.subscribe("message", Listener::new(|args| println!("{args:?}")));
/// view.send("joinTicket", &[json!(42)]);
/// ```
pub struct ConnectionRegistry<C, S> {
    inner: Arc<Inner<C, S>>,
}

impl<C, S> Clone for ConnectionRegistry<C, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector, S: CredentialStore> ConnectionRegistry<C, S> {
    /// Starts building a registry that opens handles through `connector`
    /// and reads identity and credentials from `store`.
    pub fn builder(connector: C, store: S) -> RegistryBuilder<C, S> {
        RegistryBuilder::new(connector, store)
    }

    /// Returns a view for `tenant`, never failing.
    ///
    /// Every failure [`try_acquire`](Self::try_acquire) can report becomes
    /// an [`InertView`].
    pub fn acquire(&self, tenant: Option<TenantId>) -> View {
        match self.try_acquire(tenant) {
            Ok(view) => View::Session(view),
            Err(e) => {
                match &e {
                    SessionError::NoCredential | SessionError::NoTenant => {
                        tracing::debug!(error = %e, "handing out an inert view");
                    }
                    _ => tracing::warn!(error = %e, "handing out an inert view"),
                }
                View::Inert(InertView)
            }
        }
    }

    /// Returns a session view for `tenant`, opening or replacing the live
    /// handle as needed.
    ///
    /// With `None`, the live tenant is kept; the live handle is reused only
    /// while the stored user still matches it.
    ///
    /// # Errors
    /// - [`SessionError::NoTenant`] if `tenant` is `None` and nothing is live
    /// - [`SessionError::NoCredential`] / [`SessionError::MalformedCredential`]
    ///   if the stored token cannot be used
    /// - [`SessionError::ExpiredCredential`] if it has expired; a deferred
    ///   reload is scheduled before returning
    /// - [`SessionError::Transport`] if the connector refused the options
    pub fn try_acquire(&self, tenant: Option<TenantId>) -> Result<SessionView, SessionError> {
        let inner = &self.inner;
        let _guard = inner
            .acquire_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let live_key = inner.core.lock().live.as_ref().map(|l| l.key.clone());
        let user = inner
            .store
            .get(USER_ID_KEY)
            .map(|raw| raw.trim().trim_matches('"').to_string())
            .filter(|raw| !raw.is_empty())
            .map(UserId::new);

        // Without a tenant the live one stands, but only for the same user.
        let tenant = match (tenant, &live_key) {
            (Some(tenant), _) => tenant,
            (None, Some(live)) => live.tenant.clone(),
            (None, None) => return Err(SessionError::NoTenant),
        };
        let key = TenantKey::new(tenant, user);

        if live_key.as_ref() == Some(&key) {
            return self.new_view();
        }
        if let Some(old) = live_key {
            tracing::info!(from = %old, to = %key, "switching tenant");
            inner.core.retire();
        }

        let credential = match inner.gate.check(inner.store.get(TOKEN_KEY).as_deref()) {
            Ok(credential) => credential,
            Err(e) => {
                if matches!(e, SessionError::ExpiredCredential { .. }) {
                    inner.reload.schedule();
                }
                return Err(e);
            }
        };

        let handle = inner
            .connector
            .open(inner.config.connect_options(credential.token()))?;
        let conn_id = handle.id();
        attach_handle_listeners(
            &handle,
            HandleContext {
                conn_id,
                key: key.clone(),
                core: Arc::downgrade(&inner.core),
                handle: Arc::downgrade(&handle),
                credential,
                gate: inner.gate.clone(),
                reload: inner.reload.clone(),
            },
        );

        tracing::info!(tenant = %key, %conn_id, endpoint = %inner.config.endpoint, "opened handle");
        inner.core.install(key, Arc::clone(&handle));
        inner.core.advance(conn_id, HandleEvent::ConnectRequested);
        handle.connect();

        self.new_view()
    }

    fn new_view(&self) -> Result<SessionView, SessionError> {
        let cell = self
            .inner
            .core
            .attach_view()
            .ok_or(SessionError::NoTenant)?;
        Ok(SessionView::new(cell, Arc::downgrade(&self.inner.core)))
    }

    /// Runs `callback` once the live handle is ready: immediately if it
    /// already is, otherwise when the server's `ready` arrives.
    ///
    /// Queued callbacks are dropped if the handle is retired first.
    pub fn on_ready(&self, callback: impl FnOnce() + Send + 'static) {
        self.inner.core.on_ready(Box::new(callback));
    }

    /// Whether the live handle completed its post-connect handshake.
    pub fn is_ready(&self) -> bool {
        self.inner.core.lock().ready
    }

    /// The live handle's connection state.
    pub fn state(&self) -> HandleState {
        self.inner.core.lock().handle_state
    }

    /// The key the live handle was opened for.
    pub fn live_key(&self) -> Option<TenantKey> {
        self.inner.core.lock().live.as_ref().map(|l| l.key.clone())
    }

    /// The live handle's id.
    pub fn live_connection(&self) -> Option<ConnectionId> {
        self.inner.core.lock().live.as_ref().map(|l| l.handle.id())
    }

    /// Number of views currently registered for replay.
    pub fn view_count(&self) -> usize {
        self.inner
            .core
            .lock()
            .views
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// The registry's configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Retires the live handle. Views handed out so far become no-ops.
    ///
    /// The registry stays usable: the next `acquire` opens a new handle.
    pub fn shutdown(&self) {
        let _guard = self
            .inner
            .acquire_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.inner.core.retire();
    }
}

impl<C, S> std::fmt::Debug for ConnectionRegistry<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.core.lock();
        f.debug_struct("ConnectionRegistry")
            .field("live", &state.live.as_ref().map(|l| l.key.to_string()))
            .field("state", &state.handle_state)
            .field("ready", &state.ready)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// RegistryBuilder
// ---------------------------------------------------------------------------

/// Builder for [`ConnectionRegistry`].
pub struct RegistryBuilder<C, S> {
    connector: C,
    store: S,
    config: RegistryConfig,
    reloader: Option<Arc<dyn Reloader>>,
    clock: Option<Arc<dyn Clock>>,
}

impl<C: Connector, S: CredentialStore> RegistryBuilder<C, S> {
    fn new(connector: C, store: S) -> Self {
        Self {
            connector,
            store,
            config: RegistryConfig::default(),
            reloader: None,
            clock: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Sets what runs when the credential can no longer be used. Without
    /// one, expiry is only logged.
    pub fn reloader(mut self, reloader: impl Reloader) -> Self {
        self.reloader = Some(Arc::new(reloader));
        self
    }

    /// Overrides the clock used for expiry checks.
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Builds the registry. Nothing is opened until the first `acquire`.
    pub fn build(self) -> ConnectionRegistry<C, S> {
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let reloader: Arc<dyn Reloader> = match self.reloader {
            Some(reloader) => reloader,
            None => Arc::new(log_missing_reloader),
        };

        ConnectionRegistry {
            inner: Arc::new(Inner {
                gate: CredentialGate::new(clock, self.config.expiry_skew),
                reload: ReloadScheduler::new(reloader, self.config.reload_delay),
                config: self.config,
                connector: self.connector,
                store: self.store,
                acquire_lock: Mutex::new(()),
                core: Arc::new(Core::new()),
            }),
        }
    }
}

fn log_missing_reloader() {
    tracing::error!("credential expired and no reloader is configured");
}
