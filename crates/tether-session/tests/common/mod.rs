//! Shared fixtures: a recording in-memory transport, a manual clock, and
//! token helpers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;
use tether_session::{Clock, ConnectionRegistry, MemoryStore, RegistryConfig, TOKEN_KEY, USER_ID_KEY};
use tether_transport::{
    AnyListener, ConnectOptions, ConnectionId, Connector, DisconnectReason, Emitter, Listener,
    SignalListener, TransportError, TransportHandle, TransportSignal,
};

/// "Now" for every test unless moved: 1 000 000 s after the epoch.
pub const NOW_MS: u64 = 1_000_000_000;

/// Expiry of the default token: one hour after [`NOW_MS`].
pub const EXP_SECS: u64 = NOW_MS / 1000 + 3600;

// ---------------------------------------------------------------------------
// MockHandle
// ---------------------------------------------------------------------------

/// Everything the registry or a view did to a handle, plus inbound events
/// the test injected, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect,
    Disconnect,
    Emit(String, Vec<Value>),
    On(String),
    Off(String),
    RemoveAll,
    Inbound(String),
}

pub fn emit(event: &str, args: Vec<Value>) -> Call {
    Call::Emit(event.to_string(), args)
}

pub fn on(event: &str) -> Call {
    Call::On(event.to_string())
}

pub fn off(event: &str) -> Call {
    Call::Off(event.to_string())
}

pub fn inbound(event: &str) -> Call {
    Call::Inbound(event.to_string())
}

/// In-memory handle. Nothing happens on its own: the test fires signals
/// and inbound events explicitly.
pub struct MockHandle {
    id: ConnectionId,
    pub options: ConnectOptions,
    emitter: Emitter,
    calls: Mutex<Vec<Call>>,
    connected: AtomicBool,
    /// Runs inside the next `on`, after the listener is registered.
    on_hook: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl MockHandle {
    fn new(options: ConnectOptions) -> Self {
        Self {
            id: ConnectionId::next(),
            options,
            emitter: Emitter::new(),
            calls: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            on_hook: Mutex::new(None),
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    /// Everything recorded so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Everything recorded so far, clearing the log.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    /// Only the emits, in order.
    pub fn emits(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Emit(..)))
            .collect()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.emitter.listener_count(event)
    }

    pub fn fire_connected(&self, recovered: bool) {
        self.connected.store(true, Ordering::SeqCst);
        self.emitter.signal(&TransportSignal::Connected { recovered });
    }

    pub fn fire_disconnected(&self, reason: DisconnectReason) {
        self.connected.store(false, Ordering::SeqCst);
        self.emitter.signal(&TransportSignal::Disconnected(reason));
    }

    /// Delivers an inbound event. Returns how many listeners ran.
    pub fn fire(&self, event: &str, args: &[Value]) -> usize {
        self.record(Call::Inbound(event.to_string()));
        self.emitter.dispatch(event, args)
    }

    /// Runs `hook` from within the next `on`, the way a transport thread
    /// can interleave with the caller.
    pub fn run_during_next_on(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_hook.lock().unwrap() = Some(Box::new(hook));
    }

    /// Connected, then the server's `ready`.
    pub fn bring_up(&self) {
        self.fire_connected(false);
        self.fire("ready", &[]);
    }
}

impl TransportHandle for MockHandle {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn connect(&self) {
        self.record(Call::Connect);
    }

    fn disconnect(&self) {
        self.record(Call::Disconnect);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: &str, args: &[Value]) {
        self.record(Call::Emit(event.to_string(), args.to_vec()));
    }

    fn on(&self, event: &str, listener: Listener) {
        self.record(Call::On(event.to_string()));
        self.emitter.on(event, listener);
        let hook = self.on_hook.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn once(&self, event: &str, listener: Listener) {
        self.record(Call::On(event.to_string()));
        self.emitter.once(event, listener);
    }

    fn off(&self, event: &str, listener: &Listener) {
        self.record(Call::Off(event.to_string()));
        self.emitter.off(event, listener);
    }

    fn on_any(&self, tap: AnyListener) {
        self.emitter.on_any(tap);
    }

    fn on_signal(&self, listener: SignalListener) {
        self.emitter.on_signal(listener);
    }

    fn remove_all_listeners(&self) {
        self.record(Call::RemoveAll);
        self.emitter.remove_all();
    }
}

// ---------------------------------------------------------------------------
// MockConnector
// ---------------------------------------------------------------------------

/// Opens [`MockHandle`]s and keeps every one it opened.
#[derive(Clone, Default)]
pub struct MockConnector {
    opened: Arc<Mutex<Vec<Arc<MockHandle>>>>,
}

impl MockConnector {
    pub fn opened(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn handle(&self, i: usize) -> Arc<MockHandle> {
        Arc::clone(&self.opened.lock().unwrap()[i])
    }

    pub fn last(&self) -> Arc<MockHandle> {
        let opened = self.opened.lock().unwrap();
        Arc::clone(opened.last().expect("no handle opened"))
    }
}

impl Connector for MockConnector {
    fn open(&self, options: ConnectOptions) -> Result<Arc<dyn TransportHandle>, TransportError> {
        let handle = Arc::new(MockHandle::new(options));
        self.opened.lock().unwrap().push(Arc::clone(&handle));
        Ok(handle)
    }
}

// ---------------------------------------------------------------------------
// Clock and tokens
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self(Arc::new(AtomicU64::new(now_ms)))
    }

    pub fn set(&self, now_ms: u64) {
        self.0.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// An unsigned JWT expiring at `exp_secs`.
pub fn jwt(exp_secs: u64) -> String {
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(format!(r#"{{"id":5,"exp":{exp_secs}}}"#))
    )
}

/// The token record as storage holds it: a JSON string.
pub fn stored_token(exp_secs: u64) -> String {
    serde_json::to_string(&jwt(exp_secs)).unwrap()
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub type TestRegistry = ConnectionRegistry<MockConnector, Arc<MemoryStore>>;

pub struct Harness {
    pub registry: TestRegistry,
    pub connector: MockConnector,
    pub store: Arc<MemoryStore>,
    pub clock: ManualClock,
    pub reloads: Arc<AtomicUsize>,
}

impl Harness {
    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

/// A registry over a mock connector, with a valid token and user `5`
/// already stored.
pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    store.set(TOKEN_KEY, stored_token(EXP_SECS));
    store.set(USER_ID_KEY, "5");

    let connector = MockConnector::default();
    let clock = ManualClock::new(NOW_MS);
    let reloads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reloads);

    let registry = ConnectionRegistry::builder(connector.clone(), Arc::clone(&store))
        .config(RegistryConfig::with_endpoint("ws://backend.test/socket"))
        .clock(clock.clone())
        .reloader(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    Harness {
        registry,
        connector,
        store,
        clock,
        reloads,
    }
}

/// A listener counting its calls.
pub fn counter() -> (Listener, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let listener = Listener::new(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    (listener, count)
}
