//! WebSocket client transport using `tokio-tungstenite`.
//!
//! Each [`WebSocketHandle`] runs at most one background task at a time.
//! The task dials the endpoint, reports `Connected`, then pumps outbound
//! frames, inbound frames, and keep-alive pings until the socket closes,
//! and finally reports `Disconnected` with the reason. It never redials on
//! its own; whoever owns the handle calls `connect()` again.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tether_protocol::{Codec, Frame, JsonCodec};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

use crate::{
    AnyListener, ConnectOptions, ConnectionId, Connector, DisconnectReason,
    Emitter, Listener, SignalListener, TransportError, TransportHandle,
    TransportKind, TransportSignal,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// WebSocketConnector
// ---------------------------------------------------------------------------

/// A [`Connector`] producing [`WebSocketHandle`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Creates a connector.
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn open(
        &self,
        options: ConnectOptions,
    ) -> Result<Arc<dyn TransportHandle>, TransportError> {
        if !options.transports.contains(&TransportKind::WebSocket) {
            return Err(TransportError::UnsupportedTransport(format!(
                "{:?}",
                options.transports
            )));
        }
        Ok(Arc::new(WebSocketHandle::new(options)?))
    }
}

// ---------------------------------------------------------------------------
// WebSocketHandle
// ---------------------------------------------------------------------------

struct Shared {
    id: ConnectionId,
    url: String,
    options: ConnectOptions,
    codec: JsonCodec,
    emitter: Emitter,
    outbound_tx: mpsc::UnboundedSender<Frame>,
    /// Parked here while no task is running; the task owns it otherwise.
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Frame>>>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    running: AtomicBool,
    connected: AtomicBool,
    failures: AtomicU32,
}

/// A WebSocket-backed [`TransportHandle`].
pub struct WebSocketHandle {
    shared: Arc<Shared>,
}

impl WebSocketHandle {
    /// Creates a disconnected handle for `options`.
    ///
    /// # Errors
    /// [`TransportError::InvalidUrl`] when the endpoint is not a WebSocket
    /// URL.
    pub fn new(options: ConnectOptions) -> Result<Self, TransportError> {
        let url = options.request_url()?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Ok(Self {
            shared: Arc::new(Shared {
                id: ConnectionId::next(),
                url,
                options,
                codec: JsonCodec,
                emitter: Emitter::new(),
                outbound_tx,
                outbound_rx: Mutex::new(Some(outbound_rx)),
                stop: Mutex::new(None),
                running: AtomicBool::new(false),
                connected: AtomicBool::new(false),
                failures: AtomicU32::new(0),
            }),
        })
    }
}

impl TransportHandle for WebSocketHandle {
    fn id(&self) -> ConnectionId {
        self.shared.id
    }

    fn connect(&self) {
        let shared = &self.shared;
        if shared.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                shared.running.store(false, Ordering::SeqCst);
                tracing::error!(conn_id = %shared.id, error = %e, "no tokio runtime, cannot connect");
                return;
            }
        };
        let Some(outbound) = lock(&shared.outbound_rx).take() else {
            shared.running.store(false, Ordering::SeqCst);
            return;
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        *lock(&shared.stop) = Some(stop_tx);
        runtime.spawn(run(Arc::clone(shared), outbound, stop_rx));
    }

    fn disconnect(&self) {
        if let Some(stop) = lock(&self.shared.stop).take() {
            let _ = stop.send(());
        }
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: &str, args: &[Value]) {
        let _ = self.shared.outbound_tx.send(Frame::new(event, args.to_vec()));
    }

    fn on(&self, event: &str, listener: Listener) {
        self.shared.emitter.on(event, listener);
    }

    fn once(&self, event: &str, listener: Listener) {
        self.shared.emitter.once(event, listener);
    }

    fn off(&self, event: &str, listener: &Listener) {
        self.shared.emitter.off(event, listener);
    }

    fn on_any(&self, tap: AnyListener) {
        self.shared.emitter.on_any(tap);
    }

    fn on_signal(&self, listener: SignalListener) {
        self.shared.emitter.on_signal(listener);
    }

    fn remove_all_listeners(&self) {
        self.shared.emitter.remove_all();
    }
}

impl Drop for WebSocketHandle {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ---------------------------------------------------------------------------
// Connection task
// ---------------------------------------------------------------------------

async fn run(
    shared: Arc<Shared>,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    mut stop: oneshot::Receiver<()>,
) {
    let reason = drive(&shared, &mut outbound, &mut stop).await;

    shared.connected.store(false, Ordering::SeqCst);
    *lock(&shared.outbound_rx) = Some(outbound);
    lock(&shared.stop).take();
    shared.running.store(false, Ordering::SeqCst);

    tracing::info!(conn_id = %shared.id, %reason, "websocket disconnected");
    shared.emitter.signal(&TransportSignal::Disconnected(reason));
}

async fn drive(
    shared: &Shared,
    outbound: &mut mpsc::UnboundedReceiver<Frame>,
    stop: &mut oneshot::Receiver<()>,
) -> DisconnectReason {
    let failures = shared.failures.load(Ordering::SeqCst);
    if failures > 0 {
        let delay = shared.options.backoff(failures);
        tracing::debug!(conn_id = %shared.id, ?delay, failures, "delaying reconnect");
        tokio::select! {
            _ = &mut *stop => return DisconnectReason::ClientDisconnect,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    let ws = tokio::select! {
        _ = &mut *stop => return DisconnectReason::ClientDisconnect,
        result = tokio_tungstenite::connect_async(shared.url.as_str()) => match result {
            Ok((ws, _)) => ws,
            Err(e) => {
                shared.failures.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(conn_id = %shared.id, error = %e, "websocket connect failed");
                return DisconnectReason::TransportError;
            }
        },
    };

    shared.failures.store(0, Ordering::SeqCst);
    shared.connected.store(true, Ordering::SeqCst);
    tracing::info!(conn_id = %shared.id, "websocket connected");
    shared
        .emitter
        .signal(&TransportSignal::Connected { recovered: false });

    let (mut sink, mut stream) = ws.split();
    let interval = shared.options.ping_interval.max(Duration::from_millis(1));
    let mut ping = tokio::time::interval_at(Instant::now() + interval, interval);
    let mut last_seen = Instant::now();

    loop {
        let deadline = last_seen + interval + shared.options.ping_timeout;
        tokio::select! {
            _ = &mut *stop => {
                let _ = sink.send(Message::Close(None)).await;
                return DisconnectReason::ClientDisconnect;
            }
            Some(frame) = outbound.recv() => {
                let text = match shared.codec.encode_text(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(conn_id = %shared.id, event = %frame.event, error = %e, "dropping unencodable frame");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::warn!(conn_id = %shared.id, error = %e, "websocket send failed");
                    return DisconnectReason::TransportError;
                }
            }
            msg = stream.next() => {
                last_seen = Instant::now();
                match msg {
                    Some(Ok(Message::Text(text))) => deliver(shared, text.as_bytes()),
                    Some(Ok(Message::Binary(data))) => deliver(shared, &data),
                    Some(Ok(Message::Close(_))) => return DisconnectReason::ServerDisconnect,
                    Some(Ok(_)) => {} // ping/pong/raw frame
                    Some(Err(e)) => {
                        tracing::warn!(conn_id = %shared.id, error = %e, "websocket receive failed");
                        return DisconnectReason::TransportError;
                    }
                    None => return DisconnectReason::TransportClose,
                }
            }
            _ = ping.tick() => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    return DisconnectReason::TransportError;
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                let _ = sink.send(Message::Close(None)).await;
                return DisconnectReason::PingTimeout;
            }
        }
    }
}

fn deliver(shared: &Shared, data: &[u8]) {
    match shared.codec.decode::<Frame>(data) {
        Ok(frame) => {
            shared.emitter.dispatch(&frame.event, &frame.args);
        }
        Err(e) => {
            tracing::debug!(conn_id = %shared.id, error = %e, "ignoring undecodable frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_polling_only() {
        let mut options = ConnectOptions::new("ws://localhost:1");
        options.transports = vec![TransportKind::Polling];
        let result = WebSocketConnector.open(options);
        assert!(matches!(
            result,
            Err(TransportError::UnsupportedTransport(_))
        ));
    }

    #[test]
    fn test_open_rejects_non_websocket_url() {
        let result = WebSocketConnector.open(ConnectOptions::new("http://x"));
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }

    #[test]
    fn test_new_handle_starts_disconnected() {
        let handle = WebSocketHandle::new(ConnectOptions::new("ws://localhost:1")).unwrap();
        assert!(!handle.is_connected());
    }

    #[test]
    fn test_connect_without_runtime_is_harmless() {
        let handle = WebSocketHandle::new(ConnectOptions::new("ws://localhost:1")).unwrap();
        handle.connect();
        assert!(!handle.is_connected());
        assert!(!handle.shared.running.load(Ordering::SeqCst));
    }
}
