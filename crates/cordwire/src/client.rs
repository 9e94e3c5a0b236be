//! The gateway client: connection loop, handshake and read loop.
//!
//! One [`GatewayClient`] runs one logical connection forever. Each pass of
//! the loop is an *attempt*: connect, wait for HELLO, start the heartbeat,
//! identify, then read frames until something goes wrong. Everything an
//! attempt creates (socket, session, heartbeat task) lives in that
//! attempt's scope and is gone before the next one starts.
//!
//! ```text
//!            ┌─────────────── backoff ───────────────┐
//!            ▼                                       │
//!     connect ─→ HELLO ─→ identify ─→ READY ─→ read loop
//!                  │                                 ▲
//!                  └── heartbeat task (aborted on drop)
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cordwire_heartbeat::{HeartbeatConfig, HeartbeatMetrics};
use cordwire_protocol::{
    Codec, Envelope, Event, EventKind, Hello, Identify, JsonCodec, Opcode, Ready, channel_of,
    is_suppressed, outbound, parse_event,
};
use cordwire_session::{Session, SessionPublisher, SessionWatch};
use cordwire_transport::{Connection, Connector, WebSocketConnector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::config::ClientConfig;
use crate::dispatch::{Dispatcher, HandlerResult};
use crate::heartbeat::{HeartbeatSignal, HeartbeatTask};
use crate::{CordwireError, GatewayState};

/// A persistent gateway connection with typed event handlers.
///
/// Register handlers with [`on`](Self::on), then drive the client with
/// [`run`](Self::run) or [`run_until`](Self::run_until).
pub struct GatewayClient<C: Connector = WebSocketConnector> {
    config: ClientConfig,
    connector: C,
    codec: JsonCodec,
    dispatcher: Dispatcher,
    state: watch::Sender<GatewayState>,
    sessions: SessionPublisher,
    heartbeat_metrics: Arc<watch::Sender<HeartbeatMetrics>>,
}

impl GatewayClient {
    /// A client that connects to `config.gateway_url` over WebSocket.
    pub fn new(config: ClientConfig) -> Self {
        let connector = WebSocketConnector::new(config.gateway_url.clone());
        Self::with_connector(config, connector)
    }
}

impl<C: Connector> GatewayClient<C> {
    /// A client that opens its connections through `connector`.
    pub fn with_connector(config: ClientConfig, connector: C) -> Self {
        let (state, _) = watch::channel(GatewayState::Disconnected);
        let (heartbeat_metrics, _) = watch::channel(HeartbeatMetrics::default());
        Self {
            dispatcher: Dispatcher::new(config.max_concurrent_handlers),
            config,
            connector,
            codec: JsonCodec,
            state,
            sessions: SessionPublisher::new(),
            heartbeat_metrics: Arc::new(heartbeat_metrics),
        }
    }

    /// Registers a handler for `kind`. Handlers for the same kind run in
    /// the order they were registered.
    pub fn on<F, Fut>(&mut self, kind: EventKind, handler: F) -> &mut Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.dispatcher.registry_mut().on(kind, handler);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Follows the connection state.
    pub fn state(&self) -> watch::Receiver<GatewayState> {
        self.state.subscribe()
    }

    /// Follows the authenticated session; the same watch survives
    /// reconnects.
    pub fn session(&self) -> SessionWatch {
        self.sessions.watch()
    }

    /// Heartbeat counters for the current connection.
    pub fn heartbeat_metrics(&self) -> watch::Receiver<HeartbeatMetrics> {
        self.heartbeat_metrics.subscribe()
    }

    /// Runs until the process ends.
    ///
    /// # Errors
    /// Returns [`CordwireError::Config`] if the config does not validate.
    /// Connection problems are never returned; the client reconnects.
    pub async fn run(&self) -> Result<(), CordwireError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs until `shutdown` resolves, then aborts live handler tasks and
    /// returns `Ok(())`.
    ///
    /// # Errors
    /// Returns [`CordwireError::Config`] if the config does not validate.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), CordwireError>
    where
        F: Future<Output = ()>,
    {
        self.config.validate()?;
        info!(
            url = %self.config.gateway_url,
            handlers_max = self.dispatcher.max_concurrent(),
            "gateway client starting"
        );

        tokio::select! {
            biased;
            () = shutdown => {}
            never = self.reconnect_loop() => match never {},
        }

        let aborted = self.dispatcher.abort_all();
        self.set_state(GatewayState::Disconnected);
        info!(aborted, "gateway client stopped");
        Ok(())
    }

    async fn reconnect_loop(&self) -> Infallible {
        let backoff = self.config.reconnect_backoff();
        loop {
            self.set_state(GatewayState::Connecting);
            match self.connector.connect().await {
                Ok(conn) => {
                    let conn = Arc::new(conn);
                    let id = conn.id();
                    info!(conn = %id, "connected to gateway");

                    let Err(e) = self.attempt(&conn).await;
                    warn!(conn = %id, error = %e, "gateway connection lost");
                    if let Err(e) = conn.close().await {
                        debug!(conn = %id, error = %e, "close after failure");
                    }
                }
                Err(e) => warn!(error = %e, "connect failed"),
            }

            self.set_state(GatewayState::Disconnected);
            info!(backoff_ms = backoff.as_millis() as u64, "reconnecting after backoff");
            tokio::time::sleep(backoff).await;
        }
    }

    /// One connection attempt. Only ever ends with an error; the session
    /// and heartbeat die with it.
    async fn attempt(&self, conn: &Arc<C::Connection>) -> Result<Infallible, CordwireError> {
        self.set_state(GatewayState::AwaitingHello);
        let hello = self.await_hello(conn.as_ref()).await?;

        let interval = Duration::from_millis(hello.heartbeat_interval);
        let mut session = Session::begin(interval);
        let mut heartbeat = HeartbeatTask::spawn(
            Arc::clone(conn),
            self.codec,
            HeartbeatConfig::with_interval(interval).jitter(self.config.heartbeat_jitter),
            session.sequence_reader(),
            Arc::clone(&self.heartbeat_metrics),
        );

        self.set_state(GatewayState::Identifying);
        let mut identify = Identify::new(self.config.token.clone());
        identify.intents = self.config.intents;
        self.send_frame(conn.as_ref(), &identify.into_frame()).await?;
        debug!(intents = ?self.config.intents, "identify sent");

        loop {
            let frame = tokio::select! {
                frame = conn.recv() => frame?,
                err = heartbeat.stopped() => return Err(err),
            };
            let Some(bytes) = frame else {
                return Err(CordwireError::ConnectionClosed);
            };

            let envelope = match self.codec.decode_envelope(&bytes) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(error = %e, len = bytes.len(), "skipping undecodable frame");
                    continue;
                }
            };
            self.handle_envelope(conn.as_ref(), &mut session, &heartbeat, envelope)
                .await?;
        }
    }

    /// Waits for the first frame, which must be HELLO.
    async fn await_hello(&self, conn: &C::Connection) -> Result<Hello, CordwireError> {
        let timeout = self.config.hello_timeout();
        let frame = tokio::time::timeout(timeout, conn.recv())
            .await
            .map_err(|_| {
                CordwireError::Handshake(format!("no HELLO within {}ms", timeout.as_millis()))
            })??
            .ok_or(CordwireError::ConnectionClosed)?;

        let envelope = self.codec.decode_envelope(&frame)?;
        if envelope.opcode() != Some(Opcode::Hello) {
            return Err(CordwireError::Handshake(format!(
                "expected HELLO (op 10) first, got op {}",
                envelope.op
            )));
        }
        let hello = envelope.hello()?;
        debug!(interval_ms = hello.heartbeat_interval, "HELLO received");
        Ok(hello)
    }

    async fn handle_envelope(
        &self,
        conn: &C::Connection,
        session: &mut Session,
        heartbeat: &HeartbeatTask,
        envelope: Envelope,
    ) -> Result<(), CordwireError> {
        match envelope.opcode() {
            Some(Opcode::Dispatch) => self.handle_dispatch(conn, session, envelope).await?,
            Some(Opcode::Heartbeat) => heartbeat.signal(HeartbeatSignal::BeatNow),
            Some(Opcode::HeartbeatAck) => heartbeat.signal(HeartbeatSignal::Ack),
            Some(Opcode::Hello) => debug!("ignoring HELLO after handshake"),
            Some(Opcode::Reconnect) => return Err(CordwireError::ReconnectRequested),
            Some(Opcode::InvalidSession) => return Err(CordwireError::InvalidSession),
            Some(op) => debug!(op = op.code(), "ignoring unexpected opcode"),
            None => debug!(op = envelope.op, "ignoring unknown opcode"),
        }
        Ok(())
    }

    async fn handle_dispatch(
        &self,
        conn: &C::Connection,
        session: &mut Session,
        envelope: Envelope,
    ) -> Result<(), CordwireError> {
        if let Some(seq) = envelope.sequence {
            session.record_sequence(seq);
        }
        let Some(name) = envelope.event else {
            debug!("dispatch without an event name");
            return Ok(());
        };
        if is_suppressed(&name) {
            trace!(event = %name, "suppressed");
            return Ok(());
        }
        if name == EventKind::Ready.as_str() {
            return self.handle_ready(conn, session, envelope.payload).await;
        }

        let payload = envelope.payload;
        if !self.config.monitors(channel_of(&payload)) {
            trace!(event = %name, "channel not monitored");
            return Ok(());
        }

        let raw = self.config.verbose.then(|| Arc::new(payload.clone()));
        match parse_event(&name, payload) {
            Ok(event) => {
                trace!(event = %name, "dispatching");
                self.dispatcher.dispatch(event, raw);
            }
            Err(e) => {
                warn!(event = %name, error = %e, "failed to parse event");
                if let Some(raw) = raw {
                    debug!(event = %name, payload = %raw, "unparsed payload");
                }
            }
        }
        Ok(())
    }

    async fn handle_ready(
        &self,
        conn: &C::Connection,
        session: &mut Session,
        payload: Value,
    ) -> Result<(), CordwireError> {
        let ready = Ready::deserialize(&payload)
            .map_err(|e| CordwireError::Handshake(format!("malformed READY: {e}")))?;

        let snapshot = match session.authenticate(ready.session_id.clone(), ready.user.clone()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "ignoring duplicate READY");
                return Ok(());
            }
        };
        self.sessions.publish(Arc::clone(&snapshot));
        info!(user = %snapshot.user, session_id = %snapshot.session_id, "logged in");

        for guild in &self.config.monitored_guilds {
            let (focus, bulk) = outbound::guild_subscription(*guild);
            self.send_frame(conn, &focus).await?;
            self.send_frame(conn, &bulk).await?;
            debug!(guild = %guild, "subscribed to guild events");
        }

        self.set_state(GatewayState::Ready);
        self.dispatcher.dispatch(Event::Ready(Arc::new(ready)), None);
        Ok(())
    }

    async fn send_frame<T: Serialize>(
        &self,
        conn: &C::Connection,
        frame: &T,
    ) -> Result<(), CordwireError> {
        let text = self.codec.encode(frame)?;
        conn.send(&text).await?;
        Ok(())
    }

    fn set_state(&self, next: GatewayState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            debug!(state = %next, "gateway state");
        }
    }
}

impl<C: Connector> std::fmt::Debug for GatewayClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
