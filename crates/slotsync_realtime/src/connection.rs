// --- File: crates/slotsync_realtime/src/connection.rs ---
//! Connection manager for the live booking-update feed.
//!
//! A single actor task owns the link, the heartbeat and the reconnect timer.
//! `ConnectionManager` is a cheap handle that talks to it over a command
//! channel; state changes are published on a `watch` channel. Handshakes run
//! in their own task so the actor keeps serving commands while one is pending.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use slotsync_common::{config_error, internal_error, DateKey, SlotSyncError};
use slotsync_config::RealtimeConfig;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::backoff::{BackoffPolicy, BackoffState};
use crate::protocol::{parse_frame, ControlFrame, LiveEvent};
use crate::transport::{
    Outgoing, Transport, TransportEvent, TransportLink, ABNORMAL_CLOSURE, NORMAL_CLOSURE,
};

/// The single downstream consumer of live events.
pub type EventHandler = Arc<dyn Fn(LiveEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    /// A reconnect is scheduled after `next_delay`.
    Reconnecting,
    /// Automatic reconnection is exhausted; only `connect()` retries.
    GaveUp,
    /// Not connected and not trying: before the first `connect()` or after `disconnect()`.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub attempt: u32,
    pub next_delay: Duration,
    pub subscribed_date: Option<DateKey>,
}

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub url: String,
    pub heartbeat: Duration,
    /// A handshake still pending after this long counts as failed.
    pub connect_timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl ConnectionSettings {
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            url: config.ws_url.clone(),
            heartbeat: Duration::from_secs(config.heartbeat_secs),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            backoff: BackoffPolicy::from(config),
        }
    }
}

enum Command {
    Connect(oneshot::Sender<ConnectionStatus>),
    Disconnect(oneshot::Sender<()>),
    Subscribe(DateKey),
    Unsubscribe(DateKey),
    SetHandler(EventHandler, oneshot::Sender<Result<(), SlotSyncError>>),
}

type HandshakeOutcome = Result<TransportLink, SlotSyncError>;

enum Wake {
    Command(Option<Command>),
    Handshake(HandshakeOutcome),
    Transport(TransportEvent),
    Heartbeat,
    Reconnect,
}

/// Handle to the connection actor. Clones share the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl ConnectionManager {
    /// Spawns the actor on the current tokio runtime. No connection is opened yet.
    pub fn spawn(settings: ConnectionSettings, transport: Arc<dyn Transport>) -> Self {
        let backoff = BackoffState::new(settings.backoff);
        let initial = ConnectionState {
            status: ConnectionStatus::Closed,
            attempt: 0,
            next_delay: backoff.delay(),
            subscribed_date: None,
        };
        let (state_tx, state_rx) = watch::channel(initial);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let actor = ConnectionActor {
            settings,
            transport,
            state_tx,
            backoff,
            status: ConnectionStatus::Closed,
            subscribed: None,
            link: None,
            inbound: None,
            handler: None,
            reconnect_at: None,
            handshake: None,
            connect_waiters: Vec::new(),
        };
        tokio::spawn(actor.run(command_rx));

        Self {
            commands: command_tx,
            state: state_rx,
        }
    }

    /// Opens the link unless it is already open.
    ///
    /// Resolves with the status after the handshake attempt; a call made while a
    /// handshake is in flight waits for that one. A failed handshake is not an
    /// error: it schedules a reconnect and reports `Reconnecting`. A call while a
    /// reconnect is scheduled retries at once without resetting the attempt count.
    pub async fn connect(&self) -> ConnectionStatus {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(Command::Connect(reply_tx)).is_err() {
            warn!("Connection actor is gone; connect ignored");
            return self.state().status;
        }
        reply_rx.await.unwrap_or(ConnectionStatus::Closed)
    }

    /// Closes the link with the normal-closure code and cancels any pending reconnect.
    pub async fn disconnect(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(Command::Disconnect(reply_tx)).is_ok() {
            let _ = reply_rx.await;
        }
    }

    /// Records the date of interest; sent now if open, otherwise after the next connect.
    pub fn subscribe(&self, date: DateKey) {
        if self.commands.send(Command::Subscribe(date)).is_err() {
            warn!("Connection actor is gone; subscribe to {} ignored", date);
        }
    }

    /// Drops interest in `date` if it is the subscribed one. The link stays open.
    pub fn unsubscribe(&self, date: DateKey) {
        if self.commands.send(Command::Unsubscribe(date)).is_err() {
            warn!("Connection actor is gone; unsubscribe from {} ignored", date);
        }
    }

    /// Registers the event consumer. Only one handler may ever be registered.
    pub async fn on_event<F>(&self, handler: F) -> Result<(), SlotSyncError>
    where
        F: Fn(LiveEvent) + Send + Sync + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::SetHandler(Arc::new(handler), reply_tx))
            .map_err(|_| SlotSyncError::InternalError("connection actor is gone".to_string()))?;
        reply_rx
            .await
            .map_err(|_| SlotSyncError::InternalError("connection actor is gone".to_string()))?
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().status == ConnectionStatus::Open
    }
}

struct ConnectionActor {
    settings: ConnectionSettings,
    transport: Arc<dyn Transport>,
    state_tx: watch::Sender<ConnectionState>,
    backoff: BackoffState,
    status: ConnectionStatus,
    subscribed: Option<DateKey>,
    link: Option<mpsc::UnboundedSender<Outgoing>>,
    inbound: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    handler: Option<EventHandler>,
    reconnect_at: Option<Instant>,
    handshake: Option<JoinHandle<HandshakeOutcome>>,
    connect_waiters: Vec<oneshot::Sender<ConnectionStatus>>,
}

async fn next_inbound(inbound: &mut Option<mpsc::UnboundedReceiver<TransportEvent>>) -> TransportEvent {
    match inbound {
        Some(rx) => rx.recv().await.unwrap_or(TransportEvent::Closed {
            code: ABNORMAL_CLOSURE,
        }),
        None => pending().await,
    }
}

async fn next_handshake(handshake: &mut Option<JoinHandle<HandshakeOutcome>>) -> HandshakeOutcome {
    match handshake {
        Some(task) => task
            .await
            .unwrap_or_else(|e| Err(internal_error(format!("handshake task failed: {}", e)))),
        None => pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

impl ConnectionActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let period = self.settings.heartbeat;
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let wake = tokio::select! {
                command = commands.recv() => Wake::Command(command),
                outcome = next_handshake(&mut self.handshake) => Wake::Handshake(outcome),
                event = next_inbound(&mut self.inbound) => Wake::Transport(event),
                _ = heartbeat.tick() => Wake::Heartbeat,
                _ = wait_until(self.reconnect_at) => Wake::Reconnect,
            };

            match wake {
                Wake::Command(Some(command)) => self.handle_command(command),
                Wake::Command(None) => {
                    debug!("All connection handles dropped; shutting down live feed");
                    self.abort_handshake();
                    self.close_link("client shutdown");
                    break;
                }
                Wake::Handshake(outcome) => {
                    self.handshake = None;
                    self.finish_connect(outcome);
                }
                Wake::Transport(TransportEvent::Text(text)) => self.dispatch(&text),
                Wake::Transport(TransportEvent::Closed { code }) => self.handle_close(code),
                Wake::Heartbeat => {
                    if self.status == ConnectionStatus::Open {
                        trace!("Sending heartbeat ping");
                        self.send_frame(ControlFrame::Ping);
                    }
                }
                Wake::Reconnect => {
                    self.reconnect_at = None;
                    info!(
                        "Reconnecting to live feed (attempt {}/{})",
                        self.backoff.attempts(),
                        self.settings.backoff.max_attempts
                    );
                    self.start_connect();
                }
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(reply) => match self.status {
                ConnectionStatus::Open => {
                    let _ = reply.send(self.status);
                }
                ConnectionStatus::Connecting => self.connect_waiters.push(reply),
                ConnectionStatus::Reconnecting
                | ConnectionStatus::GaveUp
                | ConnectionStatus::Closed => {
                    self.reconnect_at = None;
                    if self.status != ConnectionStatus::Reconnecting {
                        self.backoff.reset();
                    }
                    self.connect_waiters.push(reply);
                    self.start_connect();
                }
            },
            Command::Disconnect(reply) => {
                self.reconnect_at = None;
                self.abort_handshake();
                self.close_link("client disconnect");
                self.backoff.reset();
                self.set_status(ConnectionStatus::Closed);
                self.answer_waiters();
                info!("Live feed disconnected");
                let _ = reply.send(());
            }
            Command::Subscribe(date) => {
                if self.subscribed == Some(date) {
                    return;
                }
                if let Some(previous) = self.subscribed.replace(date) {
                    if self.status == ConnectionStatus::Open {
                        self.send_frame(ControlFrame::Unsubscribe { date: previous });
                    }
                }
                if self.status == ConnectionStatus::Open {
                    self.send_frame(ControlFrame::Subscribe { date });
                }
                self.publish();
            }
            Command::Unsubscribe(date) => {
                if self.subscribed != Some(date) {
                    return;
                }
                self.subscribed = None;
                if self.status == ConnectionStatus::Open {
                    self.send_frame(ControlFrame::Unsubscribe { date });
                }
                self.publish();
            }
            Command::SetHandler(handler, reply) => {
                let result = if self.handler.is_some() {
                    Err(config_error("a live event handler is already registered"))
                } else {
                    self.handler = Some(handler);
                    Ok(())
                };
                let _ = reply.send(result);
            }
        }
    }

    fn start_connect(&mut self) {
        self.set_status(ConnectionStatus::Connecting);

        let transport = Arc::clone(&self.transport);
        let url = self.settings.url.clone();
        let limit = self.settings.connect_timeout;
        self.handshake = Some(tokio::spawn(async move {
            match timeout(limit, transport.open(&url)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(SlotSyncError::TimeoutError(format!(
                    "handshake with {} took longer than {:?}",
                    url, limit
                ))),
            }
        }));
    }

    fn abort_handshake(&mut self) {
        if let Some(task) = self.handshake.take() {
            debug!("Abandoning in-flight live feed handshake");
            task.abort();
        }
    }

    fn answer_waiters(&mut self) {
        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(self.status);
        }
    }

    fn finish_connect(&mut self, outcome: HandshakeOutcome) {
        match outcome {
            Ok(TransportLink { outbound, inbound }) => {
                self.link = Some(outbound);
                self.inbound = Some(inbound);
                self.backoff.reset();
                self.set_status(ConnectionStatus::Open);
                info!("Live feed connected to {}", self.settings.url);

                if let Some(date) = self.subscribed {
                    self.send_frame(ControlFrame::Subscribe { date });
                }
            }
            Err(e) => {
                warn!("Live feed connection failed: {}", e);
                self.schedule_reconnect();
            }
        }
        self.answer_waiters();
    }

    fn handle_close(&mut self, code: u16) {
        self.link = None;
        self.inbound = None;

        if code == NORMAL_CLOSURE {
            info!("Live feed closed normally by server");
            self.set_status(ConnectionStatus::Closed);
            return;
        }

        warn!("Live feed closed abnormally (code {})", code);
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        match self.backoff.next_delay_and_advance() {
            Some(delay) => {
                self.reconnect_at = Some(Instant::now() + delay);
                self.set_status(ConnectionStatus::Reconnecting);
                warn!(
                    "Reconnect {}/{} scheduled in {:?}",
                    self.backoff.attempts(),
                    self.settings.backoff.max_attempts,
                    delay
                );
            }
            None => {
                self.reconnect_at = None;
                self.set_status(ConnectionStatus::GaveUp);
                error!(
                    "Max reconnection attempts ({}) reached; live updates disabled until connect() is called",
                    self.settings.backoff.max_attempts
                );
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match parse_frame(text) {
            Ok(Some(event)) => match &self.handler {
                Some(handler) => handler(event),
                None => debug!("No live event handler registered; dropping {:?}", event),
            },
            Ok(None) => trace!("Heartbeat reply received"),
            Err(e) => warn!("Dropping malformed live frame: {}", e),
        }
    }

    fn send_frame(&self, frame: ControlFrame) {
        let Some(link) = &self.link else {
            return;
        };
        match frame.to_text() {
            Ok(text) => {
                if link.send(Outgoing::Text(text)).is_err() {
                    debug!("Live feed writer is gone; {:?} not sent", frame);
                }
            }
            Err(e) => error!("Failed to encode {:?}: {}", frame, e),
        }
    }

    fn close_link(&mut self, reason: &str) {
        if let Some(link) = self.link.take() {
            let _ = link.send(Outgoing::Close {
                code: NORMAL_CLOSURE,
                reason: reason.to_string(),
            });
        }
        self.inbound = None;
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
        self.publish();
    }

    fn publish(&self) {
        self.state_tx.send_replace(ConnectionState {
            status: self.status,
            attempt: self.backoff.attempts(),
            next_delay: self.backoff.delay(),
            subscribed_date: self.subscribed,
        });
    }
}
