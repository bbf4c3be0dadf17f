/*
[INPUT]:  Credentials, session config, caller callback and channel intents
[OUTPUT]: Authenticated stream frames delivered to the callback, state via watch
[POS]:    WebSocket layer - session driver (heartbeat, auth grace, reconnect)
[UPDATE]: When changing reconnect policy, heartbeat or public session API
*/

use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::auth::Credentials;
use crate::http::client::websocket_url_for;
use crate::http::{CodexError, DEFAULT_BASE_URL, Result};
use crate::ws::machine::{Action, CALLER_CLOSE_CODE, SessionMachine, SessionState};
use crate::ws::message::{Channel, OutboundFrame};
use crate::ws::transport::{
    Connector, Transport, TransportCommand, TransportEvent, TungsteniteConnector,
};

/// Caller callback for data frames
pub type MessageCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// WebSocket session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: Url,
    pub ping_interval: Duration,
    pub reconnect_delay: Duration,
    /// Silence after `token_auth` that counts as authorization
    pub auth_grace: Duration,
    pub close_code: u16,
}

impl SessionConfig {
    /// Default timings against an explicit endpoint
    pub fn new(url: Url) -> Self {
        Self {
            url,
            ping_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
            auth_grace: Duration::from_secs(2),
            close_code: CALLER_CLOSE_CODE,
        }
    }

    /// Config for the streaming endpoint on the host of `base_url`
    pub fn for_base_url(base_url: &str) -> Result<Self> {
        Ok(Self::new(websocket_url_for(base_url)?))
    }

    /// Streaming endpoint of the public Codex API
    pub fn production() -> Result<Self> {
        Self::for_base_url(DEFAULT_BASE_URL)
    }
}

#[derive(Debug, Clone)]
struct RunControl {
    cancel: CancellationToken,
    finished: CancellationToken,
}

impl RunControl {
    fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
        }
    }
}

struct Shared {
    machine: Mutex<SessionMachine>,
    state_tx: watch::Sender<SessionState>,
    outbound: Mutex<Option<mpsc::Sender<TransportCommand>>>,
    run: Mutex<Option<RunControl>>,
    last_error: Mutex<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    /// Run `f` on the machine and publish the resulting state
    fn update<R>(&self, f: impl FnOnce(&mut SessionMachine) -> R) -> R {
        let mut machine = lock(&self.machine);
        let result = f(&mut machine);
        self.state_tx.send_replace(machine.state());
        result
    }

    fn active_run(&self) -> Option<RunControl> {
        lock(&self.run)
            .as_ref()
            .filter(|run| !run.finished.is_cancelled())
            .cloned()
    }

    fn set_outbound(&self, sender: Option<mpsc::Sender<TransportCommand>>) {
        *lock(&self.outbound) = sender;
    }

    /// Send a caller-initiated frame. A transport that went away since the
    /// machine update is not an error: the desired set is flushed again at
    /// the next authentication.
    async fn send_live(&self, frame: &OutboundFrame) -> Result<()> {
        match self.send_frame(frame).await {
            Err(CodexError::NotConnected | CodexError::Transport(_)) => {
                debug!(frame = frame.kind(), "transport gone, frame deferred to next authentication");
                Ok(())
            }
            result => result,
        }
    }

    async fn send_frame(&self, frame: &OutboundFrame) -> Result<()> {
        let sender = lock(&self.outbound).clone().ok_or(CodexError::NotConnected)?;
        let text = serde_json::to_string(frame)?;
        sender
            .send(TransportCommand::Text(text))
            .await
            .map_err(|_| CodexError::Transport("websocket send channel closed".to_string()))?;
        log_frame_sent(frame);
        Ok(())
    }
}

/// Handle returned by [`WebSocketSession::connect`]
#[derive(Clone)]
pub struct SessionHandle {
    state_rx: watch::Receiver<SessionState>,
    finished: CancellationToken,
    shared: Arc<Shared>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Wait until the session stops for good. Returns the authentication
    /// error if the server rejected our signature.
    pub async fn closed(&self) -> Result<()> {
        self.finished.cancelled().await;
        match lock(&self.shared.last_error).clone() {
            Some(message) => Err(CodexError::Authentication { message }),
            None => Ok(()),
        }
    }

    /// Authentication failure that stopped the session, if any
    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.last_error).clone()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_cancelled()
    }
}

/// Long-lived authenticated stream with transparent reconnect.
///
/// The desired channel set survives reconnects and is re-sent after each
/// successful authentication.
pub struct WebSocketSession {
    shared: Arc<Shared>,
    config: SessionConfig,
    connector: Arc<dyn Connector>,
}

impl WebSocketSession {
    pub fn new(config: SessionConfig, credentials: Credentials) -> Self {
        Self::with_connector(config, credentials, Arc::new(TungsteniteConnector))
    }

    /// Session over a custom transport
    pub fn with_connector(
        config: SessionConfig,
        credentials: Credentials,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let machine = SessionMachine::with_close_code(credentials, config.close_code);
        let (state_tx, _rx) = watch::channel(machine.state());
        Self {
            shared: Arc::new(Shared {
                machine: Mutex::new(machine),
                state_tx,
                outbound: Mutex::new(None),
                run: Mutex::new(None),
                last_error: Mutex::new(None),
            }),
            config,
            connector,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    /// Desired channel set, sorted
    pub fn channels(&self) -> Vec<Channel> {
        lock(&self.shared.machine).channels()
    }

    /// Replace credentials; takes effect at the next handshake
    pub fn set_credentials(&self, credentials: Credentials) {
        self.shared.update(|machine| machine.set_credentials(credentials));
    }

    /// Start the session if it is not already running.
    ///
    /// Returns after the first dial attempt. A failed dial is not an error:
    /// it is logged and retried after `reconnect_delay`.
    pub async fn connect<F>(&self, on_message: F) -> Result<SessionHandle>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let run = {
            let mut guard = lock(&self.shared.run);
            if let Some(run) = guard.as_ref().filter(|run| !run.finished.is_cancelled()) {
                debug!("websocket session already running");
                return Ok(self.handle(run));
            }
            let run = RunControl::new();
            *guard = Some(run.clone());
            run
        };

        *lock(&self.shared.last_error) = None;
        self.shared.update(|machine| machine.start());

        let (dialed_tx, dialed_rx) = oneshot::channel();
        let worker = SessionWorker {
            shared: self.shared.clone(),
            connector: self.connector.clone(),
            config: self.config.clone(),
            on_message: Arc::new(on_message),
            run: run.clone(),
            dialed: Some(dialed_tx),
        };
        tokio::spawn(worker.run());

        let _ = dialed_rx.await;
        Ok(self.handle(&run))
    }

    /// Add a channel to the desired set, sending it now if authenticated
    pub async fn subscribe(&self, channel: impl Into<Channel>) -> Result<()> {
        let channel = channel.into();
        match self.shared.update(|machine| machine.subscribe(channel.clone())) {
            Some(frame) => self.shared.send_live(&frame).await,
            None => {
                debug!(%channel, "channel queued until authenticated");
                Ok(())
            }
        }
    }

    /// Remove a channel from the desired set, sending it now if authenticated
    pub async fn unsubscribe(&self, channel: impl Into<Channel>) -> Result<()> {
        let channel = channel.into();
        match self.shared.update(|machine| machine.unsubscribe(&channel)) {
            Some(frame) => self.shared.send_live(&frame).await,
            None => Ok(()),
        }
    }

    /// Close with the caller code and stop reconnecting.
    ///
    /// Fails with [`CodexError::NotConnected`] when no session is running.
    /// Cancels a pending reconnect when called during backoff.
    pub async fn disconnect(&self) -> Result<()> {
        let run = self.shared.active_run().ok_or_else(|| {
            info!("websocket not open, call connect first");
            CodexError::NotConnected
        })?;

        info!("websocket session disconnecting");
        self.shared.update(|machine| machine.request_close());
        run.cancel.cancel();
        run.finished.cancelled().await;
        info!("websocket session disconnected");
        Ok(())
    }

    pub async fn start_order_book(&self, market: &str) -> Result<()> {
        self.subscribe(Channel::order_book(market)).await
    }

    pub async fn stop_order_book(&self, market: &str) -> Result<()> {
        self.unsubscribe(Channel::order_book(market)).await
    }

    pub async fn start_trades(&self, market: &str) -> Result<()> {
        self.subscribe(Channel::trades(market)).await
    }

    pub async fn stop_trades(&self, market: &str) -> Result<()> {
        self.unsubscribe(Channel::trades(market)).await
    }

    pub async fn start_tickers(&self) -> Result<()> {
        self.subscribe(Channel::tickers()).await
    }

    pub async fn stop_tickers(&self) -> Result<()> {
        self.unsubscribe(Channel::tickers()).await
    }

    fn handle(&self, run: &RunControl) -> SessionHandle {
        SessionHandle {
            state_rx: self.shared.state_tx.subscribe(),
            finished: run.finished.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl Drop for WebSocketSession {
    fn drop(&mut self) {
        if let Some(run) = self.shared.active_run() {
            self.shared.update(|machine| machine.request_close());
            run.cancel.cancel();
        }
    }
}

/// Marks the run finished however the worker exits, unwinding included
struct WorkerExit {
    shared: Arc<Shared>,
    finished: CancellationToken,
}

impl Drop for WorkerExit {
    fn drop(&mut self) {
        self.shared.set_outbound(None);
        self.shared.update(SessionMachine::request_close);
        self.finished.cancel();
        debug!("websocket session worker stopped");
    }
}

enum Step {
    Cancelled,
    Heartbeat,
    AuthGrace,
    Event(Option<TransportEvent>),
}

struct SessionWorker {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    config: SessionConfig,
    on_message: MessageCallback,
    run: RunControl,
    dialed: Option<oneshot::Sender<()>>,
}

impl SessionWorker {
    async fn run(mut self) {
        let _exit = WorkerExit {
            shared: self.shared.clone(),
            finished: self.run.finished.clone(),
        };

        loop {
            if self.run.cancel.is_cancelled() {
                break;
            }

            self.shared.update(|machine| machine.begin_connect());
            info!(url = %self.config.url, "connecting to codex websocket");

            let dial = tokio::select! {
                _ = self.run.cancel.cancelled() => None,
                result = self.connector.connect(&self.config.url) => Some(result),
            };
            self.notify_dialed();

            let close_code = match dial {
                None => break,
                Some(Ok(transport)) => {
                    info!(url = %self.config.url, "websocket connected");
                    self.drive(transport).await
                }
                Some(Err(err)) => {
                    warn!(error = %err, "websocket dial failed");
                    None
                }
            };

            self.shared.set_outbound(None);
            let actions = self.shared.update(|machine| machine.on_closed(close_code));
            info!(code = ?close_code, "websocket connection closed");

            if !actions.contains(&Action::ScheduleReconnect) {
                break;
            }

            info!(delay = ?self.config.reconnect_delay, "scheduling websocket reconnect");
            tokio::select! {
                _ = self.run.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }

        self.notify_dialed();
    }

    /// Pump one connection until it closes; returns the close code
    async fn drive(&mut self, transport: Transport) -> Option<u16> {
        let Transport {
            commands,
            mut events,
        } = transport;
        self.shared.set_outbound(Some(commands.clone()));

        let mut heartbeat: Option<Interval> = None;
        let mut auth_grace: Option<Pin<Box<Sleep>>> = None;
        let mut close_sent = false;

        let actions = self.shared.update(|machine| machine.on_open());
        self.apply(actions, &commands, &mut heartbeat, &mut auth_grace, &mut close_sent)
            .await;

        loop {
            let step = tokio::select! {
                biased;
                _ = self.run.cancel.cancelled() => Step::Cancelled,
                event = events.recv() => Step::Event(event),
                _ = next_tick(&mut heartbeat) => Step::Heartbeat,
                _ = grace_elapsed(&mut auth_grace) => Step::AuthGrace,
            };

            match step {
                Step::Cancelled => {
                    let code = self.config.close_code;
                    if !close_sent {
                        let _ = commands.send(TransportCommand::Close(code)).await;
                    }
                    return Some(code);
                }
                Step::Heartbeat => {
                    debug!("sending websocket ping");
                    if commands.send(TransportCommand::Ping).await.is_err() {
                        warn!("websocket ping failed, transport gone");
                        return None;
                    }
                }
                Step::AuthGrace => {
                    auth_grace = None;
                    let actions = self.shared.update(|machine| machine.on_auth_grace_elapsed());
                    self.apply(actions, &commands, &mut heartbeat, &mut auth_grace, &mut close_sent)
                        .await;
                }
                Step::Event(Some(TransportEvent::Text(text))) => {
                    let actions = self.shared.update(|machine| machine.on_text(&text));
                    self.apply(actions, &commands, &mut heartbeat, &mut auth_grace, &mut close_sent)
                        .await;
                }
                Step::Event(Some(TransportEvent::Pong)) => debug!("received pong message"),
                Step::Event(Some(TransportEvent::Error(err))) => {
                    warn!(error = %err, "websocket transport error");
                }
                Step::Event(Some(TransportEvent::Closed { code, reason })) => {
                    info!(code = ?code, %reason, "websocket closed by transport");
                    return code;
                }
                Step::Event(None) => return None,
            }
        }
    }

    async fn apply(
        &mut self,
        actions: Vec<Action>,
        commands: &mpsc::Sender<TransportCommand>,
        heartbeat: &mut Option<Interval>,
        auth_grace: &mut Option<Pin<Box<Sleep>>>,
        close_sent: &mut bool,
    ) {
        for action in actions {
            match action {
                Action::Send(frame) => {
                    if let Err(err) = self.shared.send_frame(&frame).await {
                        warn!(error = %err, frame = frame.kind(), "failed to send websocket frame");
                    }
                }
                Action::Deliver(value) => {
                    let on_message = &self.on_message;
                    if panic::catch_unwind(AssertUnwindSafe(|| on_message(value))).is_err() {
                        error!("message callback panicked, frame dropped");
                    }
                }
                Action::StartHeartbeat => {
                    let period = self.config.ping_interval;
                    *heartbeat = Some(tokio::time::interval_at(Instant::now() + period, period));
                }
                Action::StopHeartbeat => *heartbeat = None,
                Action::ArmAuthGrace => {
                    *auth_grace = Some(Box::pin(tokio::time::sleep(self.config.auth_grace)));
                }
                Action::ScheduleReconnect => {}
                Action::AuthRejected { message } => {
                    error!(%message, "websocket authentication rejected");
                    *lock(&self.shared.last_error) = Some(message);
                    self.run.cancel.cancel();
                }
                Action::Close { code } => {
                    *close_sent = true;
                    let _ = commands.send(TransportCommand::Close(code)).await;
                }
            }
        }
    }

    fn notify_dialed(&mut self) {
        if let Some(dialed) = self.dialed.take() {
            let _ = dialed.send(());
        }
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn grace_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

fn log_frame_sent(frame: &OutboundFrame) {
    match frame {
        OutboundFrame::Subscribe { channels } | OutboundFrame::Unsubscribe { channels } => {
            let channels: Vec<&str> = channels.iter().map(Channel::as_str).collect();
            info!(action = frame.kind(), ?channels, "ws subscription sent");
        }
        OutboundFrame::TokenAuthRequest { .. } => info!("ws authentication requested"),
        OutboundFrame::TokenAuth { .. } => info!("ws signature sent"),
    }
}
