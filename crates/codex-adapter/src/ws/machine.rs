/*
[INPUT]:  Transport events (open, text frame, close), caller intents, grace timer
[OUTPUT]: Session state transitions and the actions the driver must perform
[POS]:    WebSocket layer - pure authentication/subscription state machine (no I/O)
[UPDATE]: When changing handshake steps, reconnect policy or channel bookkeeping
*/

use std::collections::BTreeSet;
use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::Credentials;
use crate::ws::message::{Channel, InboundFrame, OutboundFrame};

/// Close code that marks a caller-initiated close; never auto-reconnects
pub const CALLER_CLOSE_CODE: u16 = 4000;

const RAW_LOG_MAX_BYTES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingAuthChallenge,
    Authenticating,
    Authenticated,
    Closing,
}

impl SessionState {
    /// Transport is up (handshake in progress or done)
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            SessionState::AwaitingAuthChallenge
                | SessionState::Authenticating
                | SessionState::Authenticated
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::AwaitingAuthChallenge => "awaiting_auth_challenge",
            SessionState::Authenticating => "authenticating",
            SessionState::Authenticated => "authenticated",
            SessionState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Side effects requested by the machine, executed by the session driver
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Send(OutboundFrame),
    /// Hand a data frame to the caller's callback
    Deliver(Value),
    StartHeartbeat,
    StopHeartbeat,
    /// Start the timer after which silence counts as authorization
    ArmAuthGrace,
    ScheduleReconnect,
    /// Server rejected our signature; surface it and stop
    AuthRejected { message: String },
    Close { code: u16 },
}

/// Owns the session state and the desired channel set.
#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    channels: BTreeSet<Channel>,
    credentials: Credentials,
    close_code: u16,
    close_requested: bool,
}

impl SessionMachine {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_close_code(credentials, CALLER_CLOSE_CODE)
    }

    pub fn with_close_code(credentials: Credentials, close_code: u16) -> Self {
        Self {
            state: SessionState::Disconnected,
            channels: BTreeSet::new(),
            credentials,
            close_code,
            close_requested: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Desired channel set, sorted
    pub fn channels(&self) -> Vec<Channel> {
        self.channels.iter().cloned().collect()
    }

    pub fn close_code(&self) -> u16 {
        self.close_code
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    /// Replace credentials; used from the next handshake on
    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = credentials;
    }

    /// A caller `connect()` starts a fresh lifecycle
    pub fn start(&mut self) {
        self.close_requested = false;
    }

    /// A dial attempt is about to start
    pub fn begin_connect(&mut self) {
        if self.close_requested {
            return;
        }
        self.state = SessionState::Connecting;
    }

    /// Transport opened: start heartbeat and ask for a challenge
    pub fn on_open(&mut self) -> Vec<Action> {
        if self.state != SessionState::Connecting {
            debug!(state = %self.state, "ignoring transport open");
            return Vec::new();
        }
        self.state = SessionState::AwaitingAuthChallenge;
        vec![
            Action::StartHeartbeat,
            Action::Send(OutboundFrame::TokenAuthRequest {
                public_key: self.credentials.public_key().to_string(),
            }),
        ]
    }

    /// Inbound text frame. Malformed frames are logged and dropped.
    pub fn on_text(&mut self, text: &str) -> Vec<Action> {
        match InboundFrame::parse(text) {
            Ok(frame) => self.on_frame(frame),
            Err(err) => {
                warn!(
                    error = %err,
                    bytes = text.len(),
                    message = %truncate_for_log(text, RAW_LOG_MAX_BYTES),
                    "ws message parse failed"
                );
                Vec::new()
            }
        }
    }

    pub fn on_frame(&mut self, frame: InboundFrame) -> Vec<Action> {
        match frame {
            InboundFrame::Challenge { description } => self.on_challenge(&description),
            InboundFrame::Authorized => {
                if self.state == SessionState::Authenticating {
                    self.complete_auth()
                } else {
                    debug!(state = %self.state, "ignoring authorization outside handshake");
                    Vec::new()
                }
            }
            InboundFrame::Data(value) => match self.state {
                SessionState::Authenticating => {
                    let mut actions = self.complete_auth();
                    actions.push(Action::Deliver(value));
                    actions
                }
                SessionState::AwaitingAuthChallenge | SessionState::Authenticated => {
                    vec![Action::Deliver(value)]
                }
                _ => Vec::new(),
            },
        }
    }

    /// Grace period after `token_auth` passed without a new challenge
    pub fn on_auth_grace_elapsed(&mut self) -> Vec<Action> {
        if self.state == SessionState::Authenticating {
            self.complete_auth()
        } else {
            Vec::new()
        }
    }

    /// Transport closed or failed
    pub fn on_closed(&mut self, code: Option<u16>) -> Vec<Action> {
        let caller_initiated = self.close_requested || code == Some(self.close_code);
        if caller_initiated || self.state == SessionState::Closing {
            self.close_requested = true;
            self.state = SessionState::Closing;
            return vec![Action::StopHeartbeat];
        }

        self.state = SessionState::Disconnected;
        vec![Action::StopHeartbeat, Action::ScheduleReconnect]
    }

    /// Caller asked to disconnect: no reconnect from here on
    pub fn request_close(&mut self) {
        self.close_requested = true;
        self.state = SessionState::Closing;
    }

    /// Add to desired state; returns the live frame to send when authenticated
    pub fn subscribe(&mut self, channel: Channel) -> Option<OutboundFrame> {
        self.channels.insert(channel.clone());
        (self.state == SessionState::Authenticated).then(|| OutboundFrame::Subscribe {
            channels: vec![channel],
        })
    }

    /// Remove from desired state; returns the live frame to send when authenticated
    pub fn unsubscribe(&mut self, channel: &Channel) -> Option<OutboundFrame> {
        self.channels.remove(channel);
        (self.state == SessionState::Authenticated).then(|| OutboundFrame::Unsubscribe {
            channels: vec![channel.clone()],
        })
    }

    fn on_challenge(&mut self, description: &str) -> Vec<Action> {
        match self.state {
            SessionState::AwaitingAuthChallenge | SessionState::Authenticated => {
                let signature = self.credentials.signer().sign_hex(description.as_bytes());
                self.state = SessionState::Authenticating;
                vec![
                    Action::Send(OutboundFrame::TokenAuth { signature }),
                    Action::ArmAuthGrace,
                ]
            }
            SessionState::Authenticating => {
                self.close_requested = true;
                self.state = SessionState::Closing;
                vec![
                    Action::AuthRejected {
                        message: "server repeated the auth challenge after token_auth".to_string(),
                    },
                    Action::StopHeartbeat,
                    Action::Close {
                        code: self.close_code,
                    },
                ]
            }
            _ => {
                debug!(state = %self.state, "ignoring auth challenge");
                Vec::new()
            }
        }
    }

    fn complete_auth(&mut self) -> Vec<Action> {
        self.state = SessionState::Authenticated;
        if self.channels.is_empty() {
            return Vec::new();
        }
        vec![Action::Send(OutboundFrame::Subscribe {
            channels: self.channels(),
        })]
    }
}

pub(crate) fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}
