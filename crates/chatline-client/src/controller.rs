//! Connection lifecycle controller.
//!
//! One controller serves one channel. Its transition functions are
//! synchronous: they update state, touch the transport handle, and push
//! [`SessionEvent`]s into an outbox that the owning task drains with
//! [`ConnectionController::take_events`]. The owning task feeds inputs back in
//! through [`ConnectionController::next_input`] and
//! [`ConnectionController::handle`].

use std::sync::Arc;

use chatline_core::close::{CLOSE_ABNORMAL, CLOSE_NORMAL};
use chatline_core::{
    auth_frame, classify_close, parse_inbound, BackoffPolicy, BackoffState, ChannelId,
    ChatMessage, CloseDisposition, DedupLedger, EnvelopeKind, Inbound, Notice,
};
use chatline_transport::{Connector, TransportEvent, TransportLink};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::credentials::{present_token, CredentialProvider};
use crate::endpoint::channel_socket_url;
use crate::events::{FailureReason, LinkState, SessionEvent};

/// Something the controller must react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerInput {
    Transport(TransportEvent),
    ReconnectDue,
}

pub struct ConnectionController {
    channel: ChannelId,
    url: String,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialProvider>,
    state: LinkState,
    backoff: BackoffState,
    ledger: DedupLedger,
    link: Option<TransportLink>,
    reconnect_at: Option<Instant>,
    last_error: Option<FailureReason>,
    outbox: Vec<SessionEvent>,
}

impl ConnectionController {
    pub fn new(
        channel: ChannelId,
        socket_base: &str,
        policy: BackoffPolicy,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let url = channel_socket_url(socket_base, &channel);
        Self {
            channel,
            url,
            connector,
            credentials,
            state: LinkState::Idle,
            backoff: BackoffState::new(policy),
            ledger: DedupLedger::new(),
            link: None,
            reconnect_at: None,
            last_error: None,
            outbox: Vec::new(),
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Consecutive abnormal closures since the last successful open.
    pub fn attempt(&self) -> u32 {
        self.backoff.attempt()
    }

    pub fn ledger(&self) -> &DedupLedger {
        &self.ledger
    }

    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    pub fn last_error(&self) -> Option<&FailureReason> {
        self.last_error.as_ref()
    }

    pub(crate) fn link(&self) -> Option<&TransportLink> {
        self.link.as_ref()
    }

    /// Starts (or restarts) the connection. Only acts from `Idle` or `Failed`.
    pub fn start(&mut self) {
        if !matches!(self.state, LinkState::Idle | LinkState::Failed) {
            debug!(channel = %self.channel, state = %self.state, "start ignored");
            return;
        }
        self.backoff.reset();
        self.reconnect_at = None;
        self.last_error = None;
        if present_token(self.credentials.as_ref()).is_none() {
            self.fail(FailureReason::MissingCredential);
            return;
        }
        self.open_link();
    }

    pub fn handle(&mut self, input: ControllerInput) {
        match input {
            ControllerInput::Transport(event) => self.handle_transport_event(event),
            ControllerInput::ReconnectDue => self.handle_reconnect_due(),
        }
    }

    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.on_opened(),
            TransportEvent::Text(text) => self.on_text(&text),
            TransportEvent::Closed { code, reason } => self.on_closed(code, &reason),
        }
    }

    pub fn handle_reconnect_due(&mut self) {
        if self.state != LinkState::Reconnecting || self.reconnect_at.take().is_none() {
            debug!(channel = %self.channel, state = %self.state, "stale reconnect timer");
            return;
        }
        self.open_link();
    }

    /// Clean shutdown. With a live link this waits in `Closing` for the
    /// transport to confirm; otherwise it is immediately `Idle`.
    pub fn close(&mut self) {
        self.reconnect_at = None;
        match self.link.as_ref() {
            Some(link) => {
                if let Err(err) = link.close(CLOSE_NORMAL, "unbind") {
                    debug!(channel = %self.channel, "close frame not queued: {err}");
                }
                self.set_state(LinkState::Closing);
            }
            None => self.set_state(LinkState::Idle),
        }
    }

    /// Closes any live link with 1000 and releases it without waiting.
    pub fn teardown(&mut self) {
        self.reconnect_at = None;
        if let Some(link) = self.link.take() {
            if let Err(err) = link.close(CLOSE_NORMAL, "channel released") {
                debug!(channel = %self.channel, "close frame not queued: {err}");
            }
        }
        self.set_state(LinkState::Idle);
    }

    /// Merges history through the ledger. Messages already surfaced are
    /// skipped; the rest are recorded and emitted as one batch.
    pub fn seed_history(&mut self, messages: Vec<ChatMessage>) {
        let fresh: Vec<ChatMessage> = messages
            .into_iter()
            .filter(|message| self.ledger.record(&message.id))
            .collect();
        if fresh.is_empty() {
            debug!(channel = %self.channel, "history added nothing new");
            return;
        }
        info!(channel = %self.channel, count = fresh.len(), "seeded history");
        self.outbox.push(SessionEvent::HistorySeeded(fresh));
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Waits for the next input. Never resolves when there is neither a link
    /// nor a pending reconnect.
    pub async fn next_input(&mut self) -> ControllerInput {
        if let Some(link) = self.link.as_mut() {
            return ControllerInput::Transport(link.next_event().await);
        }
        match self.reconnect_at {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                ControllerInput::ReconnectDue
            }
            None => std::future::pending().await,
        }
    }

    fn open_link(&mut self) {
        let link = self.connector.open(&self.url);
        info!(
            channel = %self.channel,
            link = link.id(),
            attempt = self.backoff.attempt(),
            "opening connection"
        );
        self.link = Some(link);
        self.set_state(LinkState::Connecting);
    }

    fn on_opened(&mut self) {
        if self.state != LinkState::Connecting {
            debug!(channel = %self.channel, state = %self.state, "unexpected open event");
            return;
        }
        let Some(token) = present_token(self.credentials.as_ref()) else {
            if let Some(link) = self.link.take() {
                let _ = link.close(CLOSE_NORMAL, "missing credential");
            }
            self.fail(FailureReason::MissingCredential);
            return;
        };
        self.set_state(LinkState::Authenticating);

        let frame = match auth_frame(&token) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(channel = %self.channel, "could not encode auth frame: {err}");
                self.abort_handshake("auth frame not encoded");
                return;
            }
        };
        let sent = match self.link.as_ref() {
            Some(link) => link.send_text(frame),
            None => return,
        };
        match sent {
            Ok(()) => self.promote_open(),
            Err(err) => {
                warn!(channel = %self.channel, "auth frame not written: {err}");
                self.abort_handshake("auth frame not written");
            }
        }
    }

    /// Drops a link whose handshake cannot complete and treats it as an
    /// abnormal closure.
    fn abort_handshake(&mut self, reason: &str) {
        if let Some(link) = self.link.take() {
            let _ = link.close(CLOSE_NORMAL, reason);
        }
        self.schedule_reconnect(CLOSE_ABNORMAL, reason);
    }

    fn promote_open(&mut self) {
        self.backoff.reset();
        self.last_error = None;
        self.set_state(LinkState::Open);
    }

    fn on_text(&mut self, text: &str) {
        match self.state {
            LinkState::Open => {}
            LinkState::Authenticating => self.promote_open(),
            _ => {
                debug!(channel = %self.channel, state = %self.state, "dropping frame outside open link");
                return;
            }
        }
        match parse_inbound(text) {
            Ok(Inbound::Visible(message)) => {
                if self.ledger.record(&message.id) {
                    self.outbox.push(SessionEvent::Message(message));
                } else {
                    debug!(channel = %self.channel, id = %message.id, "duplicate message dropped");
                }
            }
            Ok(Inbound::Notice(notice)) => self.outbox.push(SessionEvent::Notice(notice)),
            Ok(Inbound::Ignored(reason)) => {
                debug!(channel = %self.channel, "ignoring envelope: {reason}");
            }
            Err(err) => warn!(channel = %self.channel, "dropping inbound frame: {err}"),
        }
    }

    fn on_closed(&mut self, code: u16, reason: &str) {
        match self.state {
            LinkState::Closing => {
                self.link = None;
                info!(channel = %self.channel, code, "connection closed");
                self.set_state(LinkState::Idle);
            }
            LinkState::Idle | LinkState::Failed | LinkState::Reconnecting => {
                debug!(channel = %self.channel, state = %self.state, code, "stale close event");
            }
            LinkState::Connecting | LinkState::Authenticating | LinkState::Open => {
                self.link = None;
                match classify_close(code) {
                    CloseDisposition::Clean => {
                        info!(channel = %self.channel, code, "server closed the connection");
                        self.outbox.push(SessionEvent::Notice(Notice {
                            kind: EnvelopeKind::Disconnect,
                            author: Default::default(),
                            content: (!reason.is_empty()).then(|| reason.to_string()),
                        }));
                        self.set_state(LinkState::Idle);
                    }
                    CloseDisposition::Unauthorized => {
                        self.fail(FailureReason::Unauthorized { code });
                    }
                    CloseDisposition::Abnormal => self.schedule_reconnect(code, reason),
                }
            }
        }
    }

    fn schedule_reconnect(&mut self, code: u16, reason: &str) {
        match self.backoff.next_delay() {
            Some(delay) => {
                warn!(
                    channel = %self.channel,
                    code,
                    reason,
                    attempt = self.backoff.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    "connection lost, scheduling reconnect"
                );
                self.reconnect_at = Some(Instant::now() + delay);
                self.set_state(LinkState::Reconnecting);
            }
            None => {
                let attempts = self.backoff.attempt();
                self.fail(FailureReason::RetriesExhausted { attempts });
            }
        }
    }

    fn fail(&mut self, reason: FailureReason) {
        error!(channel = %self.channel, "connection failed: {reason}");
        self.link = None;
        self.reconnect_at = None;
        self.last_error = Some(reason.clone());
        self.set_state(LinkState::Failed);
        self.outbox.push(SessionEvent::Failed { reason });
    }

    fn set_state(&mut self, state: LinkState) {
        if self.state == state {
            return;
        }
        debug!(channel = %self.channel, from = %self.state, to = %state, "state transition");
        self.state = state;
        self.outbox.push(SessionEvent::StateChanged(state));
    }
}
