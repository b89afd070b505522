//! Channel binding: the task that owns the active controller.
//!
//! `ChatClient` runs as a single tokio task. Handles talk to it over an mpsc
//! command queue; it applies every session event to the shared [`ChatView`]
//! and republishes it on a broadcast channel.

use std::sync::{Arc, Mutex, MutexGuard};

use chatline_core::{ChannelId, ChatMessage, OutboundPayload};
use chatline_transport::Connector;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::controller::{ConnectionController, ControllerInput};
use crate::credentials::CredentialProvider;
use crate::events::{LinkState, SessionEvent};
use crate::history::{HistoryError, HistorySource};
use crate::view::ChatView;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("chat client has stopped")]
    Stopped,
}

enum Command {
    Bind {
        channel: String,
        done: oneshot::Sender<()>,
    },
    Unbind {
        done: oneshot::Sender<()>,
    },
    Send {
        payload: OutboundPayload,
        reply: oneshot::Sender<bool>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

struct HistoryResult {
    generation: u64,
    channel: ChannelId,
    result: Result<Vec<ChatMessage>, HistoryError>,
}

pub struct ChatClient {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialProvider>,
    history: Arc<dyn HistorySource>,
    controller: Option<ConnectionController>,
    /// The controller is closing after an unbind and is dropped once idle.
    retiring: bool,
    /// Bumped on every bind/unbind; history answers for older values are stale.
    generation: u64,
    view: Arc<Mutex<ChatView>>,
    events: broadcast::Sender<SessionEvent>,
    history_tx: mpsc::UnboundedSender<HistoryResult>,
    history_rx: mpsc::UnboundedReceiver<HistoryResult>,
}

impl ChatClient {
    /// Spawns the client task on the current runtime.
    pub fn spawn(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialProvider>,
        history: Arc<dyn HistorySource>,
    ) -> ChatClientHandle {
        let (command_tx, command_rx) = mpsc::channel(config.command_capacity.max(1));
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (history_tx, history_rx) = mpsc::unbounded_channel();
        let view = Arc::new(Mutex::new(ChatView::default()));

        let client = ChatClient {
            config,
            connector,
            credentials,
            history,
            controller: None,
            retiring: false,
            generation: 0,
            view: Arc::clone(&view),
            events: events.clone(),
            history_tx,
            history_rx,
        };
        tokio::spawn(client.run(command_rx));

        ChatClientHandle {
            commands: command_tx,
            view,
            events,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { done }) => {
                        self.shutdown();
                        let _ = done.send(());
                        return;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.shutdown();
                        return;
                    }
                },
                input = controller_input(&mut self.controller) => {
                    if let Some(controller) = self.controller.as_mut() {
                        controller.handle(input);
                    }
                    self.flush();
                }
                Some(result) = self.history_rx.recv() => self.apply_history(result),
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Bind { channel, done } => {
                self.bind(&channel);
                let _ = done.send(());
            }
            Command::Unbind { done } => {
                self.unbind();
                let _ = done.send(());
            }
            Command::Send { payload, reply } => {
                let sent = match self.controller.as_ref() {
                    Some(controller) => match controller.send(&payload) {
                        Ok(()) => true,
                        Err(err) => {
                            debug!(channel = %controller.channel(), "send refused: {err}");
                            false
                        }
                    },
                    None => false,
                };
                let _ = reply.send(sent);
            }
            Command::Shutdown { done } => {
                self.shutdown();
                let _ = done.send(());
            }
        }
    }

    fn bind(&mut self, raw: &str) {
        let channel = match ChannelId::parse(raw) {
            Ok(channel) => channel,
            Err(err) => {
                warn!(channel = raw, "refusing to bind: {err}");
                self.release();
                self.generation += 1;
                self.publish(SessionEvent::Unbound {
                    reason: Some(err.to_string()),
                });
                return;
            }
        };

        if !self.retiring {
            if let Some(current) = self.controller.as_mut() {
                if current.channel() == &channel {
                    if matches!(current.state(), LinkState::Failed | LinkState::Idle) {
                        info!(%channel, "restarting channel");
                        current.start();
                        self.flush();
                    }
                    return;
                }
            }
        }

        self.release();
        self.generation += 1;
        info!(%channel, "binding channel");
        self.publish(SessionEvent::Bound {
            channel: channel.clone(),
        });
        let mut controller = ConnectionController::new(
            channel.clone(),
            &self.config.socket_base,
            self.config.backoff_policy(),
            Arc::clone(&self.connector),
            Arc::clone(&self.credentials),
        );
        controller.start();
        let started = controller.state() != LinkState::Failed;
        self.controller = Some(controller);
        self.flush();
        if started {
            self.request_history(channel);
        }
    }

    fn unbind(&mut self) {
        self.generation += 1;
        match self.controller.as_mut() {
            Some(controller) => {
                info!(channel = %controller.channel(), "unbinding channel");
                controller.close();
                self.retiring = true;
                self.flush();
            }
            None => self.publish(SessionEvent::Unbound { reason: None }),
        }
    }

    fn shutdown(&mut self) {
        info!("chat client shutting down");
        self.generation += 1;
        if self.controller.is_some() {
            self.release();
            self.publish(SessionEvent::Unbound { reason: None });
        }
    }

    /// Tears down the current controller, if any, without waiting for the
    /// transport.
    fn release(&mut self) {
        self.retiring = false;
        if let Some(mut controller) = self.controller.take() {
            controller.teardown();
            for event in controller.take_events() {
                self.publish(event);
            }
        }
    }

    fn request_history(&self, channel: ChannelId) {
        let source = Arc::clone(&self.history);
        let tx = self.history_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = source.fetch_messages(&channel).await;
            let _ = tx.send(HistoryResult {
                generation,
                channel,
                result,
            });
        });
    }

    fn apply_history(&mut self, history: HistoryResult) {
        if history.generation != self.generation {
            debug!(channel = %history.channel, "discarding stale history");
            return;
        }
        match history.result {
            Ok(messages) => {
                if let Some(controller) = self.controller.as_mut() {
                    controller.seed_history(messages);
                }
                self.flush();
            }
            Err(err) => warn!(channel = %history.channel, "history unavailable: {err}"),
        }
    }

    /// Publishes pending controller events and drops a retiring controller
    /// once it has gone idle.
    fn flush(&mut self) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        let events = controller.take_events();
        let reap = self.retiring && controller.state() == LinkState::Idle;
        for event in events {
            self.publish(event);
        }
        if reap {
            self.controller = None;
            self.retiring = false;
            self.publish(SessionEvent::Unbound { reason: None });
        }
    }

    fn publish(&self, event: SessionEvent) {
        lock(&self.view).apply(&event);
        let _ = self.events.send(event);
    }
}

async fn controller_input(controller: &mut Option<ConnectionController>) -> ControllerInput {
    match controller {
        Some(controller) => controller.next_input().await,
        None => std::future::pending().await,
    }
}

fn lock(view: &Mutex<ChatView>) -> MutexGuard<'_, ChatView> {
    view.lock().unwrap_or_else(|e| e.into_inner())
}

/// Cloneable application handle to a running [`ChatClient`].
#[derive(Clone)]
pub struct ChatClientHandle {
    commands: mpsc::Sender<Command>,
    view: Arc<Mutex<ChatView>>,
    events: broadcast::Sender<SessionEvent>,
}

impl ChatClientHandle {
    /// Selects `channel`. Resolves once the client has acted on it.
    pub async fn bind(&self, channel: &str) -> Result<(), ClientError> {
        let (done, wait) = oneshot::channel();
        self.request(Command::Bind {
            channel: channel.to_string(),
            done,
        })
        .await?;
        wait.await.map_err(|_| ClientError::Stopped)
    }

    pub async fn unbind(&self) -> Result<(), ClientError> {
        let (done, wait) = oneshot::channel();
        self.request(Command::Unbind { done }).await?;
        wait.await.map_err(|_| ClientError::Stopped)
    }

    /// Returns whether the payload was handed to an open connection.
    pub async fn send(&self, payload: impl Into<OutboundPayload>) -> bool {
        let (reply, wait) = oneshot::channel();
        let command = Command::Send {
            payload: payload.into(),
            reply,
        };
        if self.request(command).await.is_err() {
            return false;
        }
        wait.await.unwrap_or(false)
    }

    /// Closes the live connection with 1000 and stops the client task.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        let (done, wait) = oneshot::channel();
        self.request(Command::Shutdown { done }).await?;
        wait.await.map_err(|_| ClientError::Stopped)
    }

    pub fn view(&self) -> ChatView {
        lock(&self.view).clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.view).messages.clone()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.view).connected
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.view).last_error.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn request(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::Stopped)
    }
}
