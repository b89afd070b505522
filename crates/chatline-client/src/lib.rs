//! Realtime channel connection manager.
//!
//! [`ChatClient`] binds one channel at a time and keeps its connection alive:
//! it authenticates each new link, retries abnormal closures with bounded
//! exponential backoff, deduplicates inbound messages, and maintains a
//! [`ChatView`] for the application. [`ConnectionController`] is the
//! per-channel state machine underneath and can be driven directly.

pub mod binding;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod endpoint;
pub mod events;
pub mod gateway;
pub mod history;
pub mod view;

pub use binding::{ChatClient, ChatClientHandle, ClientError};
pub use config::ClientConfig;
pub use controller::{ConnectionController, ControllerInput};
pub use credentials::{CredentialProvider, SharedToken, StaticToken};
pub use endpoint::{channel_socket_url, history_url};
pub use events::{FailureReason, LinkState, SessionEvent};
pub use gateway::SendError;
pub use history::{HistoryError, HistorySource, HttpHistorySource, NoHistory, StaticHistory};
pub use view::ChatView;
