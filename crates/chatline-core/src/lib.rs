//! Core chatline primitives shared across crates.
//!
//! Includes channel identifiers, the wire envelope model, close-code
//! classification, the dedup ledger, the reconnect backoff scheduler, and the
//! base error type.

pub mod backoff;
pub mod channel;
pub mod close;
pub mod envelope;
pub mod error;
pub mod ledger;

pub use backoff::{BackoffPolicy, BackoffState};
pub use channel::ChannelId;
pub use close::{classify_close, CloseDisposition};
pub use envelope::{
    auth_frame, classify_value, parse_inbound, Author, ChatMessage, EnvelopeKind, IgnoreReason,
    Inbound, Notice, OutboundPayload, WireEnvelope,
};
pub use error::ChatError;
pub use ledger::DedupLedger;
