//! Transport abstractions for chatline.
//!
//! The lifecycle controller only depends on the text-frame `Connector` and
//! `TransportLink` contracts defined in this crate.

pub mod link;
pub mod memory;

pub use link::{
    link_pair, Connector, LinkEndpoint, OutboundFrame, TransportError, TransportEvent,
    TransportLink,
};
pub use memory::{MemoryConnector, MemoryPeer};
