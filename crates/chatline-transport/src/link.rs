use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;

/// Close code reported when a link ends without a close frame from the peer.
pub const LINK_LOST_CODE: u16 = 1006;

static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// Event delivered by a transport worker to the owner of a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established and frames may be written.
    Opened,
    /// One inbound text frame.
    Text(String),
    /// The connection ended. Establishment failures and abrupt loss are
    /// reported as code 1006.
    Closed { code: u16, reason: String },
}

/// Frame queued by the link owner for the transport worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("link is closed")]
    Closed,
    #[error("outbound queue is full")]
    QueueFull,
}

/// Factory for persistent bidirectional text-frame connections.
///
/// `open` must not block: it hands back a fresh link immediately and the
/// worker behind it reports `Opened` or `Closed` once establishment resolves.
/// Every call creates a new connection; links are never reused.
pub trait Connector: Send + Sync {
    fn open(&self, url: &str) -> TransportLink;
}

/// Owner side of one connection.
#[derive(Debug)]
pub struct TransportLink {
    id: u64,
    outbound: mpsc::Sender<OutboundFrame>,
    events: mpsc::Receiver<TransportEvent>,
}

/// Worker side of one connection.
#[derive(Debug)]
pub struct LinkEndpoint {
    pub id: u64,
    pub outbound: mpsc::Receiver<OutboundFrame>,
    pub events: mpsc::Sender<TransportEvent>,
}

/// Creates a connected owner/worker pair with bounded queues.
pub fn link_pair(outbound_capacity: usize, event_capacity: usize) -> (TransportLink, LinkEndpoint) {
    let id = NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed);
    let (outbound_tx, outbound_rx) = mpsc::channel(outbound_capacity.max(1));
    let (events_tx, events_rx) = mpsc::channel(event_capacity.max(1));
    (
        TransportLink {
            id,
            outbound: outbound_tx,
            events: events_rx,
        },
        LinkEndpoint {
            id,
            outbound: outbound_rx,
            events: events_tx,
        },
    )
}

impl TransportLink {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queues one text frame without waiting.
    pub fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.push(OutboundFrame::Text(text))
    }

    /// Asks the worker to close the connection with `code`.
    pub fn close(&self, code: u16, reason: &str) -> Result<(), TransportError> {
        self.push(OutboundFrame::Close {
            code,
            reason: reason.to_string(),
        })
    }

    fn push(&self, frame: OutboundFrame) -> Result<(), TransportError> {
        self.outbound.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => TransportError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    /// Waits for the next event. A worker that went away without reporting
    /// closure is surfaced as an abnormal close.
    pub async fn next_event(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => TransportEvent::Closed {
                code: LINK_LOST_CODE,
                reason: "transport worker exited".to_string(),
            },
        }
    }

    pub fn try_next_event(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_ids_are_unique() {
        let (a, _a_end) = link_pair(1, 1);
        let (b, _b_end) = link_pair(1, 1);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn frames_flow_to_the_worker_side() {
        let (link, mut endpoint) = link_pair(4, 4);
        link.send_text("one".into()).expect("queue has room");
        link.close(1000, "bye").expect("queue has room");
        assert_eq!(
            endpoint.outbound.try_recv().ok(),
            Some(OutboundFrame::Text("one".into()))
        );
        assert_eq!(
            endpoint.outbound.try_recv().ok(),
            Some(OutboundFrame::Close {
                code: 1000,
                reason: "bye".into()
            })
        );
    }

    #[test]
    fn full_and_closed_queues_are_reported() {
        let (link, endpoint) = link_pair(1, 1);
        link.send_text("a".into()).expect("first frame fits");
        assert_eq!(link.send_text("b".into()), Err(TransportError::QueueFull));
        drop(endpoint);
        assert_eq!(link.send_text("c".into()), Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn dropped_worker_reads_as_abnormal_close() {
        let (mut link, endpoint) = link_pair(1, 1);
        endpoint
            .events
            .send(TransportEvent::Opened)
            .await
            .expect("owner alive");
        drop(endpoint);
        assert_eq!(link.next_event().await, TransportEvent::Opened);
        assert_eq!(
            link.next_event().await,
            TransportEvent::Closed {
                code: LINK_LOST_CODE,
                reason: "transport worker exited".into()
            }
        );
    }
}
