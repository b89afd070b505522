use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::link::{link_pair, Connector, LinkEndpoint, OutboundFrame, TransportEvent, TransportLink};

const MEMORY_QUEUE_CAPACITY: usize = 256;

/// In-memory connector for tests and simulations.
///
/// Every `open` creates a [`MemoryPeer`] that plays the server side of the
/// new link. Peers are handed out in open order through [`take_peer`].
///
/// [`take_peer`]: MemoryConnector::take_peer
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    inner: Arc<Mutex<MemoryConnectorInner>>,
}

#[derive(Debug, Default)]
struct MemoryConnectorInner {
    opened_urls: Vec<String>,
    pending: VecDeque<MemoryPeer>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of links opened so far.
    pub fn open_count(&self) -> usize {
        self.lock().opened_urls.len()
    }

    /// URLs of every link opened so far, oldest first.
    pub fn opened_urls(&self) -> Vec<String> {
        self.lock().opened_urls.clone()
    }

    /// Takes the server side of the oldest link not yet handed out.
    pub fn take_peer(&self) -> Option<MemoryPeer> {
        self.lock().pending.pop_front()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryConnectorInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Connector for MemoryConnector {
    fn open(&self, url: &str) -> TransportLink {
        let (link, endpoint) = link_pair(MEMORY_QUEUE_CAPACITY, MEMORY_QUEUE_CAPACITY);
        let mut inner = self.lock();
        inner.opened_urls.push(url.to_string());
        inner.pending.push_back(MemoryPeer {
            url: url.to_string(),
            endpoint,
        });
        link
    }
}

/// Scripted server side of one in-memory link.
///
/// Event helpers return false once the owning link has been dropped.
#[derive(Debug)]
pub struct MemoryPeer {
    url: String,
    endpoint: LinkEndpoint,
}

impl MemoryPeer {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn link_id(&self) -> u64 {
        self.endpoint.id
    }

    /// Completes establishment.
    pub fn accept(&self) -> bool {
        self.emit(TransportEvent::Opened)
    }

    /// Delivers one inbound text frame.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.emit(TransportEvent::Text(text.into()))
    }

    /// Ends the connection with `code`.
    pub fn close(&self, code: u16, reason: &str) -> bool {
        self.emit(TransportEvent::Closed {
            code,
            reason: reason.to_string(),
        })
    }

    /// Whether the owning link has been dropped.
    pub fn is_released(&self) -> bool {
        self.endpoint.events.is_closed()
    }

    pub fn try_recv_frame(&mut self) -> Option<OutboundFrame> {
        self.endpoint.outbound.try_recv().ok()
    }

    /// Drains every frame written by the owner so far.
    pub fn drain_frames(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.try_recv_frame() {
            frames.push(frame);
        }
        frames
    }

    fn emit(&self, event: TransportEvent) -> bool {
        self.endpoint.events.try_send(event).is_ok()
    }
}
