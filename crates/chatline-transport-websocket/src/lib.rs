//! WebSocket transport for chatline.
//!
//! This crate provides a `Connector` implementation where every `open` spawns
//! one worker task owning a single outbound WebSocket connection. Text frames
//! carry JSON envelopes; reconnect policy lives in the client, not here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chatline_transport::link::LINK_LOST_CODE;
use chatline_transport::{
    link_pair, Connector, LinkEndpoint, OutboundFrame, TransportEvent, TransportLink,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

const CLOSE_NORMAL: u16 = 1000;
const CLOSE_NO_STATUS: u16 = 1005;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct WebSocketConnectorConfig {
    pub outbound_queue_capacity: usize,
    pub inbound_queue_capacity: usize,
    pub connect_timeout: Duration,
    /// How long to wait for the peer's close reply after sending ours.
    pub close_timeout: Duration,
}

impl Default for WebSocketConnectorConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 256,
            inbound_queue_capacity: 1024,
            connect_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WebSocketConnectorMetrics {
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub send_errors: u64,
}

#[derive(Debug, Default)]
struct WebSocketConnectorMetricsInner {
    connect_attempts: AtomicU64,
    connect_failures: AtomicU64,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    send_errors: AtomicU64,
}

pub struct WebSocketConnector {
    config: WebSocketConnectorConfig,
    metrics: Arc<WebSocketConnectorMetricsInner>,
}

impl WebSocketConnector {
    pub fn new(config: WebSocketConnectorConfig) -> Self {
        // Both ring and aws-lc may be linked in; pin one process-wide.
        let _ = rustls::crypto::ring::default_provider().install_default();
        Self {
            config,
            metrics: Arc::new(WebSocketConnectorMetricsInner::default()),
        }
    }

    pub fn metrics_snapshot(&self) -> WebSocketConnectorMetrics {
        WebSocketConnectorMetrics {
            connect_attempts: self.metrics.connect_attempts.load(Ordering::Relaxed),
            connect_failures: self.metrics.connect_failures.load(Ordering::Relaxed),
            frames_sent: self.metrics.frames_sent.load(Ordering::Relaxed),
            frames_received: self.metrics.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.metrics.frames_dropped.load(Ordering::Relaxed),
            send_errors: self.metrics.send_errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(WebSocketConnectorConfig::default())
    }
}

impl Connector for WebSocketConnector {
    fn open(&self, url: &str) -> TransportLink {
        let (link, endpoint) = link_pair(
            self.config.outbound_queue_capacity,
            self.config.inbound_queue_capacity,
        );
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(run_link_worker(
                    url.to_string(),
                    self.config.clone(),
                    Arc::clone(&self.metrics),
                    endpoint,
                ));
            }
            Err(_) => {
                warn!("websocket connector used outside a tokio runtime");
                let _ = endpoint.events.try_send(TransportEvent::Closed {
                    code: LINK_LOST_CODE,
                    reason: "no async runtime available".to_string(),
                });
            }
        }
        link
    }
}

async fn run_link_worker(
    url: String,
    config: WebSocketConnectorConfig,
    metrics: Arc<WebSocketConnectorMetricsInner>,
    endpoint: LinkEndpoint,
) {
    let LinkEndpoint {
        id,
        mut outbound,
        events,
    } = endpoint;

    metrics.connect_attempts.fetch_add(1, Ordering::Relaxed);
    let connected = tokio::select! {
        result = tokio::time::timeout(config.connect_timeout, connect_async(url.as_str())) => result,
        _ = events.closed() => {
            debug!(link = id, "link released while connecting");
            return;
        }
    };

    let stream = match connected {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(err)) => {
            metrics.connect_failures.fetch_add(1, Ordering::Relaxed);
            warn!(link = id, %url, "websocket connect failed: {err}");
            let _ = events
                .send(TransportEvent::Closed {
                    code: LINK_LOST_CODE,
                    reason: format!("connect failed: {err}"),
                })
                .await;
            return;
        }
        Err(_) => {
            metrics.connect_failures.fetch_add(1, Ordering::Relaxed);
            warn!(link = id, %url, "websocket connect timed out");
            let _ = events
                .send(TransportEvent::Closed {
                    code: LINK_LOST_CODE,
                    reason: "connect timed out".to_string(),
                })
                .await;
            return;
        }
    };

    info!(link = id, %url, "websocket connected");
    let (mut write, mut read) = stream.split();
    if events.send(TransportEvent::Opened).await.is_err() {
        close_gracefully(
            &mut write,
            &mut read,
            CLOSE_NORMAL,
            String::new(),
            config.close_timeout,
        )
        .await;
        return;
    }

    loop {
        tokio::select! {
            maybe_out = outbound.recv() => {
                match maybe_out {
                    Some(OutboundFrame::Text(text)) => {
                        if let Err(err) = write.send(Message::Text(text)).await {
                            metrics.send_errors.fetch_add(1, Ordering::Relaxed);
                            warn!(link = id, "websocket write failed: {err}");
                            let _ = events
                                .send(TransportEvent::Closed {
                                    code: LINK_LOST_CODE,
                                    reason: format!("write failed: {err}"),
                                })
                                .await;
                            return;
                        }
                        metrics.frames_sent.fetch_add(1, Ordering::Relaxed);
                    }
                    Some(OutboundFrame::Close { code, reason }) => {
                        close_gracefully(&mut write, &mut read, code, reason.clone(), config.close_timeout).await;
                        let _ = events.send(TransportEvent::Closed { code, reason }).await;
                        return;
                    }
                    None => {
                        debug!(link = id, "link released, closing websocket");
                        close_gracefully(&mut write, &mut read, CLOSE_NORMAL, String::new(), config.close_timeout).await;
                        return;
                    }
                }
            }
            maybe_in = read.next() => {
                let text = match maybe_in {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            metrics.frames_dropped.fetch_add(1, Ordering::Relaxed);
                            debug!(link = id, "dropping non-utf8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.into_owned()))
                            .unwrap_or((CLOSE_NO_STATUS, String::new()));
                        info!(link = id, code, "websocket closed by peer");
                        let _ = events.send(TransportEvent::Closed { code, reason }).await;
                        return;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        warn!(link = id, "websocket read failed: {err}");
                        let _ = events
                            .send(TransportEvent::Closed {
                                code: LINK_LOST_CODE,
                                reason: format!("read failed: {err}"),
                            })
                            .await;
                        return;
                    }
                    None => {
                        let _ = events
                            .send(TransportEvent::Closed {
                                code: LINK_LOST_CODE,
                                reason: "connection ended".to_string(),
                            })
                            .await;
                        return;
                    }
                };
                metrics.frames_received.fetch_add(1, Ordering::Relaxed);
                if events.send(TransportEvent::Text(text)).await.is_err() {
                    close_gracefully(&mut write, &mut read, CLOSE_NORMAL, String::new(), config.close_timeout).await;
                    return;
                }
            }
        }
    }
}

/// Sends a close frame and waits (bounded) for the peer's reply.
async fn close_gracefully(
    write: &mut SplitSink<WsStream, Message>,
    read: &mut SplitStream<WsStream>,
    code: u16,
    reason: String,
    timeout: Duration,
) {
    let frame = CloseFrame {
        code: CloseCode::from(code),
        reason: reason.into(),
    };
    if write.send(Message::Close(Some(frame))).await.is_err() {
        return;
    }
    let reply = tokio::time::timeout(timeout, async {
        while let Some(message) = read.next().await {
            if matches!(message, Ok(Message::Close(_)) | Err(_)) {
                break;
            }
        }
    })
    .await;
    if reply.is_err() {
        debug!("websocket close handshake timed out");
    }
}
