use chatline_core::{ChatError, OutboundPayload};
use chatline_transport::TransportError;
use thiserror::Error;
use tracing::debug;

use crate::controller::ConnectionController;
use crate::events::LinkState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,
    #[error(transparent)]
    Encode(#[from] ChatError),
    #[error("transport rejected frame: {0}")]
    Transport(#[from] TransportError),
}

impl ConnectionController {
    /// Writes one payload to the open link.
    ///
    /// Fire-and-forget: `Ok` only means the frame was handed to the transport.
    /// Outside `Open` nothing is written.
    pub fn send(&self, payload: &OutboundPayload) -> Result<(), SendError> {
        if self.state() != LinkState::Open {
            return Err(SendError::NotConnected);
        }
        let link = self.link().ok_or(SendError::NotConnected)?;
        let frame = payload.to_frame()?;
        link.send_text(frame)?;
        debug!(channel = %self.channel(), "queued outbound frame");
        Ok(())
    }
}
