use chatline_core::{ChannelId, ChatMessage};

use crate::events::{LinkState, SessionEvent};

/// Application-facing snapshot: the visible list plus connection status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatView {
    pub channel: Option<ChannelId>,
    pub state: LinkState,
    pub connected: bool,
    pub last_error: Option<String>,
    pub messages: Vec<ChatMessage>,
}

impl ChatView {
    pub fn apply(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Bound { channel } => {
                *self = Self {
                    channel: Some(channel.clone()),
                    ..Self::default()
                };
            }
            SessionEvent::Unbound { reason } => {
                *self = Self {
                    last_error: reason.clone(),
                    ..Self::default()
                };
            }
            SessionEvent::StateChanged(state) => {
                self.state = *state;
                self.connected = state.is_connected();
                if *state == LinkState::Open {
                    self.last_error = None;
                }
            }
            SessionEvent::Message(message) => self.messages.push(message.clone()),
            SessionEvent::HistorySeeded(batch) => {
                self.messages.splice(0..0, batch.iter().cloned());
            }
            SessionEvent::Notice(_) => {}
            SessionEvent::Failed { reason } => self.last_error = Some(reason.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FailureReason;
    use chatline_core::{Author, EnvelopeKind};

    fn message(id: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            kind: EnvelopeKind::Message,
            content: format!("body {id}"),
            media_url: None,
            author: Author::default(),
            timestamp: None,
        }
    }

    fn ids(view: &ChatView) -> Vec<&str> {
        view.messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn history_goes_ahead_of_live_messages() {
        let mut view = ChatView::default();
        view.apply(&SessionEvent::Message(message("live")));
        view.apply(&SessionEvent::HistorySeeded(vec![message("a"), message("b")]));
        assert_eq!(ids(&view), vec!["a", "b", "live"]);
    }

    #[test]
    fn bound_resets_everything() {
        let mut view = ChatView::default();
        view.apply(&SessionEvent::Message(message("m1")));
        view.apply(&SessionEvent::Failed {
            reason: FailureReason::MissingCredential,
        });
        let channel = ChannelId::parse("random").expect("channel");
        view.apply(&SessionEvent::Bound {
            channel: channel.clone(),
        });
        assert_eq!(
            view,
            ChatView {
                channel: Some(channel),
                ..ChatView::default()
            }
        );
    }

    #[test]
    fn connected_tracks_open_state() {
        let mut view = ChatView::default();
        view.apply(&SessionEvent::Failed {
            reason: FailureReason::Unauthorized { code: 4001 },
        });
        view.apply(&SessionEvent::StateChanged(LinkState::Open));
        assert!(view.connected);
        assert_eq!(view.last_error, None);
        view.apply(&SessionEvent::StateChanged(LinkState::Reconnecting));
        assert!(!view.connected);
    }
}
