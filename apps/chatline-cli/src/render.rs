use chatline_client::SessionEvent;
use chatline_core::{Author, ChatMessage, EnvelopeKind};

fn display_name(author: &Author) -> &str {
    author
        .name
        .as_deref()
        .or(author.id.as_deref())
        .unwrap_or("unknown")
}

pub fn format_message(message: &ChatMessage) -> String {
    let time = message
        .timestamp
        .map(|ts| ts.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    let body = match (&message.media_url, message.content.is_empty()) {
        (Some(url), true) => format!("[media] {url}"),
        (Some(url), false) => format!("{} [media] {url}", message.content),
        (None, _) => message.content.clone(),
    };
    format!("[{time}] {}: {body}", display_name(&message.author))
}

/// Terminal lines for one session event.
pub fn format_event(event: &SessionEvent) -> Vec<String> {
    match event {
        SessionEvent::Bound { channel } => vec![format!("-- joined #{channel}")],
        SessionEvent::Unbound { reason: None } => vec!["-- left channel".to_string()],
        SessionEvent::Unbound {
            reason: Some(reason),
        } => vec![format!("!! {reason}")],
        SessionEvent::StateChanged(state) => vec![format!("-- {state}")],
        SessionEvent::Message(message) => vec![format_message(message)],
        SessionEvent::HistorySeeded(batch) => batch.iter().map(format_message).collect(),
        SessionEvent::Notice(notice) => {
            let verb = match notice.kind {
                EnvelopeKind::Join => "joined",
                EnvelopeKind::Disconnect => "left",
                _ => "is here",
            };
            match notice.author.name.as_deref().or(notice.author.id.as_deref()) {
                Some(name) => vec![format!("* {name} {verb}")],
                None => vec![format!(
                    "* {}",
                    notice.content.as_deref().unwrap_or("disconnected")
                )],
            }
        }
        SessionEvent::Failed { reason } => vec![format!("!! {reason}")],
    }
}
