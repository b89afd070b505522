use chatline_core::ChannelId;

/// Socket URL for one channel: `{base}/{channel}`.
pub fn channel_socket_url(base: &str, channel: &ChannelId) -> String {
    format!("{}/{}", base.trim_end_matches('/'), channel)
}

/// REST URL listing a channel's recent messages.
pub fn history_url(api_base: &str, channel: &ChannelId) -> String {
    format!(
        "{}/channels/{}/messages",
        api_base.trim_end_matches('/'),
        channel
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn general() -> ChannelId {
        ChannelId::parse("general").expect("valid channel")
    }

    #[test]
    fn socket_url_appends_channel() {
        assert_eq!(
            channel_socket_url("wss://chat.example/ws", &general()),
            "wss://chat.example/ws/general"
        );
        assert_eq!(
            channel_socket_url("wss://chat.example/ws/", &general()),
            "wss://chat.example/ws/general"
        );
    }

    #[test]
    fn history_url_targets_channel_messages() {
        assert_eq!(
            history_url("https://chat.example/api/", &general()),
            "https://chat.example/api/channels/general/messages"
        );
    }
}
