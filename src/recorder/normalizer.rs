use crate::db::models::{NewChannel, NewServer, NewUser};
use crate::discord::events::{GuildInfo, MessageEvent};

use super::RecorderError;

const ATTACHMENT_SEPARATOR: &str = ", ";

/// Entity candidates extracted from one message event, ready for resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub server: NewServer,
    pub channel: NewChannel,
    pub user: NewUser,
    pub message: MessageDraft,
}

/// The message before its foreign keys exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub platform_id: String,
    pub created_at: String,
    pub content: String,
    pub is_edited: bool,
    pub attachments_url: Option<String>,
}

pub fn server_from_guild(guild: &GuildInfo) -> NewServer {
    NewServer {
        platform_id: guild.platform_id.clone(),
        name: guild.name.clone(),
        created_at: guild.created_at.clone(),
        member_count: guild.member_count,
        owner_platform_id: guild.owner_platform_id.clone(),
    }
}

/// Extracts the three entity candidates and the message draft. An event
/// missing its guild or channel metadata cannot be linked to anything and is
/// rejected as malformed; the caller logs and drops it.
pub fn normalize(
    event: &MessageEvent,
    is_edited: bool,
) -> Result<NormalizedEvent, RecorderError> {
    let guild = event.guild.as_ref().ok_or_else(|| {
        RecorderError::MalformedEvent(format!(
            "message {} has no resolvable parent server",
            event.platform_id
        ))
    })?;
    let channel = event.channel.as_ref().ok_or_else(|| {
        RecorderError::MalformedEvent(format!(
            "message {} arrived in unknown channel {}",
            event.platform_id, event.channel_id
        ))
    })?;

    let created_at = if is_edited {
        event
            .edited_timestamp
            .clone()
            .unwrap_or_else(|| event.timestamp.clone())
    } else {
        event.timestamp.clone()
    };

    let attachments_url = if event.attachments.is_empty() {
        None
    } else {
        Some(event.attachments.join(ATTACHMENT_SEPARATOR))
    };

    Ok(NormalizedEvent {
        server: server_from_guild(guild),
        channel: NewChannel {
            platform_id: channel.platform_id.clone(),
            name: channel.name.clone(),
        },
        user: NewUser {
            platform_id: event.author.platform_id.clone(),
            username: event.author.username.clone(),
            discriminator: event.author.discriminator.clone(),
        },
        message: MessageDraft {
            platform_id: event.platform_id.clone(),
            created_at,
            content: event.content.clone(),
            is_edited,
            attachments_url,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::events::{AuthorInfo, ChannelInfo, ChannelKind, MessageKind};

    fn event() -> MessageEvent {
        MessageEvent {
            platform_id: "M1".to_string(),
            kind: MessageKind::Default,
            channel_id: "C1".to_string(),
            guild_id: Some("G1".to_string()),
            channel: Some(ChannelInfo {
                platform_id: "C1".to_string(),
                name: "general".to_string(),
                kind: ChannelKind::GuildText,
            }),
            guild: Some(GuildInfo {
                platform_id: "G1".to_string(),
                name: "rust hideout".to_string(),
                created_at: Some("2016-04-30T11:18:25+00:00".to_string()),
                member_count: Some(42),
                owner_platform_id: Some("O1".to_string()),
            }),
            author: AuthorInfo {
                platform_id: "U1".to_string(),
                username: "alice".to_string(),
                discriminator: Some("0042".to_string()),
            },
            content: "hello".to_string(),
            timestamp: "2024-05-01T10:00:00+00:00".to_string(),
            edited_timestamp: Some("2024-05-01T10:05:00+00:00".to_string()),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn extracts_all_three_entities() {
        let normalized = normalize(&event(), false).unwrap();

        assert_eq!(normalized.server.platform_id, "G1");
        assert_eq!(normalized.server.member_count, Some(42));
        assert_eq!(normalized.channel.platform_id, "C1");
        assert_eq!(normalized.channel.name, "general");
        assert_eq!(normalized.user.platform_id, "U1");
        assert_eq!(normalized.user.discriminator.as_deref(), Some("0042"));
    }

    #[test]
    fn new_messages_use_the_creation_timestamp() {
        let normalized = normalize(&event(), false).unwrap();
        assert_eq!(normalized.message.created_at, "2024-05-01T10:00:00+00:00");
        assert!(!normalized.message.is_edited);
    }

    #[test]
    fn edits_use_the_edit_timestamp() {
        let normalized = normalize(&event(), true).unwrap();
        assert_eq!(normalized.message.created_at, "2024-05-01T10:05:00+00:00");
        assert!(normalized.message.is_edited);
    }

    #[test]
    fn edits_without_an_edit_timestamp_fall_back_to_creation() {
        let mut stripped = event();
        stripped.edited_timestamp = None;
        let normalized = normalize(&stripped, true).unwrap();
        assert_eq!(normalized.message.created_at, "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn attachments_collapse_into_one_joined_field() {
        let mut with_files = event();
        with_files.attachments = vec![
            "https://cdn.example/a.png".to_string(),
            "https://cdn.example/b.png".to_string(),
        ];
        let normalized = normalize(&with_files, false).unwrap();
        assert_eq!(
            normalized.message.attachments_url.as_deref(),
            Some("https://cdn.example/a.png, https://cdn.example/b.png")
        );
    }

    #[test]
    fn no_attachments_means_no_joined_field() {
        let normalized = normalize(&event(), false).unwrap();
        assert_eq!(normalized.message.attachments_url, None);
    }

    #[test]
    fn missing_guild_is_malformed() {
        let mut orphaned = event();
        orphaned.guild = None;
        let err = normalize(&orphaned, false).unwrap_err();
        assert!(matches!(err, RecorderError::MalformedEvent(_)));
    }

    #[test]
    fn missing_channel_is_malformed() {
        let mut orphaned = event();
        orphaned.channel = None;
        let err = normalize(&orphaned, false).unwrap_err();
        assert!(matches!(err, RecorderError::MalformedEvent(_)));
    }
}
