use crate::db::models::NewMessage;

use super::normalizer::MessageDraft;
use super::resolver::ResolvedIds;

/// Joins the resolved local ids with the message draft into the finished
/// row. Pure construction; persistence stays with the stores.
pub fn assemble(ids: ResolvedIds, draft: MessageDraft) -> NewMessage {
    NewMessage {
        platform_id: draft.platform_id,
        created_at: draft.created_at,
        content: draft.content,
        author_id: ids.author_id,
        channel_id: ids.channel_id,
        server_id: ids.server_id,
        is_edited: draft.is_edited,
        attachments_url: draft.attachments_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembled_message_carries_ids_and_draft_fields() {
        let message = assemble(
            ResolvedIds {
                server_id: 1,
                channel_id: 2,
                author_id: 3,
            },
            MessageDraft {
                platform_id: "M1".to_string(),
                created_at: "2024-05-01T10:00:00+00:00".to_string(),
                content: "hello".to_string(),
                is_edited: true,
                attachments_url: Some("https://cdn.example/a.png".to_string()),
            },
        );

        assert_eq!(message.platform_id, "M1");
        assert_eq!(message.server_id, 1);
        assert_eq!(message.channel_id, 2);
        assert_eq!(message.author_id, 3);
        assert!(message.is_edited);
        assert_eq!(
            message.attachments_url.as_deref(),
            Some("https://cdn.example/a.png")
        );
    }
}
