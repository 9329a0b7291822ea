use crate::discord::events::MessageEvent;

/// Decides whether an inbound message is worth recording at all. Returns
/// true when the event should be dropped. Pure; the caller owns all side
/// effects.
pub fn should_ignore(self_id: Option<&str>, event: &MessageEvent) -> bool {
    // The bot's own messages must never feed back into the store.
    if let Some(self_id) = self_id
        && event.author.platform_id == self_id
    {
        return true;
    }

    // Direct and group conversations are out of scope; only public guild
    // channels are recorded.
    if event.guild_id.is_none() {
        return true;
    }
    if event
        .channel
        .as_ref()
        .is_some_and(|channel| channel.kind.is_private())
    {
        return true;
    }

    // Service notices (pins, joins, boosts) are not messages.
    if !event.kind.is_recordable() {
        return true;
    }

    false
}
