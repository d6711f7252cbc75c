use super::dto::{ChatMessage, Role};
use crate::preferences::model::Preferences;

/// Prefixes the caller's new message with a snapshot of their stored
/// preferences. Transcripts that do not end in a user turn pass through as is.
pub fn compose_transcript(
    mut messages: Vec<ChatMessage>,
    prefs: Option<&Preferences>,
) -> Vec<ChatMessage> {
    if let (Some(prefs), Some(last)) = (prefs, messages.last_mut()) {
        if last.role == Role::User {
            last.content = format!("User preferences: {}\n{}", prefs.prompt_snapshot(), last.content);
        }
    }
    messages
}
