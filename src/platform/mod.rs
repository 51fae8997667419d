pub mod telegram;

use teloxide::types::ChatId;

/// A text message received from the platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Conversation the message came from, the unit of allow-listing
    pub chat_id: ChatId,
    /// The message text
    pub text: String,
}
