use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{debug, error, info, warn};

use crate::bot::{AppState, Command};
use crate::platform::IncomingMessage;

/// Run the Telegram bot platform
pub async fn run(state: Arc<AppState>, bot: Bot) -> Result<()> {
    info!("Starting Telegram platform...");

    // Chats are not filtered here: /help must answer unknown chats too.
    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    debug!("Telegram message in chat {}: {}", msg.chat.id.0, text);

    let incoming = IncomingMessage {
        chat_id: msg.chat.id,
        text,
    };

    let now = chrono::Utc::now().timestamp();

    // The title scrape retries over the network; keep it off the chat's update queue.
    if state.parse_command(&incoming.text) == Some(Command::Jmentape) {
        tokio::spawn(async move {
            let replies = state.handle(&incoming, now).await;
            send_replies(&bot, incoming.chat_id, replies).await;
        });
        return Ok(());
    }

    let replies = state.handle(&incoming, now).await;
    send_replies(&bot, incoming.chat_id, replies).await;

    Ok(())
}

async fn send_replies(bot: &Bot, chat_id: ChatId, replies: Vec<String>) {
    for reply in replies {
        if let Err(e) = bot.send_message(chat_id, reply).await {
            error!("Failed to send reply to chat {}: {}", chat_id.0, e);
        }
    }
}
