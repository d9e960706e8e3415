//! Message Handler module for processing incoming Telegram messages

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{debug, error};

// Import localization
use crate::localization::t_lang;

use super::dialogue_manager::DialogueManager;
use super::router::InboundEvent;
use super::{Reply, Sender};

/// Post a reply as a new message in the chat
pub async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> Result<()> {
    let mut request = bot.send_message(chat_id, reply.text);
    if let Some(keyboard) = reply.keyboard {
        request = request.reply_markup(keyboard);
    }
    request.await?;
    Ok(())
}

pub async fn message_handler(bot: Bot, msg: Message, manager: Arc<DialogueManager>) -> Result<()> {
    let Some(text) = msg.text() else {
        debug!(chat_id = %msg.chat.id, "Ignoring non-text message");
        return Ok(());
    };

    let sender = msg.from.as_ref().map(Sender::from);
    let language_code = sender.as_ref().and_then(Sender::lang);
    let event = InboundEvent::from_text(text);

    debug!(
        chat_id = %msg.chat.id,
        event = event.kind(),
        "Received text message"
    );

    match manager.dispatch(sender.as_ref(), event).await {
        Ok(Some(reply)) => send_reply(&bot, msg.chat.id, reply).await?,
        Ok(None) => {}
        Err(e) => {
            error!(chat_id = %msg.chat.id, error = %e, "Cannot handle message");
            bot.send_message(msg.chat.id, t_lang("error-internal", language_code))
                .await?;
        }
    }

    Ok(())
}
