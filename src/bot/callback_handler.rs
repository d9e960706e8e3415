//! Callback Handler module for processing inline keyboard callback queries

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{debug, error, warn};

// Import localization
use crate::localization::t_lang;

use super::dialogue_manager::DialogueManager;
use super::message_handler::send_reply;
use super::router::InboundEvent;
use super::{Reply, ReplyMode, Sender};

/// Show a reply, editing the pressed message when asked to
async fn deliver(bot: &Bot, q: &CallbackQuery, chat_id: ChatId, reply: Reply) -> Result<()> {
    if let (ReplyMode::Edit, Some(message)) = (reply.mode, q.message.as_ref()) {
        let mut request = bot.edit_message_text(chat_id, message.id(), reply.text.clone());
        if let Some(keyboard) = reply.keyboard.clone() {
            request = request.reply_markup(keyboard);
        }

        match request.await {
            Ok(_) => return Ok(()),
            Err(e) => {
                warn!(user_id = %q.from.id, error = %e, "Failed to edit message, sending a new one");
            }
        }
    }

    send_reply(bot, chat_id, reply).await
}

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    manager: Arc<DialogueManager>,
) -> Result<()> {
    let sender = Sender::from(&q.from);
    let data = q.data.as_deref().unwrap_or_default();
    debug!(user_id = %q.from.id, data = %data, "Received callback query from user");

    // Answer the callback query to remove the loading state
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(user_id = %q.from.id, error = %e, "Failed to answer callback query");
    }

    let chat_id = q
        .message
        .as_ref()
        .map(|message| message.chat().id)
        .unwrap_or_else(|| ChatId::from(q.from.id));

    match manager
        .dispatch(Some(&sender), InboundEvent::from_callback_data(data))
        .await
    {
        Ok(Some(reply)) => deliver(&bot, &q, chat_id, reply).await?,
        Ok(None) => {}
        Err(e) => {
            error!(user_id = %q.from.id, error = %e, "Cannot handle callback query");
            bot.send_message(chat_id, t_lang("error-internal", sender.lang()))
                .await?;
        }
    }

    Ok(())
}
