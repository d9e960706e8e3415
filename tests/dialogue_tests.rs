//! Conversation state machine tests driven through the dialogue manager.

mod common;

use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use imagegen_bot::bot::router::category_payload;
use imagegen_bot::bot::{Command, FlowError, InboundEvent, ReplyMode};
use imagegen_bot::dialogue::{ConversationState, ConversationStore, InMemConversationStore};
use imagegen_bot::storage::UserStore;

use common::{callback_payloads, sender, Harness, TEST_USER_ID};

/// The store hands back exactly what was set, per user
#[tokio::test]
async fn test_conversation_store_isolates_users() -> Result<()> {
    let store = InMemConversationStore::new();

    store.set(1, ConversationState::AwaitingDepositAmount).await;
    assert_eq!(store.get(1).await, Some(ConversationState::AwaitingDepositAmount));
    assert_eq!(store.get(2).await, None);

    let previous = store.clear(1).await;
    assert_eq!(previous, Some(ConversationState::AwaitingDepositAmount));
    assert!(store.is_empty());

    Ok(())
}

/// A stale claim racing a cancel never brings the cancelled flow back
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stale_claim_cannot_restore_cancelled_state() -> Result<()> {
    let awaiting_prompt = ConversationState::AwaitingPrompt {
        category_id: Uuid::new_v4(),
    };

    for _ in 0..200 {
        let store = Arc::new(InMemConversationStore::new());
        store.set(1, awaiting_prompt.clone()).await;

        let claimer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .clear_if(1, &ConversationState::AwaitingDepositAmount)
                    .await
            })
        };
        store.clear(1).await;

        assert!(!claimer.await?);
        assert_eq!(store.get(1).await, None);
    }

    Ok(())
}

/// Amount text arriving after the user switched flows leaves the new flow alone
#[tokio::test]
async fn test_amount_text_after_switching_to_prompt_flow() -> Result<()> {
    let harness = Harness::new();
    let art = harness.store.add_category("Art", "", "").await;

    harness.press("deposit_credits").await;
    harness.press(&category_payload(art.id)).await;

    // Now read as a (too short) prompt, not as a deposit
    let reply = harness.text("10").await.expect("prompt rejection");
    assert!(reply.text.contains("at least 5 characters"));
    assert_eq!(
        harness.conversations.get(TEST_USER_ID).await,
        Some(ConversationState::AwaitingPrompt { category_id: art.id })
    );

    Ok(())
}

/// /start registers the user and shows the main menu with a zero balance
#[tokio::test]
async fn test_start_registers_user_and_shows_menu() -> Result<()> {
    let harness = Harness::new();

    let reply = harness.text("/start").await.expect("start always replies");
    assert_eq!(reply.mode, ReplyMode::Send);
    assert!(reply.text.contains("Hello Abebe!"));
    assert!(reply.text.contains("Your current image credits: 0"));
    assert_eq!(
        callback_payloads(&reply),
        vec!["generate_image", "my_credits", "trending_prompts", "help"]
    );

    let user = harness.store.get_user_by_telegram_id(TEST_USER_ID).await?;
    assert_eq!(user.first_name, "Abebe");
    assert_eq!(user.telegram_username.as_deref(), Some("abebe_k"));

    Ok(())
}

/// /start wipes whatever flow was pending
#[tokio::test]
async fn test_start_clears_pending_state() -> Result<()> {
    let harness = Harness::new();
    harness
        .conversations
        .set(TEST_USER_ID, ConversationState::AwaitingDepositAmount)
        .await;

    harness.text("/start").await;

    assert_eq!(harness.conversations.get(TEST_USER_ID).await, None);
    Ok(())
}

#[tokio::test]
async fn test_cancel_clears_state_and_offers_main_menu() -> Result<()> {
    let harness = Harness::new();
    harness.press("deposit_credits").await;
    assert_eq!(
        harness.conversations.get(TEST_USER_ID).await,
        Some(ConversationState::AwaitingDepositAmount)
    );

    let reply = harness.text("/cancel").await.expect("cancel always replies");
    assert!(reply.text.contains("Operation cancelled"));
    assert_eq!(callback_payloads(&reply), vec!["back_to_main"]);
    assert_eq!(harness.conversations.get(TEST_USER_ID).await, None);

    // Cancelling again with nothing pending is harmless
    let reply = harness.text("/cancel").await.expect("cancel always replies");
    assert!(reply.text.contains("Operation cancelled"));

    Ok(())
}

#[tokio::test]
async fn test_help_works_from_command_and_button() -> Result<()> {
    let harness = Harness::new();

    let command = harness.text("/help").await.expect("help replies");
    assert_eq!(command.mode, ReplyMode::Send);
    assert!(command.text.contains("How to use the Image Generation Bot"));

    let button = harness.press("help").await.expect("help replies");
    assert_eq!(button.mode, ReplyMode::Edit);
    assert_eq!(button.text, command.text);
    assert_eq!(callback_payloads(&button), vec!["back_to_main"]);

    Ok(())
}

/// Help does not need to know who asked
#[tokio::test]
async fn test_help_without_sender() -> Result<()> {
    let harness = Harness::new();

    let reply = harness
        .manager
        .dispatch(None, InboundEvent::Command(Command::Help))
        .await?;

    assert!(reply.is_some());
    Ok(())
}

#[tokio::test]
async fn test_start_without_sender_is_an_error() -> Result<()> {
    let harness = Harness::new();

    let result = harness
        .manager
        .dispatch(None, InboundEvent::Command(Command::Start))
        .await;

    assert!(matches!(result, Err(FlowError::MissingSender)));
    Ok(())
}

/// Back to main edits the menu in place and registers unknown users
#[tokio::test]
async fn test_back_to_main_edits_menu() -> Result<()> {
    let harness = Harness::new();
    harness.press("deposit_credits").await;

    let reply = harness.press("back_to_main").await.expect("menu shown");
    assert_eq!(reply.mode, ReplyMode::Edit);
    assert!(reply.text.contains("Hello Abebe!"));
    assert_eq!(harness.conversations.get(TEST_USER_ID).await, None);

    Ok(())
}

#[tokio::test]
async fn test_text_outside_flow_is_ignored() -> Result<()> {
    let harness = Harness::new();

    assert!(harness.text("hello there").await.is_none());
    assert!(harness.text("42").await.is_none());

    Ok(())
}

#[tokio::test]
async fn test_command_with_bot_mention() -> Result<()> {
    let harness = Harness::new();

    let event = InboundEvent::from_text("/start@imagegen_bot");
    let reply = harness.manager.dispatch(Some(&sender()), event).await?;

    assert!(reply.expect("start replies").text.contains("Hello Abebe!"));
    Ok(())
}
