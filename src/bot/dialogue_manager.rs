//! Dialogue Manager module running the conversation flows.
//!
//! Each flow takes the sender, the parsed event and the stored conversation
//! state and returns the [`Reply`] to show. Nothing here talks to Telegram,
//! so the whole state machine runs against in-memory stores in tests.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

// Import localization
use crate::localization::t_lang;

use crate::config::DEFAULT_GENERATION_TIMEOUT_SECS;
use crate::deposit::{parse_deposit_amount, process_deposit};
use crate::dialogue::{ConversationState, ConversationStore};
use crate::errors::{StoreError, StoreResult};
use crate::generation::{
    generate_with_timeout, validate_prompt, GenerationCategory, GenerationError, GenerationRequest,
    ImageGenerator, TRENDING_CATEGORY_NAME, UNKNOWN_CATEGORY_NAME,
};
use crate::ledger::LedgerStore;
use crate::models::{CreditType, User};
use crate::storage::{CatalogStore, UserStore, TRENDING_LIMIT};

// Import UI builder functions
use super::ui_builder::{
    back_keyboard, cancel_text, categories_keyboard, categories_text, category_prompt_text,
    credits_keyboard, credits_text, deposit_prompt_text, deposit_rejection_text,
    deposit_success_keyboard, deposit_success_text, generation_result_keyboard,
    generation_result_text, help_text, main_menu_keyboard, main_menu_only_keyboard,
    main_menu_text, prompt_rejection_text, trending_empty_text, trending_keyboard, trending_text,
};

use super::router::{CallbackAction, Command, InboundEvent, NamedAction};
use super::{FlowError, Reply, ReplyMode, Sender};

fn require(sender: Option<&Sender>) -> Result<&Sender, FlowError> {
    sender.ok_or(FlowError::MissingSender)
}

/// Conversation flow engine shared by every bot handler
pub struct DialogueManager {
    users: Arc<dyn UserStore>,
    catalog: Arc<dyn CatalogStore>,
    ledger: Arc<dyn LedgerStore>,
    conversations: Arc<dyn ConversationStore>,
    generator: Arc<dyn ImageGenerator>,
    generation_timeout: Duration,
}

impl DialogueManager {
    pub fn new(
        users: Arc<dyn UserStore>,
        catalog: Arc<dyn CatalogStore>,
        ledger: Arc<dyn LedgerStore>,
        conversations: Arc<dyn ConversationStore>,
        generator: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            users,
            catalog,
            ledger,
            conversations,
            generator,
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
        }
    }

    /// Build a manager whose user, catalog and ledger stores are one backend
    pub fn with_store<S>(
        store: Arc<S>,
        conversations: Arc<dyn ConversationStore>,
        generator: Arc<dyn ImageGenerator>,
    ) -> Self
    where
        S: UserStore + CatalogStore + LedgerStore + 'static,
    {
        Self::new(
            store.clone(),
            store.clone(),
            store,
            conversations,
            generator,
        )
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Route one inbound event; `Ok(None)` means nothing should be sent
    pub async fn dispatch(
        &self,
        sender: Option<&Sender>,
        event: InboundEvent,
    ) -> Result<Option<Reply>, FlowError> {
        debug!(
            user_id = ?sender.map(|s| s.telegram_id),
            event = event.kind(),
            "Dispatching inbound event"
        );

        match event {
            InboundEvent::Command(command) => self.handle_command(sender, command).await.map(Some),
            InboundEvent::Callback(action) => self.handle_callback(sender, action).await,
            InboundEvent::Text(text) => self.handle_text(require(sender)?, &text).await,
        }
    }

    async fn handle_command(&self, sender: Option<&Sender>, command: Command) -> Result<Reply, FlowError> {
        match command {
            Command::Start => Ok(self.start(require(sender)?).await),
            Command::Cancel => Ok(self.cancel(require(sender)?).await),
            Command::Help => {
                let lang = sender.and_then(Sender::lang);
                Ok(Reply::send(help_text(lang)).with_keyboard(back_keyboard(lang)))
            }
        }
    }

    async fn handle_callback(
        &self,
        sender: Option<&Sender>,
        action: CallbackAction,
    ) -> Result<Option<Reply>, FlowError> {
        let lang = sender.and_then(Sender::lang);

        let reply = match action {
            CallbackAction::Named(NamedAction::GenerateImage) => self.show_categories(lang).await,
            CallbackAction::Named(NamedAction::MyCredits) => self.show_credits(require(sender)?).await,
            CallbackAction::Named(NamedAction::TrendingPrompts) => self.show_trending(lang).await,
            CallbackAction::Named(NamedAction::Help) => {
                Reply::edit(help_text(lang)).with_keyboard(back_keyboard(lang))
            }
            CallbackAction::Named(NamedAction::BackToMain) => self.back_to_main(require(sender)?).await,
            CallbackAction::Named(NamedAction::DepositCredits) => {
                self.begin_deposit(require(sender)?).await
            }
            CallbackAction::Category(id) => self.select_category(require(sender)?, &id).await,
            CallbackAction::Trending(id) => self.select_trending(require(sender)?, &id).await,
            CallbackAction::Unknown(data) => {
                debug!(data = %data, "Ignoring unknown callback payload");
                return Ok(None);
            }
        };

        Ok(Some(reply))
    }

    async fn handle_text(&self, sender: &Sender, text: &str) -> Result<Option<Reply>, FlowError> {
        let state = self.conversations.get(sender.telegram_id).await;

        let reply = match state {
            Some(ConversationState::AwaitingDepositAmount) => {
                self.deposit_amount_input(sender, text).await
            }
            Some(ConversationState::AwaitingPrompt { category_id }) => {
                self.prompt_input(sender, text, category_id).await
            }
            Some(ConversationState::Idle) | None => {
                debug!(user_id = sender.telegram_id, "Ignoring text outside of any flow");
                None
            }
        };

        Ok(reply)
    }

    /// Look the sender up, registering them if this is their first contact
    async fn resolve_user(&self, sender: &Sender) -> StoreResult<User> {
        match self.users.get_user_by_telegram_id(sender.telegram_id).await {
            Ok(user) => Ok(user),
            Err(e) if e.is_not_found() => {
                debug!(user_id = sender.telegram_id, "Registering user on first contact");
                Ok(self.users.upsert_user(&sender.profile()).await?.user)
            }
            Err(e) => Err(e),
        }
    }

    /// Take ownership of the pending state; false when another event already did
    async fn claim(&self, telegram_id: i64, expected: &ConversationState) -> bool {
        let claimed = self.conversations.clear_if(telegram_id, expected).await;
        if !claimed {
            debug!(
                user_id = telegram_id,
                expected = expected.tag(),
                "Conversation state already consumed or replaced"
            );
        }
        claimed
    }

    async fn main_menu(&self, user: &User, lang: Option<&str>, mode: ReplyMode) -> Reply {
        match self.ledger.get_balance(user.id, CreditType::Image).await {
            Ok(credits) => Reply {
                text: main_menu_text(&user.first_name, credits, lang),
                keyboard: Some(main_menu_keyboard(lang)),
                mode,
            },
            Err(e) => {
                error!(user_id = user.telegram_id, error = %e, "Failed to read balance for main menu");
                Reply::send(t_lang("user-load-failed", lang))
            }
        }
    }

    async fn start(&self, sender: &Sender) -> Reply {
        let lang = sender.lang();
        self.conversations.clear(sender.telegram_id).await;

        match self.users.upsert_user(&sender.profile()).await {
            Ok(upserted) => {
                if upserted.created {
                    info!(user_id = sender.telegram_id, "New user registered");
                }
                self.main_menu(&upserted.user, lang, ReplyMode::Send).await
            }
            Err(e) => {
                error!(user_id = sender.telegram_id, error = %e, "Failed to register user");
                Reply::send(t_lang("user-load-failed", lang))
            }
        }
    }

    async fn cancel(&self, sender: &Sender) -> Reply {
        let lang = sender.lang();
        let previous = self.conversations.clear(sender.telegram_id).await;

        info!(
            user_id = sender.telegram_id,
            previous_state = previous.as_ref().map_or("idle", ConversationState::tag),
            "Conversation cancelled"
        );

        Reply::send(cancel_text(lang)).with_keyboard(main_menu_only_keyboard(lang))
    }

    async fn back_to_main(&self, sender: &Sender) -> Reply {
        let lang = sender.lang();
        self.conversations.clear(sender.telegram_id).await;

        match self.resolve_user(sender).await {
            Ok(user) => self.main_menu(&user, lang, ReplyMode::Edit).await,
            Err(e) => {
                error!(user_id = sender.telegram_id, error = %e, "Failed to load user");
                Reply::send(t_lang("user-load-failed", lang))
            }
        }
    }

    async fn show_categories(&self, lang: Option<&str>) -> Reply {
        match self.catalog.list_active_categories().await {
            Ok(categories) if categories.is_empty() => Reply::send(t_lang("categories-empty", lang)),
            Ok(categories) => Reply::edit(categories_text(lang))
                .with_keyboard(categories_keyboard(&categories, lang)),
            Err(e) => {
                error!(error = %e, "Failed to load categories");
                Reply::send(t_lang("categories-load-failed", lang))
            }
        }
    }

    async fn show_credits(&self, sender: &Sender) -> Reply {
        let lang = sender.lang();

        let balance = match self.resolve_user(sender).await {
            Ok(user) => self.ledger.get_balance(user.id, CreditType::Image).await,
            Err(e) => Err(e),
        };

        match balance {
            Ok(balance) => Reply::edit(credits_text(balance, lang)).with_keyboard(credits_keyboard(lang)),
            Err(e) => {
                error!(user_id = sender.telegram_id, error = %e, "Failed to load credits");
                Reply::send(t_lang("credits-load-failed", lang))
            }
        }
    }

    async fn show_trending(&self, lang: Option<&str>) -> Reply {
        match self.catalog.list_trending_prompts(TRENDING_LIMIT).await {
            Ok(prompts) if prompts.is_empty() => {
                Reply::edit(trending_empty_text(lang)).with_keyboard(back_keyboard(lang))
            }
            Ok(prompts) => {
                Reply::edit(trending_text(lang)).with_keyboard(trending_keyboard(&prompts, lang))
            }
            Err(e) => {
                error!(error = %e, "Failed to load trending prompts");
                Reply::send(t_lang("trending-load-failed", lang))
            }
        }
    }

    async fn begin_deposit(&self, sender: &Sender) -> Reply {
        self.conversations
            .set(sender.telegram_id, ConversationState::AwaitingDepositAmount)
            .await;
        info!(user_id = sender.telegram_id, "Awaiting deposit amount");

        Reply::edit(deposit_prompt_text(sender.lang()))
    }

    async fn select_category(&self, sender: &Sender, raw_id: &str) -> Reply {
        let lang = sender.lang();

        let category = match Uuid::parse_str(raw_id) {
            Ok(id) => self.catalog.get_category(id).await,
            Err(_) => Err(StoreError::not_found("category")),
        };

        match category {
            Ok(category) => {
                self.conversations
                    .set(
                        sender.telegram_id,
                        ConversationState::AwaitingPrompt {
                            category_id: category.id,
                        },
                    )
                    .await;
                info!(
                    user_id = sender.telegram_id,
                    category = %category.name,
                    "Category selected, awaiting prompt"
                );
                Reply::edit(category_prompt_text(&category, lang))
            }
            Err(e) if e.is_not_found() => {
                warn!(user_id = sender.telegram_id, category_id = %raw_id, "Unknown category selected");
                Reply::send(t_lang("category-invalid", lang))
            }
            Err(e) => {
                error!(user_id = sender.telegram_id, error = %e, "Failed to load category");
                Reply::send(t_lang("categories-load-failed", lang))
            }
        }
    }

    async fn select_trending(&self, sender: &Sender, raw_id: &str) -> Reply {
        let lang = sender.lang();

        let prompt = match Uuid::parse_str(raw_id) {
            Ok(id) => self.catalog.get_trending_prompt(id).await,
            Err(_) => Err(StoreError::not_found("trending prompt")),
        };

        match prompt {
            Ok(prompt) => match validate_prompt(&prompt.prompt) {
                Ok(text) => {
                    let text = text.to_string();
                    self.record_usage_in_background(prompt.id);
                    self.generate(sender, text, GenerationCategory::Trending, ReplyMode::Edit)
                        .await
                }
                Err(rejection) => {
                    warn!(
                        user_id = sender.telegram_id,
                        prompt_id = %prompt.id,
                        ?rejection,
                        "Trending prompt rejected"
                    );
                    Reply::send(prompt_rejection_text(rejection, lang))
                }
            },
            Err(e) if e.is_not_found() => {
                warn!(user_id = sender.telegram_id, prompt_id = %raw_id, "Unknown trending prompt selected");
                Reply::send(t_lang("trending-invalid", lang))
            }
            Err(e) => {
                error!(user_id = sender.telegram_id, error = %e, "Failed to load trending prompt");
                Reply::send(t_lang("trending-load-failed", lang))
            }
        }
    }

    fn record_usage_in_background(&self, prompt_id: Uuid) {
        let catalog = Arc::clone(&self.catalog);
        tokio::spawn(async move {
            if let Err(e) = catalog.record_prompt_usage(prompt_id).await {
                warn!(prompt_id = %prompt_id, error = %e, "Failed to record trending prompt usage");
            }
        });
    }

    async fn deposit_amount_input(&self, sender: &Sender, text: &str) -> Option<Reply> {
        let lang = sender.lang();

        let quote = match parse_deposit_amount(text) {
            Ok(quote) => quote,
            Err(rejection) => {
                warn!(user_id = sender.telegram_id, ?rejection, "Deposit amount rejected");
                return Some(Reply::send(deposit_rejection_text(rejection, lang)));
            }
        };

        if !self
            .claim(sender.telegram_id, &ConversationState::AwaitingDepositAmount)
            .await
        {
            return None;
        }

        let receipt = match self.resolve_user(sender).await {
            Ok(user) => process_deposit(self.ledger.as_ref(), user.id, quote).await,
            Err(e) => Err(e),
        };

        match receipt {
            Ok(receipt) => Some(
                Reply::send(deposit_success_text(&receipt, lang))
                    .with_keyboard(deposit_success_keyboard(lang)),
            ),
            Err(e) => {
                error!(
                    user_id = sender.telegram_id,
                    amount = quote.amount,
                    error = %e,
                    "Deposit failed"
                );
                Some(Reply::send(t_lang("deposit-failed", lang)))
            }
        }
    }

    async fn prompt_input(&self, sender: &Sender, text: &str, category_id: Uuid) -> Option<Reply> {
        let prompt = match validate_prompt(text) {
            Ok(prompt) => prompt.to_string(),
            Err(rejection) => {
                warn!(user_id = sender.telegram_id, ?rejection, "Prompt rejected");
                return Some(Reply::send(prompt_rejection_text(rejection, sender.lang())));
            }
        };

        if !self
            .claim(sender.telegram_id, &ConversationState::AwaitingPrompt { category_id })
            .await
        {
            return None;
        }

        Some(
            self.generate(
                sender,
                prompt,
                GenerationCategory::Category(category_id),
                ReplyMode::Send,
            )
            .await,
        )
    }

    /// Run the generator; `prompt` has already passed `validate_prompt`
    async fn generate(
        &self,
        sender: &Sender,
        prompt: String,
        category: GenerationCategory,
        mode: ReplyMode,
    ) -> Reply {
        let lang = sender.lang();

        let category_name = match category {
            GenerationCategory::Trending => TRENDING_CATEGORY_NAME.to_string(),
            GenerationCategory::Category(id) => match self.catalog.get_category(id).await {
                Ok(category) => category.name,
                Err(e) => {
                    warn!(category_id = %id, error = %e, "Category lookup failed for generation");
                    UNKNOWN_CATEGORY_NAME.to_string()
                }
            },
        };

        let request = GenerationRequest {
            prompt,
            category,
            category_name,
            telegram_id: sender.telegram_id,
        };

        match generate_with_timeout(self.generator.as_ref(), &request, self.generation_timeout).await {
            Ok(image) => {
                info!(
                    user_id = sender.telegram_id,
                    category = %request.category_name,
                    image_ref = %image.image_ref,
                    elapsed_ms = image.elapsed.as_millis() as u64,
                    "Image generated"
                );
                Reply {
                    text: generation_result_text(
                        &request.prompt,
                        &request.category_name,
                        image.elapsed,
                        lang,
                    ),
                    keyboard: Some(generation_result_keyboard(lang)),
                    mode,
                }
            }
            Err(GenerationError::Timeout(limit)) => {
                warn!(user_id = sender.telegram_id, limit = ?limit, "Image generation timed out");
                Reply::send(t_lang("generation-timeout", lang))
                    .with_keyboard(main_menu_only_keyboard(lang))
            }
            Err(e) => {
                error!(user_id = sender.telegram_id, error = %e, "Image generation failed");
                Reply::send(t_lang("generation-failed", lang))
                    .with_keyboard(main_menu_only_keyboard(lang))
            }
        }
    }
}
