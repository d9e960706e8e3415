//! UI Builder module for creating keyboards and formatting messages

use std::time::Duration;

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

// Import localization
use crate::localization::{t_args_lang, t_lang};

use crate::deposit::{DepositReceipt, DepositRejection};
use crate::generation::PromptRejection;
use crate::models::{Category, TrendingPrompt};

use super::router::{category_payload, trending_payload, NamedAction};

/// Longest trending prompt shown as-is on a button
pub const TRENDING_LABEL_MAX_CHARS: usize = 35;
const TRENDING_LABEL_KEEP_CHARS: usize = 32;

fn button(label: String, action: NamedAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label, action.as_ref())
}

fn back_button(language_code: Option<&str>) -> InlineKeyboardButton {
    button(t_lang("button-back", language_code), NamedAction::BackToMain)
}

fn main_menu_button(language_code: Option<&str>) -> InlineKeyboardButton {
    button(t_lang("button-main-menu", language_code), NamedAction::BackToMain)
}

/// Truncate by characters, never splitting a code point
pub fn truncate_label(text: &str) -> String {
    if text.chars().count() > TRENDING_LABEL_MAX_CHARS {
        let kept: String = text.chars().take(TRENDING_LABEL_KEEP_CHARS).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}

pub fn main_menu_text(first_name: &str, image_credits: i64, language_code: Option<&str>) -> String {
    format!(
        "{}\n\n{}\n\n{}",
        t_args_lang("welcome-greeting", &[("name", first_name)], language_code),
        t_lang("welcome-intro", language_code),
        t_args_lang(
            "welcome-credits",
            &[("credits", &image_credits.to_string())],
            language_code
        )
    )
}

pub fn main_menu_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button(t_lang("button-generate", language_code), NamedAction::GenerateImage),
            button(t_lang("button-credits", language_code), NamedAction::MyCredits),
        ],
        vec![
            button(t_lang("button-trending", language_code), NamedAction::TrendingPrompts),
            button(t_lang("button-help", language_code), NamedAction::Help),
        ],
    ])
}

/// Single back-to-main-menu row
pub fn back_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![back_button(language_code)]])
}

pub fn main_menu_only_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![main_menu_button(language_code)]])
}

pub fn categories_text(language_code: Option<&str>) -> String {
    format!(
        "{}\n\n{}",
        t_lang("categories-title", language_code),
        t_lang("categories-hint", language_code)
    )
}

/// Categories two per row, then a back row
pub fn categories_keyboard(categories: &[Category], language_code: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = categories
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|category| {
                    InlineKeyboardButton::callback(
                        format!("{} {}", category.display_emoji(), category.name),
                        category_payload(category.id),
                    )
                })
                .collect()
        })
        .collect();

    rows.push(vec![back_button(language_code)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn category_prompt_text(category: &Category, language_code: Option<&str>) -> String {
    format!(
        "{}\n\n{}\n\n{}\n\n{}\n{}\n{}\n{}\n\n{}",
        t_args_lang(
            "category-selected",
            &[("emoji", category.display_emoji()), ("name", &category.name)],
            language_code
        ),
        category.description,
        t_lang("prompt-request", language_code),
        t_lang("prompt-examples-title", language_code),
        t_lang("prompt-example-puppy", language_code),
        t_lang("prompt-example-city", language_code),
        t_lang("prompt-example-cottage", language_code),
        t_lang("prompt-type", language_code)
    )
}

pub fn prompt_rejection_text(rejection: PromptRejection, language_code: Option<&str>) -> String {
    format!(
        "{}\n\n{}",
        t_lang(rejection.message_key(), language_code),
        t_lang("retry-or-cancel", language_code)
    )
}

fn pricing_lines(language_code: Option<&str>) -> String {
    [
        t_lang("credits-price-one", language_code),
        t_lang("credits-price-two", language_code),
        t_lang("credits-price-three", language_code),
    ]
    .join("\n")
}

pub fn credits_text(image_credits: i64, language_code: Option<&str>) -> String {
    format!(
        "{}\n\n{}\n\n{}\n{}\n{}\n\n{}",
        t_lang("credits-title", language_code),
        t_args_lang(
            "credits-image",
            &[("credits", &image_credits.to_string())],
            language_code
        ),
        t_lang("credits-pricing-title", language_code),
        pricing_lines(language_code),
        t_lang("credits-price-more", language_code),
        t_lang("credits-footer", language_code)
    )
}

pub fn credits_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button(t_lang("button-deposit", language_code), NamedAction::DepositCredits)],
        vec![back_button(language_code)],
    ])
}

pub fn deposit_prompt_text(language_code: Option<&str>) -> String {
    format!(
        "{}\n\n{}\n\n{}\n{}\n\n{}\n{}\n\n{}",
        t_lang("deposit-title", language_code),
        t_lang("deposit-enter-amount", language_code),
        t_lang("credits-conversion-title", language_code),
        pricing_lines(language_code),
        t_lang("deposit-note-multiples", language_code),
        t_lang("deposit-note-example", language_code),
        t_lang("deposit-type-amount", language_code)
    )
}

pub fn deposit_rejection_text(rejection: DepositRejection, language_code: Option<&str>) -> String {
    let retry_key = match rejection {
        DepositRejection::BelowMinimum => "deposit-minimum-retry",
        _ => "retry-or-cancel",
    };

    format!(
        "{}\n\n{}",
        t_lang(rejection.message_key(), language_code),
        t_lang(retry_key, language_code)
    )
}

pub fn deposit_success_text(receipt: &DepositReceipt, language_code: Option<&str>) -> String {
    let amount = receipt.quote.amount.to_string();
    let credits = receipt.quote.credits.to_string();
    let remainder = receipt.quote.remainder.to_string();
    let balance = receipt.new_balance.to_string();

    let mut lines = vec![
        t_args_lang("deposit-amount", &[("amount", &amount)], language_code),
        t_args_lang("deposit-credits-added", &[("credits", &credits)], language_code),
    ];
    if receipt.quote.remainder > 0 {
        lines.push(t_args_lang("deposit-unused", &[("remainder", &remainder)], language_code));
    }

    let mut text = format!(
        "{}\n\n{}\n\n{}",
        t_lang("deposit-success-title", language_code),
        lines.join("\n"),
        t_args_lang("deposit-new-balance", &[("balance", &balance)], language_code)
    );

    if receipt.quote.remainder > 0 {
        text.push_str("\n\n");
        text.push_str(&t_args_lang(
            "deposit-unused-note",
            &[("remainder", &remainder)],
            language_code,
        ));
    }

    text
}

pub fn deposit_success_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button(t_lang("button-view-credits", language_code), NamedAction::MyCredits),
        main_menu_button(language_code),
    ]])
}

pub fn trending_text(language_code: Option<&str>) -> String {
    format!(
        "{}\n\n{}",
        t_lang("trending-title", language_code),
        t_lang("trending-hint", language_code)
    )
}

pub fn trending_empty_text(language_code: Option<&str>) -> String {
    format!(
        "{}\n\n{}\n\n{}",
        t_lang("trending-title", language_code),
        t_lang("trending-empty", language_code),
        t_lang("trending-empty-hint", language_code)
    )
}

/// One prompt per row, then a back row
pub fn trending_keyboard(prompts: &[TrendingPrompt], language_code: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = prompts
        .iter()
        .map(|prompt| {
            vec![InlineKeyboardButton::callback(
                format!("{} {}", prompt.category_emoji, truncate_label(&prompt.prompt)),
                trending_payload(prompt.id),
            )]
        })
        .collect();

    rows.push(vec![back_button(language_code)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn generation_result_text(
    prompt: &str,
    category_name: &str,
    elapsed: Duration,
    language_code: Option<&str>,
) -> String {
    let seconds = format!("{:.1}", elapsed.as_secs_f64());

    format!(
        "{}\n\n{}\n{}\n{}\n{}\n\n{}\n\n{}\n\n{}",
        t_lang("generation-success-title", language_code),
        t_args_lang("generation-prompt", &[("prompt", prompt)], language_code),
        t_args_lang("generation-category", &[("category", category_name)], language_code),
        t_lang("generation-style", language_code),
        t_args_lang("generation-time", &[("seconds", &seconds)], language_code),
        t_lang("generation-placeholder", language_code),
        t_lang("generation-placeholder-note", language_code),
        t_lang("generation-next", language_code)
    )
}

pub fn generation_result_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button(t_lang("button-generate-another", language_code), NamedAction::GenerateImage),
            button(t_lang("button-use-trending", language_code), NamedAction::TrendingPrompts),
        ],
        vec![
            button(t_lang("button-credits", language_code), NamedAction::MyCredits),
            main_menu_button(language_code),
        ],
    ])
}

pub fn help_text(language_code: Option<&str>) -> String {
    format!(
        "{}\n\n{}\n{}\n{}\n{}\n\n{}\n{}\n{}\n{}\n\n{}",
        t_lang("help-title", language_code),
        t_lang("help-step-1", language_code),
        t_lang("help-step-2", language_code),
        t_lang("help-step-3", language_code),
        t_lang("help-step-4", language_code),
        t_lang("help-tips-title", language_code),
        t_lang("help-tip-specific", language_code),
        t_lang("help-tip-adjectives", language_code),
        t_lang("help-tip-moods", language_code),
        t_lang("help-contact", language_code)
    )
}

pub fn cancel_text(language_code: Option<&str>) -> String {
    format!(
        "{}\n\n{}",
        t_lang("cancel-done", language_code),
        t_lang("cancel-returning", language_code)
    )
}
