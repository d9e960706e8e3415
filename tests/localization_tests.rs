//! # Localization Tests
//!
//! Message retrieval and formatting against the embedded English resource,
//! plus a check that every key the bot asks for actually exists.

use imagegen_bot::deposit::DepositRejection;
use imagegen_bot::generation::PromptRejection;
use imagegen_bot::localization::{detect_language, t_args_lang, t_lang, LocalizationManager};
use std::collections::HashMap;

/// Sources that look messages up by key
const KEYED_SOURCES: &[(&str, &str)] = &[
    ("ui_builder.rs", include_str!("../src/bot/ui_builder.rs")),
    ("dialogue_manager.rs", include_str!("../src/bot/dialogue_manager.rs")),
    ("message_handler.rs", include_str!("../src/bot/message_handler.rs")),
    ("api/mod.rs", include_str!("../src/api/mod.rs")),
];

fn quoted_keys_after<'a>(source: &'a str, marker: &str) -> Vec<&'a str> {
    source
        .split(marker)
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .filter(|key| !key.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        // Create a new localization manager for each test
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("help-title", "en", None);
        assert!(message.contains("How to use the Image Generation Bot"));
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "en", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_get_message_unsupported_language() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("help-title", "unsupported", None);
        // Should fall back to English
        assert_eq!(message, manager.get_message_in_language("help-title", "en", None));
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("name", "Selam");

        let message = manager.get_message_in_language("welcome-greeting", "en", Some(&args));
        assert_eq!(message, "Hello Selam! Welcome to Image Generation Bot! 🎨");
    }

    #[test]
    fn test_arguments_are_not_wrapped_in_isolation_marks() {
        let message = t_args_lang("deposit-amount", &[("amount", "15")], Some("en"));
        assert_eq!(message, "💰 Amount Deposited: 15 etb");
        assert!(!message.contains('\u{2068}'));
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language(Some("en")), "en");
        assert_eq!(detect_language(Some("en-GB")), "en");
        assert_eq!(detect_language(Some("am")), "en");
        assert_eq!(detect_language(None), "en");
    }

    #[test]
    fn test_rejection_keys_resolve() {
        for rejection in [
            DepositRejection::NotANumber,
            DepositRejection::NotPositive,
            DepositRejection::BelowMinimum,
        ] {
            assert!(!t_lang(rejection.message_key(), None).starts_with("Missing translation"));
        }

        for rejection in [PromptRejection::TooShort, PromptRejection::TooLong] {
            assert!(!t_lang(rejection.message_key(), None).starts_with("Missing translation"));
        }
    }

    #[test]
    fn test_every_referenced_key_exists() {
        let manager = setup_localization();

        for (file, source) in KEYED_SOURCES {
            let keys = quoted_keys_after(source, "t_lang(\"")
                .into_iter()
                .chain(quoted_keys_after(source, "t_args_lang(\""));

            for key in keys {
                let message = manager.get_message_in_language(key, "en", None);
                assert!(
                    !message.starts_with("Missing translation"),
                    "{file} uses unknown key {key}"
                );
            }
        }
    }
}
