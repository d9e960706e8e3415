//! # Localization Module
//!
//! Fluent-based message catalog. Resources are compiled into the binary so the
//! bot does not depend on the working directory it is started from.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use lazy_static::lazy_static;
use tracing::warn;
use unic_langid::LanguageIdentifier;

pub const DEFAULT_LANGUAGE: &str = "en";

/// Embedded (language, resource) pairs
const RESOURCES: &[(&str, &str)] = &[("en", include_str!("../locales/en/main.ftl"))];

/// Localization manager for the image generation bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager with every embedded language loaded
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (lang, source) in RESOURCES {
            let locale: LanguageIdentifier = lang
                .parse()
                .map_err(|e| anyhow!("Invalid language identifier {lang}: {e:?}"))?;
            bundles.insert(lang.to_string(), Self::create_bundle(locale, source)?);
        }

        Ok(Self { bundles })
    }

    fn create_bundle(locale: LanguageIdentifier, source: &str) -> Result<FluentBundle<FluentResource>> {
        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Failed to parse {locale} resource: {errors:?}"))?;

        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Telegram renders the bidi isolation marks literally
        bundle.set_use_isolating(false);
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Duplicate messages in {locale} resource: {errors:?}"))?;

        Ok(bundle)
    }

    pub fn is_language_supported(&self, lang: &str) -> bool {
        self.bundles.contains_key(lang)
    }

    /// Get a localized message in a language, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        lang: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let Some(bundle) = self
            .bundles
            .get(lang)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        else {
            return format!("Missing translation: {key}");
        };

        let Some(pattern) = bundle.get_message(key).and_then(|msg| msg.value()) else {
            return format!("Missing translation: {key}");
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(*value));
            }
            fluent_args
        });

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, fluent_args.as_ref(), &mut errors);
        if !errors.is_empty() {
            warn!(key, lang, ?errors, "Errors while formatting message");
        }

        value.into_owned()
    }
}

lazy_static! {
    static ref LOCALIZATION_MANAGER: Option<LocalizationManager> = match LocalizationManager::new() {
        Ok(manager) => Some(manager),
        Err(e) => {
            warn!(error = %e, "Failed to load localization resources");
            None
        }
    };
}

/// Force the embedded resources to load, reporting parse failures early
pub fn init_localization() -> Result<()> {
    LOCALIZATION_MANAGER
        .as_ref()
        .map(|_| ())
        .ok_or_else(|| anyhow!("Localization resources failed to load"))
}

/// Map a Telegram `language_code` to a supported language
pub fn detect_language(language_code: Option<&str>) -> String {
    let primary = language_code
        .and_then(|code| code.split(['-', '_']).next())
        .map(str::to_ascii_lowercase);

    match (primary, LOCALIZATION_MANAGER.as_ref()) {
        (Some(lang), Some(manager)) if manager.is_language_supported(&lang) => lang,
        _ => DEFAULT_LANGUAGE.to_string(),
    }
}

/// Localized message without arguments
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    t_args_lang(key, &[], language_code)
}

/// Localized message with string arguments
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    let Some(manager) = LOCALIZATION_MANAGER.as_ref() else {
        return format!("Missing translation: {key}");
    };

    let lang = detect_language(language_code);
    let args_map: HashMap<&str, &str> = args.iter().copied().collect();
    let args = (!args_map.is_empty()).then_some(&args_map);

    manager.get_message_in_language(key, &lang, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_resource_parses() {
        assert!(LocalizationManager::new().is_ok());
        assert!(init_localization().is_ok());
    }

    #[test]
    fn test_arguments_are_substituted_without_isolation_marks() {
        let text = t_args_lang("deposit-amount", &[("amount", "15")], Some("en"));
        assert_eq!(text, "💰 Amount Deposited: 15 etb");
    }

    #[test]
    fn test_missing_key() {
        assert_eq!(t_lang("no-such-key", None), "Missing translation: no-such-key");
    }
}
