use anyhow::Result;
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;
use unic_langid::LanguageIdentifier;

pub const DEFAULT_LANGUAGE: &str = "en";

const RESOURCES: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en/main.ftl")),
    ("fr", include_str!("../locales/fr/main.ftl")),
];

/// Localization manager for shop bot messages
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager with every embedded language
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (lang, source) in RESOURCES {
            let locale: LanguageIdentifier = lang.parse()?;
            bundles.insert(lang.to_string(), Self::create_bundle(&locale, source)?);
        }

        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(
        locale: &LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Telegram renders the isolation marks as visible glyphs
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow::anyhow!("Invalid {locale} resource: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow::anyhow!("Duplicate {locale} messages: {errors:?}"))?;

        Ok(bundle)
    }

    /// Map a Telegram language code ("fr", "fr-CA", "en-US") to a bundle key
    pub fn resolve_language<'a>(&self, language: Option<&'a str>) -> &'a str {
        let Some(language) = language else {
            return DEFAULT_LANGUAGE;
        };
        let primary = language.split(['-', '_']).next().unwrap_or(language);
        if self.bundles.contains_key(primary) {
            primary
        } else {
            DEFAULT_LANGUAGE
        }
    }

    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// Get a localized message in a language, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&FluentArgs>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {key}"),
        };

        let pattern = match bundle.get_message(key).and_then(|msg| msg.value()) {
            Some(pattern) => pattern,
            None if language != DEFAULT_LANGUAGE => {
                return self.get_message_in_language(key, DEFAULT_LANGUAGE, args)
            }
            None => return format!("Missing translation: {key}"),
        };

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, args, &mut errors);
        if !errors.is_empty() {
            warn!(key, language, errors = ?errors, "Fluent formatting errors");
        }
        value.into_owned()
    }
}

static LOCALIZATION_MANAGER: LazyLock<Option<LocalizationManager>> =
    LazyLock::new(|| match LocalizationManager::new() {
        Ok(manager) => Some(manager),
        Err(e) => {
            warn!(error = %e, "Failed to load localization resources");
            None
        }
    });

/// Get the global localization manager
pub fn get_localization_manager() -> Option<&'static LocalizationManager> {
    LOCALIZATION_MANAGER.as_ref()
}

fn fluent_args<'a>(args: &[(&'a str, &'a str)]) -> FluentArgs<'a> {
    args.iter()
        .map(|(k, v)| (*k, FluentValue::from(*v)))
        .collect()
}

/// Localized message in the user's language
pub fn t_lang(key: &str, language: Option<&str>) -> String {
    t_args_lang(key, &[], language)
}

/// Localized message with string arguments in the user's language
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language: Option<&str>) -> String {
    let Some(manager) = get_localization_manager() else {
        return key.to_string();
    };
    let language = manager.resolve_language(language);
    if args.is_empty() {
        manager.get_message_in_language(key, language, None)
    } else {
        manager.get_message_in_language(key, language, Some(&fluent_args(args)))
    }
}
