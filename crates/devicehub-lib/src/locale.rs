//! Message localization.
//!
//! A [`Localizer`] owns the supported-language configuration and the message
//! bundle built from it. The bundle is loaded lazily on first use, exactly
//! once, from `{base_path}/{lang}.yml` for every supported language. Files that
//! cannot be loaded are logged and skipped.
//!
//! # Resolution
//!
//! 1. The requested tag (or each tag of an `Accept-Language` list, by quality)
//!    is matched exactly against the loaded languages, then by its base
//!    language (`es_MX` → `es`).
//! 2. Without a match the default language (`en`) is used.
//! 3. The message id is looked up in the resolved language, then in the
//!    default language. If neither has it, the descriptor's literal `message`
//!    is returned as-is.
//!
//! # Example
//!
//! ```no_run
//! use devicehub_lib::{Localizable, Localizer};
//!
//! let localizer = Localizer::with_settings("./resources/locales", "en,es");
//! let message = Localizable::new("errors.record_not_found", "record not found")
//!     .with_var("name", "Device");
//! assert_eq!(localizer.localize(&message, "es-MX"), "Registro de Device no encontrado!");
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::catalog::{load_catalog, Catalog};
use crate::template::render;

/// Language used when the caller expresses no usable preference.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Catalog directory used when none is configured.
pub const DEFAULT_BASE_PATH: &str = "./resources/locales";

/// A language-independent message descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Localizable {
    /// Catalog key. May be empty, in which case `message` is always used.
    #[serde(default)]
    pub message_id: String,

    /// Literal fallback text.
    #[serde(default)]
    pub message: String,

    /// Values substituted into the catalog template.
    #[serde(default)]
    pub message_vars: HashMap<String, String>,
}

impl Localizable {
    /// Create a descriptor with a catalog key and a fallback text.
    pub fn new(message_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            message: message.into(),
            message_vars: HashMap::new(),
        }
    }

    /// Create a descriptor that only carries literal text.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self::new(String::new(), message)
    }

    /// Set a template variable.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.message_vars.insert(name.into(), value.into());
        self
    }

    /// Replace all template variables.
    #[must_use]
    pub fn with_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.message_vars = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Render this descriptor for `lang` using `localizer`.
    pub fn localize(&self, localizer: &Localizer, lang: &str) -> String {
        localizer.localize(self, lang)
    }
}

#[derive(Debug, Clone)]
struct LocaleSettings {
    base_path: PathBuf,
    languages: Vec<String>,
}

/// Loaded catalogs keyed by normalized language tag.
#[derive(Debug, Default)]
pub struct Bundle {
    catalogs: HashMap<String, Catalog>,
}

impl Bundle {
    /// Whether a catalog was loaded for the normalized `tag`.
    pub fn has_language(&self, tag: &str) -> bool {
        self.catalogs.contains_key(tag)
    }

    /// Normalized tags of all loaded catalogs.
    pub fn languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.catalogs.keys().map(String::as_str).collect();
        languages.sort_unstable();
        languages
    }

    fn template(&self, tag: &str, message_id: &str) -> Option<&str> {
        self.catalogs
            .get(tag)
            .and_then(|catalog| catalog.get(message_id))
            .map(String::as_str)
    }
}

/// Owner of the message bundle and its configuration.
///
/// Configure with [`Localizer::set_base_path`] and
/// [`Localizer::set_supported_languages`] during startup. Once the bundle has
/// been loaded, configuration changes are ignored.
#[derive(Debug)]
pub struct Localizer {
    settings: Mutex<LocaleSettings>,
    bundle: OnceCell<Bundle>,
}

impl Default for Localizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Localizer {
    /// Localizer for the default base path and the default language only.
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_BASE_PATH, DEFAULT_LANGUAGE)
    }

    /// Localizer for `base_path` and a comma-separated language list.
    pub fn with_settings(base_path: impl Into<PathBuf>, supported_languages: &str) -> Self {
        Self {
            settings: Mutex::new(LocaleSettings {
                base_path: base_path.into(),
                languages: split_languages(supported_languages),
            }),
            bundle: OnceCell::new(),
        }
    }

    /// Set the directory holding `{lang}.yml` catalogs.
    pub fn set_base_path(&self, path: impl Into<PathBuf>) {
        if self.is_initialized() {
            warn!("message catalogs already loaded; ignoring base path change");
            return;
        }
        self.settings().base_path = path.into();
    }

    /// Set the supported languages from a comma-separated list. Spaces are
    /// ignored.
    pub fn set_supported_languages(&self, languages: &str) {
        if self.is_initialized() {
            warn!("message catalogs already loaded; ignoring supported languages change");
            return;
        }
        self.settings().languages = split_languages(languages);
    }

    /// Configured catalog directory.
    pub fn base_path(&self) -> PathBuf {
        self.settings().base_path.clone()
    }

    /// Configured language tags, as given.
    pub fn supported_languages(&self) -> Vec<String> {
        self.settings().languages.clone()
    }

    /// Whether the bundle has been loaded.
    pub fn is_initialized(&self) -> bool {
        self.bundle.get().is_some()
    }

    /// Load the bundle if that has not happened yet and return it.
    pub fn initialize(&self) -> &Bundle {
        self.bundle.get_or_init(|| {
            let settings = self.settings().clone();
            let mut catalogs = HashMap::new();

            for lang in &settings.languages {
                let path = settings.base_path.join(format!("{lang}.yml"));
                match load_catalog(&path) {
                    Ok(catalog) => {
                        debug!(
                            language = %lang,
                            messages = catalog.len(),
                            "message file loaded"
                        );
                        catalogs.insert(normalize_tag(lang), catalog);
                    }
                    Err(err) => {
                        error!(
                            error = %err,
                            path = %path.display(),
                            "could not load message file"
                        );
                    }
                }
            }

            let bundle = Bundle { catalogs };
            info!(languages = ?bundle.languages(), "message catalogs initialized");
            bundle
        })
    }

    /// Resolve `lang` (a tag or an `Accept-Language` value) to the key of a
    /// loaded catalog, or the default language.
    pub fn resolve_language(&self, lang: &str) -> String {
        let bundle = self.initialize();

        for tag in parse_accept_language(lang) {
            if bundle.has_language(&tag) {
                return tag;
            }
            if let Some((base, _)) = tag.split_once('-') {
                if bundle.has_language(base) {
                    return base.to_string();
                }
            }
        }

        DEFAULT_LANGUAGE.to_string()
    }

    /// Render `descriptor` in the language best matching `lang`.
    ///
    /// Never fails; the worst case is the descriptor's literal message.
    pub fn localize(&self, descriptor: &Localizable, lang: &str) -> String {
        if descriptor.message_id.is_empty() {
            return descriptor.message.clone();
        }

        let bundle = self.initialize();
        let language = self.resolve_language(lang);
        let template = bundle
            .template(&language, &descriptor.message_id)
            .or_else(|| bundle.template(DEFAULT_LANGUAGE, &descriptor.message_id));

        match template {
            Some(template) => render(template, &descriptor.message_vars),
            None => {
                debug!(
                    message_id = %descriptor.message_id,
                    language = %language,
                    "message id not in catalogs, using default message"
                );
                descriptor.message.clone()
            }
        }
    }

    fn settings(&self) -> MutexGuard<'_, LocaleSettings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn split_languages(languages: &str) -> Vec<String> {
    languages
        .replace(' ', "")
        .split(',')
        .filter(|lang| !lang.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lowercase a tag and use `-` as the subtag separator.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().replace('_', "-").to_ascii_lowercase()
}

/// Split an `Accept-Language` value into normalized tags, highest quality
/// first. A plain tag yields itself. Wildcards and `q=0` entries are dropped.
pub fn parse_accept_language(value: &str) -> Vec<String> {
    let mut weighted: Vec<(String, f32)> = value
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let tag = normalize_tag(pieces.next()?);
            if tag.is_empty() || tag == "*" {
                return None;
            }
            let quality = pieces
                .filter_map(|param| param.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            (quality > 0.0).then_some((tag, quality))
        })
        .collect();

    weighted.sort_by(|a, b| b.1.total_cmp(&a.1));
    weighted.into_iter().map(|(tag, _)| tag).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use std::thread;

    const FIXTURE_LOCALES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../resources/locales");

    fn fixture_localizer() -> Localizer {
        Localizer::with_settings(FIXTURE_LOCALES, "en,es")
    }

    #[test]
    fn test_localize_fixture_catalogs() {
        let localizer = fixture_localizer();
        let invalid_type = Localizable::new("errors.invalid_type", "");
        let not_found = Localizable::new("errors.record_not_found", "");

        let cases = [
            ("es", invalid_type.clone(), "Tipo inválido encontrado!"),
            ("en", invalid_type.clone(), "Invalid type encountered!"),
            ("es_MX", invalid_type.clone(), "Tipo inválido encontrado!"),
            (
                "en_GB",
                not_found.clone().with_var("name", "User"),
                "User record not found!",
            ),
            ("es", not_found, "Registro de <no value> no encontrado!"),
            ("ar", invalid_type.clone(), "Invalid type encountered!"),
            (
                "en",
                Localizable::new("errors.foo_bar", "Foo Bar"),
                "Foo Bar",
            ),
            ("", invalid_type, "Invalid type encountered!"),
        ];

        for (lang, subject, expected) in cases {
            assert_eq!(localizer.localize(&subject, lang), expected, "lang={lang:?}");
        }
    }

    #[test]
    fn test_message_only_in_default_language_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("en.yml"), "only_en: English only\n").unwrap();
        fs::write(dir.path().join("es.yml"), "other_key: otro\n").unwrap();
        let localizer = Localizer::with_settings(dir.path(), "en,es");
        let message = Localizable::new("only_en", "fallback");

        for lang in ["es", "es_MX", "ar"] {
            assert_eq!(localizer.localize(&message, lang), "English only");
        }
    }

    #[test]
    fn test_literal_fallback_is_not_templated() {
        let localizer = fixture_localizer();
        let message = Localizable::new("errors.unknown_id", "{{.name}} stays").with_var("name", "x");
        assert_eq!(localizer.localize(&message, "en"), "{{.name}} stays");
    }

    #[test]
    fn test_empty_descriptor_yields_empty_string() {
        let localizer = fixture_localizer();
        assert_eq!(localizer.localize(&Localizable::default(), "en"), "");
    }

    #[test]
    fn test_missing_catalog_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("en.yml"), "hello: Hello\n").unwrap();
        let localizer = Localizer::with_settings(dir.path(), "en, fr");

        let bundle = localizer.initialize();
        assert_eq!(bundle.languages(), vec!["en"]);
        assert_eq!(
            localizer.localize(&Localizable::new("hello", ""), "fr"),
            "Hello"
        );
    }

    #[test]
    fn test_settings_are_fixed_after_initialization() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("en.yml"), "hello: Hello\n").unwrap();
        let localizer = Localizer::with_settings(dir.path(), "en");
        assert!(!localizer.is_initialized());
        localizer.initialize();

        localizer.set_base_path("/elsewhere");
        localizer.set_supported_languages("de");

        assert_eq!(localizer.base_path(), dir.path());
        assert_eq!(localizer.supported_languages(), vec!["en".to_string()]);
        assert_eq!(localizer.initialize().languages(), vec!["en"]);
    }

    #[test]
    fn test_setters_apply_before_first_use() {
        let localizer = Localizer::new();
        localizer.set_base_path(FIXTURE_LOCALES);
        localizer.set_supported_languages(" en , es ");
        assert_eq!(
            localizer.supported_languages(),
            vec!["en".to_string(), "es".to_string()]
        );
        assert_eq!(
            localizer.localize(&Localizable::new("errors.invalid_type", ""), "es"),
            "Tipo inválido encontrado!"
        );
    }

    #[test]
    fn test_concurrent_first_use_initializes_once() {
        let localizer = Arc::new(fixture_localizer());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let localizer = Arc::clone(&localizer);
                thread::spawn(move || {
                    let lang = if i % 2 == 0 { "en" } else { "es" };
                    let rendered =
                        localizer.localize(&Localizable::new("errors.invalid_type", ""), lang);
                    (localizer.initialize() as *const Bundle as usize, rendered)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let first = results[0].0;
        assert!(results.iter().all(|(ptr, _)| *ptr == first));
    }

    #[test]
    fn test_accept_language_list_orders_by_quality() {
        assert_eq!(
            parse_accept_language("en;q=0.5, es-MX, fr;q=0.8"),
            vec!["es-mx".to_string(), "fr".to_string(), "en".to_string()]
        );
        assert!(parse_accept_language("").is_empty());
        assert!(parse_accept_language("*, de;q=0").is_empty());
    }

    #[test]
    fn test_resolve_language_uses_accept_language_list() {
        let localizer = fixture_localizer();
        assert_eq!(localizer.resolve_language("fr-CA,es;q=0.9,en;q=0.8"), "es");
        assert_eq!(localizer.resolve_language("EN_gb"), "en");
        assert_eq!(localizer.resolve_language("ar"), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_localizable_builders() {
        let message = Localizable::from_message("plain")
            .with_var("a", "1")
            .with_vars([("b", "2")]);
        assert!(message.message_id.is_empty());
        assert_eq!(message.message, "plain");
        assert_eq!(message.message_vars.len(), 1);
        assert_eq!(message.message_vars.get("b").map(String::as_str), Some("2"));
    }
}
