// SPDX-License-Identifier: MPL-2.0

//! Internationalization (i18n) Support
//!
//! User-visible strings (tray title, menu labels, tooltip) live in Fluent
//! files under `i18n/`:
//!
//! ```text
//! i18n/
//! ├── en/
//! │   └── weather_widget.ftl   # English (fallback)
//! └── zh-CN/
//!     └── weather_widget.ftl
//! ```
//!
//! Use the `fl!()` macro to request localized strings:
//!
//! ```rust
//! let title = fl!("app-title");
//! let tip = fl!("tray-tooltip", condition = "Sunny 23℃", time = "14:05");
//! ```

use std::sync::LazyLock;

use i18n_embed::{
    fluent::{fluent_language_loader, FluentLanguageLoader},
    unic_langid::LanguageIdentifier,
    DefaultLocalizer, LanguageLoader, Localizer,
};
use rust_embed::RustEmbed;

/// Select the best available translation for the user's languages.
///
/// Call once at startup; English is used when nothing matches.
pub fn init(requested_languages: &[LanguageIdentifier]) {
    if let Err(why) = localizer().select(requested_languages) {
        log::warn!("error while loading fluent localizations: {why}");
    }
}

#[must_use]
pub fn localizer() -> Box<dyn Localizer> {
    Box::from(DefaultLocalizer::new(&*LANGUAGE_LOADER, &Localizations))
}

/// Translation files, embedded at compile time.
#[derive(RustEmbed)]
#[folder = "i18n/"]
struct Localizations;

/// Global Fluent language loader, with English preloaded as fallback.
pub static LANGUAGE_LOADER: LazyLock<FluentLanguageLoader> = LazyLock::new(|| {
    let loader: FluentLanguageLoader = fluent_language_loader!();

    if let Err(e) = loader.load_fallback_language(&Localizations) {
        log::error!("Error while loading fallback language: {}", e);
    }

    // Tray hosts render the tooltip as plain text; bidi isolation marks show up as boxes
    loader.set_use_isolating(false);

    loader
});

/// Request a localized string by ID from the translation files.
///
/// Unknown IDs are rejected at compile time against the English file.
#[macro_export]
macro_rules! fl {
    ($message_id:literal) => {{
        i18n_embed_fl::fl!($crate::i18n::LANGUAGE_LOADER, $message_id)
    }};

    ($message_id:literal, $($args:expr),*) => {{
        i18n_embed_fl::fl!($crate::i18n::LANGUAGE_LOADER, $message_id, $($args), *)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_strings_resolve() {
        let loader = &*LANGUAGE_LOADER;
        assert!(loader.has("app-title"));
        assert_eq!(crate::fl!("menu-quit"), "Quit");
    }

    #[test]
    fn test_tooltip_interpolation() {
        let text = crate::fl!("tray-tooltip", condition = "Sunny 23℃", time = "14:05");
        assert!(text.starts_with("Sunny 23℃"));
        assert!(text.ends_with("14:05"));
    }
}
