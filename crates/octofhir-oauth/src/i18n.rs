//! Localised error descriptions.
//!
//! A [`MessageCatalog`] maps an error code to a description per locale. The
//! provider consults it before an error is written, picking the first locale
//! the request asks for (`ui_locales`, then `Accept-Language`) that the
//! catalog knows.

use std::collections::HashMap;

use axum::http::{HeaderMap, header};

use crate::OAuthError;
use crate::types::Form;

/// Lookup of localised messages.
pub trait MessageCatalog: Send + Sync {
    /// Returns the message for `id` in `locale`, if the catalog has one.
    fn get_message(&self, id: &str, locale: &str) -> Option<String>;
}

/// In-memory catalog keyed by locale, then message id.
#[derive(Debug, Clone, Default)]
pub struct DefaultMessageCatalog {
    messages: HashMap<String, HashMap<String, String>>,
}

impl DefaultMessageCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message.
    #[must_use]
    pub fn with_message(
        mut self,
        locale: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.messages
            .entry(normalize(&locale.into()))
            .or_default()
            .insert(id.into(), message.into());
        self
    }
}

impl MessageCatalog for DefaultMessageCatalog {
    fn get_message(&self, id: &str, locale: &str) -> Option<String> {
        let messages = self.messages.get(&normalize(locale)).or_else(|| {
            // "de-CH" falls back to "de"
            let (language, _) = locale.split_once('-')?;
            self.messages.get(&normalize(language))
        })?;
        messages.get(id).cloned()
    }
}

fn normalize(locale: &str) -> String {
    locale.trim().to_ascii_lowercase().replace('_', "-")
}

/// Collects the locales a request asks for, most preferred first.
///
/// `ui_locales` wins over `Accept-Language`. Quality values are ignored
/// beyond their ordering in the header.
#[must_use]
pub fn requested_locales(form: &Form, headers: &HeaderMap) -> Vec<String> {
    let mut locales: Vec<String> = form
        .get("ui_locales")
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    if let Some(accept) = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
    {
        locales.extend(
            accept
                .split(',')
                .filter_map(|part| part.split(';').next())
                .map(str::trim)
                .filter(|tag| !tag.is_empty() && *tag != "*")
                .map(str::to_string),
        );
    }

    locales
}

/// Replaces the description of `error` with the catalog's message for the
/// first matching locale. The error code is the message id.
#[must_use]
pub fn localize_error(
    catalog: &dyn MessageCatalog,
    error: &OAuthError,
    locales: &[String],
) -> OAuthError {
    locales
        .iter()
        .find_map(|locale| catalog.get_message(error.oauth_error_code(), locale))
        .map_or_else(|| error.clone(), |message| error.clone().with_description(message))
}
