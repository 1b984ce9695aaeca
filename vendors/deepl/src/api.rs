use serde::{Deserialize, Serialize};

/// Persisted credentials of the DeepL api client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeeplApiClient {
    pub auth_key: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeeplTranslationResponse {
    pub translations: Vec<DeeplTranslation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeeplTranslation {
    pub detected_source_language: String,
    pub text: String,
}

/// See <https://www.deepl.com/docs-api/other-functions/monitoring-usage/>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeeplUsage {
    pub character_count: u64,
    pub character_limit: u64,
}

/// See <https://www.deepl.com/docs-api/other-functions/listing-supported-languages/>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeeplSupportedLanguage {
    /// Language code, e.g. "EN-US"
    pub language: String,
    /// English name of the language
    pub name: String,
    /// Only included for target languages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_formality: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageListKind {
    Source,
    Target,
}

impl LanguageListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageListKind::Source => "source",
            LanguageListKind::Target => "target",
        }
    }
}

/// Status codes documented at <https://www.deepl.com/docs-api/accessing-the-api/error-handling/>
pub mod status {
    pub const BAD_REQUEST: u16 = 400;
    pub const AUTH_FAILED: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const REQUEST_EXCEED_LIMIT: u16 = 413;
    pub const REQUEST_TOO_LONG: u16 = 414;
    pub const TOO_MANY_REQUESTS: u16 = 429;
    pub const QUOTA_EXCEED: u16 = 456;
    pub const SERVICE_BREAK: u16 = 503;
}
