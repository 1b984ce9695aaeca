use std::env;

use serde::{Deserialize, Serialize};

fn default_vendor() -> String {
    "deepl".to_string()
}

fn default_from_lang() -> String {
    "auto".to_string()
}

fn default_to_lang() -> String {
    "en".to_string()
}

fn default_deepl_api_url() -> String {
    "https://api-free.deepl.com/v2".to_string()
}

fn default_my_translator_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_backoff_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    #[serde(default = "default_vendor")]
    pub vendor: String,
    #[serde(default = "default_from_lang")]
    pub from_lang: String,
    #[serde(default = "default_to_lang")]
    pub to_lang: String,
    pub deepl: DeeplConfig,
    pub my_translator: MyTranslatorConfig,
}

impl TranslatorConfig {
    pub fn new() -> Self {
        Self {
            vendor: env::var("TOLK_DEFAULT_VENDOR").unwrap_or_else(|_| default_vendor()),
            from_lang: env::var("TOLK_DEFAULT_FROM").unwrap_or_else(|_| default_from_lang()),
            to_lang: env::var("TOLK_DEFAULT_TO").unwrap_or_else(|_| default_to_lang()),
            deepl: DeeplConfig::new(),
            my_translator: MyTranslatorConfig::new(),
        }
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            vendor: default_vendor(),
            from_lang: default_from_lang(),
            to_lang: default_to_lang(),
            deepl: DeeplConfig::default(),
            my_translator: MyTranslatorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeeplConfig {
    #[serde(default = "default_deepl_api_url")]
    pub api_url: String,
    /// Seeds the persisted auth key when set
    #[serde(default)]
    pub auth_key: Option<String>,
}

impl DeeplConfig {
    pub fn new() -> Self {
        Self {
            api_url: env::var("DEEPL_API_URL").unwrap_or_else(|_| default_deepl_api_url()),
            auth_key: env::var("DEEPL_AUTH_KEY").ok().filter(|key| !key.is_empty()),
        }
    }
}

impl Default for DeeplConfig {
    fn default() -> Self {
        Self {
            api_url: default_deepl_api_url(),
            auth_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MyTranslatorConfig {
    #[serde(default = "default_my_translator_base_url")]
    pub base_url: String,
    /// Delay before retrying with the next api client
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl MyTranslatorConfig {
    pub fn new() -> Self {
        let backoff_ms = env::var("MY_TRANSLATOR_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_backoff_ms);

        Self {
            base_url: env::var("MY_TRANSLATOR_BASE_URL")
                .unwrap_or_else(|_| default_my_translator_base_url()),
            backoff_ms,
        }
    }
}

impl Default for MyTranslatorConfig {
    fn default() -> Self {
        Self {
            base_url: default_my_translator_base_url(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: TranslatorConfig =
            serde_json::from_str(r#"{"vendor":"myTranslator","deepl":{"auth_key":"k:fx"}}"#).unwrap();

        assert_eq!(config.vendor, "myTranslator");
        assert_eq!(config.from_lang, "auto");
        assert_eq!(config.deepl.api_url, "https://api-free.deepl.com/v2");
        assert_eq!(config.deepl.auth_key.as_deref(), Some("k:fx"));
        assert_eq!(config.my_translator.backoff_ms, 1000);
    }
}
