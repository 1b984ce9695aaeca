mod api;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tolk_proxy::ProxyChannel;
use tolk_storage::{CellOptions, PersistedCell, StorageAdapter, StorageError};
use tolk_translator::{
    AUTO_DETECT, ProviderMetadata, TranslateError, TranslateParams, Translation, Translator,
    VendorLanguages, request,
};
use tolk_types::{ProxyRequestInit, ProxyRequestPayload};
use url::form_urlencoded;

pub use api::{DeeplApiClient, DeeplSupportedLanguage, DeeplUsage, LanguageListKind, status};

use api::DeeplTranslationResponse;

pub const NAME: &str = "deepl";
/// Storage key of the persisted [`DeeplApiClient`]
pub const API_CLIENT_KEY: &str = "deepl_api_client";
/// Largest request body the api accepts
pub const REQUEST_MAX_SIZE: usize = 1024 * 30;

fn embedded_languages() -> VendorLanguages {
    VendorLanguages::from_json(include_str!("../data/deepl.json")).unwrap_or_else(|e| {
        tracing::error!("Failed to load embedded DeepL languages: {}", e);
        VendorLanguages::default()
    })
}

/// DeepL REST api, authenticated with a persisted auth key
pub struct Deepl {
    metadata: ProviderMetadata,
    languages: VendorLanguages,
    channel: Arc<dyn ProxyChannel>,
    api_client: PersistedCell<DeeplApiClient>,
}

impl Deepl {
    pub fn new(
        api_url: &str,
        channel: Arc<dyn ProxyChannel>,
        storage: Arc<dyn StorageAdapter<DeeplApiClient>>,
    ) -> Self {
        Self {
            metadata: ProviderMetadata {
                name: NAME.to_string(),
                title: "Deepl".to_string(),
                api_url: api_url.trim_end_matches('/').to_string(),
                public_url: "https://www.deepl.com/translator".to_string(),
            },
            languages: embedded_languages(),
            channel,
            api_client: PersistedCell::new(
                API_CLIENT_KEY,
                storage,
                CellOptions::new(DeeplApiClient::default()),
            ),
        }
    }

    pub fn api_client(&self) -> &PersistedCell<DeeplApiClient> {
        &self.api_client
    }

    /// Replace the auth key, keeping any other client settings
    pub fn set_auth_key(&self, auth_key: &str) -> Result<(), StorageError> {
        self.api_client.merge(json!({ "authKey": auth_key }))
    }

    fn auth_key(&self) -> Result<String, TranslateError> {
        let DeeplApiClient { auth_key } = self.api_client.get().unwrap_or_default();
        if auth_key.is_empty() {
            return Err(TranslateError::AuthenticationError);
        }
        Ok(auth_key)
    }

    /// Characters translated and allowed in the current billing period
    pub async fn usage(&self) -> Result<DeeplUsage, TranslateError> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("auth_key", &self.auth_key()?)
            .finish();
        let url = format!("{}/usage?{}", self.metadata.api_url, query);

        request(self.channel.as_ref(), ProxyRequestPayload::new(url)).await
    }

    pub async fn supported_languages(
        &self,
        kind: LanguageListKind,
    ) -> Result<Vec<DeeplSupportedLanguage>, TranslateError> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("auth_key", &self.auth_key()?)
            .append_pair("type", kind.as_str())
            .finish();
        let url = format!("{}/languages?{}", self.metadata.api_url, query);

        request(self.channel.as_ref(), ProxyRequestPayload::new(url)).await
    }

    /// Build a fresh language table from the api, in the embedded format
    pub async fn dump_languages(&self) -> Result<VendorLanguages, TranslateError> {
        let from = self.supported_languages(LanguageListKind::Source).await?;
        let to = self.supported_languages(LanguageListKind::Target).await?;

        let mut languages = VendorLanguages::default();
        languages
            .from
            .insert(AUTO_DETECT.to_string(), "Auto-detect".to_string());
        for DeeplSupportedLanguage { language, name, .. } in from {
            languages.from.insert(language.to_lowercase(), name);
        }
        for DeeplSupportedLanguage { language, name, .. } in to {
            languages.to.insert(language.to_lowercase(), name);
        }

        Ok(languages)
    }
}

/// DeepL wraps some error messages in json quotes
fn unwrap_quoted_message(error: TranslateError) -> TranslateError {
    match error {
        TranslateError::Api {
            status_code,
            message,
        } if message.len() >= 2 && message.starts_with('"') && message.ends_with('"') => {
            let message = serde_json::from_str::<String>(&message).unwrap_or(message);
            TranslateError::Api {
                status_code,
                message,
            }
        }
        other => other,
    }
}

#[async_trait]
impl Translator for Deepl {
    async fn translate(&self, params: &TranslateParams) -> Result<Translation, TranslateError> {
        let auth_key = self.auth_key()?;

        let source_lang = if params.is_auto_detect() {
            String::new()
        } else {
            params.from.to_uppercase()
        };
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("text", &params.text)
            .append_pair("source_lang", &source_lang)
            .append_pair("target_lang", &params.to.to_uppercase())
            .finish();

        if body.len() > REQUEST_MAX_SIZE {
            return Err(TranslateError::RequestTooLarge {
                size: body.len(),
                limit: REQUEST_MAX_SIZE,
            });
        }

        let init = ProxyRequestInit::post(body)
            .header("Authorization", format!("DeepL-Auth-Key {}", auth_key))
            .header("Content-type", "application/x-www-form-urlencoded");
        let payload =
            ProxyRequestPayload::new(format!("{}/translate", self.metadata.api_url)).with_init(init);

        let response: DeeplTranslationResponse = request(self.channel.as_ref(), payload)
            .await
            .map_err(unwrap_quoted_message)?;

        let translated = response
            .translations
            .into_iter()
            .next()
            .ok_or_else(|| TranslateError::Decode("No translation in response".to_string()))?;

        Ok(Translation {
            translation: translated.text,
            lang_detected: translated.detected_source_language.to_lowercase(),
            ..Default::default()
        })
    }

    fn languages(&self) -> &VendorLanguages {
        &self.languages
    }

    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }
}
