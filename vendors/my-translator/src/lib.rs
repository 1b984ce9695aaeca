//! Vocabulary backend vendor. Requests carry one of several api clients; when the
//! upstream blocks traffic (503) the active client is rotated and the call retried once.

mod api;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tolk_auth::AuthProvider;
use tolk_proxy::ProxyChannel;
use tolk_storage::{CellOptions, PersistedCell, StorageAdapter};
use tolk_translator::{
    ProviderMetadata, RetryBudget, TranslateError, TranslateParams, Translation, Translator,
    VendorLanguages, request,
};
use tolk_types::{ProxyRequestInit, ProxyRequestPayload};

use api::{WordDetail, WordDetailRequest};

pub const NAME: &str = "myTranslator";
/// Storage key of the active api client
pub const API_CLIENT_KEY: &str = "my_translator_api_client";
/// Api clients in rotation order, the first one is the default
pub const API_CLIENTS: [&str; 2] = ["gtx", "dict-chrome-ex"];
/// Status the upstream answers with when it blocks the current client
pub const BLOCKED_STATUS: u16 = 503;

const API_CLIENT_HEADER: &str = "X-Api-Client";
const DEFAULT_BACKOFF: Duration = Duration::from_millis(1000);

fn embedded_languages() -> VendorLanguages {
    VendorLanguages::from_json(include_str!("../data/my_translator.json")).unwrap_or_else(|e| {
        tracing::error!("Failed to load embedded myTranslator languages: {}", e);
        VendorLanguages::default()
    })
}

/// Client that follows `current` in [`API_CLIENTS`], wrapping to the first
pub fn next_api_client(current: Option<&str>) -> &'static str {
    let next = current
        .and_then(|current| API_CLIENTS.iter().position(|client| *client == current))
        .map_or(0, |index| index + 1);

    API_CLIENTS.get(next).copied().unwrap_or(API_CLIENTS[0])
}

pub struct MyTranslator {
    metadata: ProviderMetadata,
    languages: VendorLanguages,
    base_url: String,
    backoff: Duration,
    channel: Arc<dyn ProxyChannel>,
    auth: Arc<dyn AuthProvider>,
    api_client: PersistedCell<String>,
}

impl MyTranslator {
    pub fn new(
        base_url: &str,
        channel: Arc<dyn ProxyChannel>,
        storage: Arc<dyn StorageAdapter<String>>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();

        Self {
            metadata: ProviderMetadata {
                name: NAME.to_string(),
                title: NAME.to_string(),
                api_url: format!("{base_url}/vocabulary/words/detail/"),
                public_url: base_url.clone(),
            },
            languages: embedded_languages(),
            base_url,
            backoff: DEFAULT_BACKOFF,
            channel,
            auth,
            api_client: PersistedCell::new(
                API_CLIENT_KEY,
                storage,
                CellOptions::new(API_CLIENTS[0].to_string()),
            ),
        }
    }

    /// Delay before retrying a blocked request
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn api_client(&self) -> &PersistedCell<String> {
        &self.api_client
    }

    /// Wait out the backoff, then switch to the next api client
    async fn refresh_api_client(&self) {
        tokio::time::sleep(self.backoff).await;

        let old_value = self.api_client.get();
        let new_value = next_api_client(old_value.as_deref());
        self.api_client.set(new_value.to_string());

        tracing::info!(
            old_value = old_value.as_deref().unwrap_or_default(),
            new_value,
            "api client refreshed"
        );
    }

    async fn request_detail(
        &self,
        params: &TranslateParams,
        authorization: &str,
    ) -> Result<Translation, TranslateError> {
        let body = serde_json::to_string(&WordDetailRequest { text: &params.text })
            .map_err(|e| TranslateError::Decode(e.to_string()))?;

        let mut init = ProxyRequestInit::post(body)
            .header("Authorization", authorization)
            .header("Content-Type", "application/json");
        if let Some(client) = self.api_client.get() {
            init = init.header(API_CLIENT_HEADER, client);
        }
        let payload = ProxyRequestPayload::new(self.metadata.api_url.clone()).with_init(init);

        let detail: WordDetail = request(self.channel.as_ref(), payload).await?;
        Ok(detail.into_translation(&self.base_url))
    }
}

#[async_trait]
impl Translator for MyTranslator {
    async fn translate(&self, params: &TranslateParams) -> Result<Translation, TranslateError> {
        let Some(authorization) = self.auth.authorization().await else {
            return Err(TranslateError::AuthenticationError);
        };

        let mut retries = RetryBudget::once();
        loop {
            match self.request_detail(params, &authorization).await {
                Ok(translation) => return Ok(translation),
                Err(error) if error.status_code() == BLOCKED_STATUS && retries.try_consume() => {
                    tracing::warn!("{} blocked the request, rotating api client", NAME);
                    self.refresh_api_client().await;
                }
                Err(error) => {
                    tracing::error!(status = error.status_code(), "{} request failed: {}", NAME, error);
                    return Err(error);
                }
            }
        }
    }

    /// The upstream has no speech endpoint
    fn audio_url(&self, _lang: &str, _text: &str) -> Option<String> {
        None
    }

    fn full_page_translation_url(&self, _page_url: &str, _lang: &str) -> Option<String> {
        Some("/".to_string())
    }

    fn languages(&self) -> &VendorLanguages {
        &self.languages
    }

    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }
}
