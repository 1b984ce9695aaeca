use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use tolk_auth::TokenAuth;
use tolk_config::Config;
use tolk_proxy::ProxyChannel;
use tolk_storage::{JsonFileStorage, MemoryStorage, StorageAdapter};
use tolk_translator::{
    RegistryError, TranslateError, TranslateParams, Translation, Translator, VendorRegistry,
};
use tolk_types::ErrorPayload;
use tolk_vendor_deepl::Deepl;
use tolk_vendor_my_translator::MyTranslator;

use crate::history::History;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Translate(#[from] TranslateError),
}

impl AppError {
    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            // Asking for a vendor that does not exist is the caller's mistake
            AppError::Registry(e) => ErrorPayload::new(400, e.to_string()),
            AppError::Translate(e) => e.to_payload(),
        }
    }
}

/// Backing store shared by every persisted cell of the app
#[derive(Clone)]
pub enum Storage {
    Memory(MemoryStorage),
    File(JsonFileStorage),
}

impl Storage {
    pub fn from_config(config: &Config) -> Self {
        if config.storage.ephemeral {
            tracing::info!("Using in-memory storage, nothing will be persisted");
            Storage::Memory(MemoryStorage::new())
        } else {
            tracing::info!(dir = %config.storage.dir.display(), "Using file storage");
            Storage::File(JsonFileStorage::new(config.storage.dir.clone()))
        }
    }

    pub fn adapter<T>(&self) -> Arc<dyn StorageAdapter<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        match self {
            Storage::Memory(storage) => Arc::new(storage.clone()),
            Storage::File(storage) => Arc::new(storage.clone()),
        }
    }
}

pub struct AppState {
    pub config: Config,
    pub channel: Arc<dyn ProxyChannel>,
    pub auth: Arc<TokenAuth>,
    pub deepl: Arc<Deepl>,
    pub my_translator: Arc<MyTranslator>,
    pub registry: Arc<VendorRegistry>,
    pub history: History,
}

impl AppState {
    pub fn new(config: Config, channel: Arc<dyn ProxyChannel>) -> Self {
        let storage = Storage::from_config(&config);
        Self::with_storage(config, storage, channel)
    }

    pub fn with_storage(config: Config, storage: Storage, channel: Arc<dyn ProxyChannel>) -> Self {
        let auth = Arc::new(TokenAuth::new(storage.adapter()));

        let deepl = Arc::new(Deepl::new(
            &config.translator.deepl.api_url,
            channel.clone(),
            storage.adapter(),
        ));

        let my_translator = Arc::new(
            MyTranslator::new(
                &config.translator.my_translator.base_url,
                channel.clone(),
                storage.adapter(),
                auth.clone(),
            )
            .with_backoff(std::time::Duration::from_millis(
                config.translator.my_translator.backoff_ms,
            )),
        );

        // Built once here and only read afterwards
        let mut registry = VendorRegistry::new();
        registry.register(deepl.clone());
        registry.register(my_translator.clone());

        let history = History::new(storage.adapter(), config.history_limit);

        Self {
            config,
            channel,
            auth,
            deepl,
            my_translator,
            registry: Arc::new(registry),
            history,
        }
    }

    /// Wait for every persisted cell to load, bounded by the configured timeout,
    /// then seed the DeepL key from the environment if none is stored yet.
    /// Returns false when some cell did not become ready in time.
    pub async fn prepare(&self) -> bool {
        let ready = async {
            self.auth.token().when_ready().await;
            self.deepl.api_client().when_ready().await;
            self.my_translator.api_client().when_ready().await;
            self.history.cell().when_ready().await;
        };

        if timeout(self.config.storage_ready_timeout(), ready).await.is_err() {
            tracing::warn!(
                timeout_ms = self.config.storage_ready_timeout_ms,
                "Persisted state not ready in time, changes will not be saved"
            );
            return false;
        }

        if let Some(key) = &self.config.translator.deepl.auth_key {
            let stored = self.deepl.api_client().get().unwrap_or_default();
            if stored.auth_key.is_empty() {
                match self.deepl.set_auth_key(key) {
                    Ok(()) => tracing::info!("DeepL auth key seeded from environment"),
                    Err(e) => tracing::error!("Failed to seed DeepL auth key: {}", e),
                }
            }
        }

        true
    }

    /// Translate with the named vendor, falling back to the configured languages
    pub async fn translate(
        &self,
        vendor: &str,
        text: String,
        from: Option<String>,
        to: Option<String>,
    ) -> Result<Translation, AppError> {
        let vendor = self.registry.get(vendor)?;

        let params = TranslateParams::new(
            text,
            from.unwrap_or_else(|| self.config.translator.from_lang.clone()),
            to.unwrap_or_else(|| self.config.translator.to_lang.clone()),
        );

        Ok(translate_checked(vendor.as_ref(), &params).await?)
    }
}

/// Reject pairs the vendor does not list before going to the network
pub async fn translate_checked(
    vendor: &dyn Translator,
    params: &TranslateParams,
) -> Result<Translation, TranslateError> {
    if !vendor.languages().supports(&params.from, &params.to) {
        return Err(TranslateError::UnsupportedLanguagePair {
            from: params.from.clone(),
            to: params.to.clone(),
        });
    }

    tracing::debug!(vendor = vendor.name(), from = %params.from, to = %params.to, "translating");
    vendor.translate(params).await
}
