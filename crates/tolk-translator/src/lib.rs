mod error;
mod registry;
mod request;
mod retry;
mod types;

pub use error::TranslateError;
pub use registry::{RegistryError, VendorRegistry};
pub use request::request;
pub use retry::RetryBudget;
pub use types::{
    AUTO_DETECT, DictionaryEntry, LanguageCode, Meaning, ProviderMetadata, TranslateParams,
    Translation, VendorLanguages,
};

/// Translation provider interface
#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    /// Translate `params.text` into `params.to`
    async fn translate(&self, params: &TranslateParams) -> Result<Translation, TranslateError>;

    /// Url of a spoken rendition of `text`, `None` when unsupported or too long
    fn audio_url(&self, _lang: &str, _text: &str) -> Option<String> {
        None
    }

    /// Url that opens `page_url` translated into `lang` on the vendor's site
    fn full_page_translation_url(&self, _page_url: &str, _lang: &str) -> Option<String> {
        None
    }

    /// Supported language pairs
    fn languages(&self) -> &VendorLanguages;

    /// Provider metadata
    fn metadata(&self) -> &ProviderMetadata;

    fn name(&self) -> &str {
        &self.metadata().name
    }
}
