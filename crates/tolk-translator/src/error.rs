use tolk_proxy::ProxyError;
use tolk_types::ErrorPayload;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslateError {
    #[error("API error ({status_code}): {message}")]
    Api { status_code: u16, message: String },

    #[error("Proxy channel error: {0}")]
    Channel(String),

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Request size of {size} bytes exceeds the limit of {limit} bytes")]
    RequestTooLarge { size: usize, limit: usize },

    #[error("Unsupported language pair: {from} -> {to}")]
    UnsupportedLanguagePair { from: String, to: String },

    #[error("Authentication error")]
    AuthenticationError,
}

impl TranslateError {
    /// Upstream HTTP status, 0 when the failure never reached the vendor
    pub fn status_code(&self) -> u16 {
        match self {
            TranslateError::Api { status_code, .. } => *status_code,
            TranslateError::Channel(_) | TranslateError::Decode(_) => 0,
            TranslateError::RequestTooLarge { .. } => 413,
            TranslateError::UnsupportedLanguagePair { .. } => 400,
            TranslateError::AuthenticationError => 401,
        }
    }

    pub fn message(&self) -> String {
        match self {
            TranslateError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload::new(self.status_code(), self.message())
    }
}

impl From<ErrorPayload> for TranslateError {
    fn from(error: ErrorPayload) -> Self {
        TranslateError::Api {
            status_code: error.status_code,
            message: error.message,
        }
    }
}

impl From<ProxyError> for TranslateError {
    fn from(error: ProxyError) -> Self {
        TranslateError::Channel(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let api = TranslateError::from(ErrorPayload::new(456, "Quota exceeded"));
        assert_eq!(api.status_code(), 456);
        assert_eq!(api.message(), "Quota exceeded");

        let channel = TranslateError::from(ProxyError::ChannelClosed);
        assert_eq!(channel.status_code(), 0);
        assert_eq!(channel.message(), "Proxy channel error: Proxy channel closed");

        assert_eq!(
            TranslateError::AuthenticationError.to_payload(),
            ErrorPayload::new(401, "Authentication error")
        );
    }
}
