use serde::de::DeserializeOwned;
use serde_json::Value;
use tolk_proxy::ProxyChannel;
use tolk_types::ProxyRequestPayload;

use crate::error::TranslateError;

/// Send a request over the proxy channel and decode the response data.
///
/// Channel failures and responses carrying an `error` are both returned as
/// [`TranslateError`]s.
pub async fn request<R>(channel: &dyn ProxyChannel, payload: ProxyRequestPayload) -> Result<R, TranslateError>
where
    R: DeserializeOwned,
{
    let response = channel.send(payload).await?;

    if let Some(error) = response.error {
        return Err(error.into());
    }

    let data = response.data.unwrap_or(Value::Null);
    serde_json::from_value(data).map_err(|e| TranslateError::Decode(e.to_string()))
}
