use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use kanal::{AsyncReceiver, AsyncSender};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tolk_types::{
    ErrorPayload, Message, MessageId, MessageType, ProxyRequestPayload, ProxyRequestResponse,
    ResponseType,
};

/// Privileged side of the proxy channel: performs requests over HTTP
#[derive(Clone)]
pub struct ProxyWorker {
    client: reqwest::Client,
}

impl ProxyWorker {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Serve requests until cancelled or until every request sender is gone.
    /// Every request that carries an id gets exactly one response.
    pub async fn run(
        self,
        requests: AsyncReceiver<Message<ProxyRequestPayload>>,
        responses: AsyncSender<ProxyRequestResponse>,
        cancel: CancellationToken,
    ) {
        let worker = Arc::new(self);
        tracing::info!("proxy worker started");

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = requests.recv() => match message {
                    Ok(message) => message,
                    Err(_) => break,
                },
            };

            let Some(id) = message.id else {
                tracing::warn!("dropping proxy request without id");
                continue;
            };

            let worker = Arc::clone(&worker);
            let responses = responses.clone();
            tokio::spawn(async move {
                let response = match (message.kind, message.payload) {
                    (MessageType::ProxyRequest, Some(payload)) => worker.perform(id, payload).await,
                    (kind, _) => ProxyRequestResponse {
                        message_id: id,
                        url: String::new(),
                        data: None,
                        error: Some(ErrorPayload::new(0, format!("Not a proxy request: {kind:?}"))),
                    },
                };

                if responses.send(response).await.is_err() {
                    tracing::warn!("proxy response channel closed");
                }
            });
        }

        tracing::info!("proxy worker stopped");
    }

    /// Perform one request and wrap the outcome into its response
    pub async fn perform(&self, message_id: MessageId, payload: ProxyRequestPayload) -> ProxyRequestResponse {
        tracing::debug!(%message_id, url = %payload.url, "performing proxy request");

        let (data, error) = match self.fetch(&payload).await {
            Ok(data) => (Some(data), None),
            Err(error) => {
                tracing::debug!(
                    %message_id,
                    status = error.status_code,
                    "proxy request failed: {}",
                    error.message
                );
                (None, Some(error))
            }
        };

        ProxyRequestResponse {
            message_id,
            url: payload.url,
            data,
            error,
        }
    }

    async fn fetch(&self, payload: &ProxyRequestPayload) -> Result<Value, ErrorPayload> {
        let init = payload.request_init.clone().unwrap_or_default();

        let method = init
            .method
            .as_deref()
            .unwrap_or("GET")
            .to_uppercase()
            .parse::<reqwest::Method>()
            .map_err(|e| ErrorPayload::new(0, format!("Invalid method: {e}")))?;

        let mut request = self.client.request(method, &payload.url);
        for (name, value) in &init.headers {
            request = request.header(name, value);
        }
        if let Some(body) = init.body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            ErrorPayload::new(e.status().map_or(0, |status| status.as_u16()), e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorPayload::new(status.as_u16(), error_message(status, body)));
        }

        let parse_error =
            |e: reqwest::Error| ErrorPayload::new(status.as_u16(), format!("Failed to read response: {e}"));

        match payload.response_type.unwrap_or_default() {
            ResponseType::Json => response.json::<Value>().await.map_err(parse_error),
            ResponseType::Text => Ok(Value::String(response.text().await.map_err(parse_error)?)),
            ResponseType::DataUri => {
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = response.bytes().await.map_err(parse_error)?;
                Ok(Value::String(format!(
                    "data:{content_type};base64,{}",
                    STANDARD.encode(&bytes)
                )))
            }
        }
    }
}

impl Default for ProxyWorker {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefer the `message` field of a json error body, else the raw body
fn error_message(status: reqwest::StatusCode, body: String) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(&body)
        && let Some(Value::String(message)) = fields.get("message")
    {
        return message.clone();
    }

    if body.trim().is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string();
    }

    body
}
