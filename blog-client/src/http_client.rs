use std::time::Duration;

use reqwest::{Client, Method};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::envelope::ApiResponse;
use crate::error::{BlogClientError, BlogClientResult};

#[derive(Debug, Deserialize)]
struct ErrorResponseDto {
    message: Option<String>,
    error: Option<String>,
}

/// Создаёт общий `reqwest::Client`. Без `timeout` запросы ждут транспорт сколько угодно.
pub(crate) fn build_client(timeout: Option<Duration>) -> BlogClientResult<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(BlogClientError::Http)
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorResponseDto>(body)
        .ok()
        .and_then(|dto| dto.message.or(dto.error))
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("http status {status}"))
}

#[derive(Debug, Clone)]
/// HTTP-клиент для одного базового URL API.
pub(crate) struct HttpClient {
    base_url: String,
    client: Client,
}

impl HttpClient {
    pub(crate) fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// универсальный helper: json-payload (если есть), bearer (если есть), разбор конверта
    pub(crate) async fn send<TReq, TRes>(
        &self,
        method: Method,
        path: &str,
        body: Option<&TReq>,
        token: Option<&str>,
    ) -> BlogClientResult<ApiResponse<TRes>>
    where
        TReq: Serialize + ?Sized,
        TRes: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!(%method, %url, authorized = token.is_some(), "sending request");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(BlogClientError::from_reqwest)?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(BlogClientError::from_reqwest)?;

        if !status.is_success() {
            return Err(BlogClientError::from_http_status(
                status,
                Some(error_message(status, &text)),
            ));
        }

        ApiResponse::from_body(&text)
    }
}
