use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{BlogClientError, BlogClientResult};

const FALLBACK_FAILURE_MESSAGE: &str = "request was not successful";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Общий конверт ответа API: `{data, success, message}`.
///
/// При `success = false` поле `data` не заполняется: что бы сервер туда ни
/// положил, полагаться на это нельзя, и вызывающий код показывает `message`.
pub struct ApiResponse<T> {
    /// Полезная нагрузка (только для успешных ответов).
    pub data: Option<T>,
    /// Признак успешности операции на стороне сервера.
    pub success: bool,
    /// Человекочитаемое сообщение сервера.
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    data: serde_json::Value,
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Успешный ответ с данными.
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            success: true,
            message: None,
        }
    }

    /// Ответ с `success = false`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            data: None,
            success: false,
            message: Some(message.into()),
        }
    }

    /// Сообщение сервера для неуспешного ответа (или общий текст, если сервер промолчал).
    pub fn failure_message(&self) -> String {
        self.message
            .clone()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_FAILURE_MESSAGE.to_string())
    }

    /// Превращает конверт в `Result`: `Rejected` для `success = false`,
    /// `EmptyData` для успешного ответа без данных.
    pub fn into_data(self) -> BlogClientResult<T> {
        if !self.success {
            return Err(BlogClientError::Rejected(self.failure_message()));
        }
        self.data.ok_or(BlogClientError::EmptyData)
    }
}

impl<T: DeserializeOwned> ApiResponse<T> {
    /// Декодирует тело ответа. `data` разбирается в `T` только при `success = true`.
    pub fn from_body(body: &str) -> BlogClientResult<Self> {
        let raw: RawEnvelope = serde_json::from_str(body)?;

        let data = if raw.success && !raw.data.is_null() {
            Some(serde_json::from_value(raw.data)?)
        } else {
            None
        };

        Ok(Self {
            data,
            success: raw.success,
            message: raw.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Token {
        token: String,
    }

    #[test]
    fn decodes_successful_envelope() {
        let body = r#"{"data":{"token":"abc"},"success":true,"message":null}"#;
        let response = ApiResponse::<Token>::from_body(body).expect("must decode");
        assert!(response.success);
        assert_eq!(
            response.data,
            Some(Token {
                token: "abc".to_string()
            })
        );
    }

    #[test]
    fn failure_ignores_malformed_data() {
        let body = r#"{"data":"garbage","success":false,"message":"invalid credentials"}"#;
        let response = ApiResponse::<Token>::from_body(body).expect("must decode");
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.failure_message(), "invalid credentials");
    }

    #[test]
    fn success_with_wrong_data_shape_is_decode_error() {
        let body = r#"{"data":[1,2],"success":true,"message":null}"#;
        let err = ApiResponse::<Token>::from_body(body).expect_err("must fail");
        assert!(matches!(err, BlogClientError::Decode(_)));
    }

    #[test]
    fn into_data_reports_rejection_and_empty_data() {
        let rejected = ApiResponse::<Token>::failure("email taken").into_data();
        assert!(matches!(rejected, Err(BlogClientError::Rejected(ref m)) if m == "email taken"));

        let empty = ApiResponse::<Token>::from_body(r#"{"success":true}"#)
            .expect("must decode")
            .into_data();
        assert!(matches!(empty, Err(BlogClientError::EmptyData)));
    }

    #[test]
    fn failure_message_falls_back_when_blank() {
        let response: ApiResponse<()> = ApiResponse {
            data: None,
            success: false,
            message: Some("  ".to_string()),
        };
        assert_eq!(response.failure_message(), FALLBACK_FAILURE_MESSAGE);
    }
}
