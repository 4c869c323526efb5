use thiserror::Error;

use crate::session::AuthScreen;

#[derive(Debug, Error)]
/// Ошибки клиентской библиотеки `blog-client`.
pub enum BlogClientError {
    /// Ошибка HTTP-транспорта (`reqwest`): сеть недоступна, соединение сброшено и т.п.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Требуется авторизация (отсутствует/некорректен токен).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Запрошенный ресурс не найден.
    #[error("not found: {0}")]
    NotFound(String),

    /// Некорректный запрос (прочие 4xx).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Сервер ответил ошибкой (5xx или неожиданный статус).
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP-статус ответа.
        status: u16,
        /// Сообщение из тела ответа.
        message: String,
    },

    /// Сервер вернул конверт с `success = false`.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// Конверт с `success = true`, но без `data`.
    #[error("response has no data")]
    EmptyData,

    /// Тело ответа не соответствует ожидаемой схеме.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Ошибка постоянного хранилища токена.
    #[error("storage error: {0}")]
    Storage(String),

    /// Переход, которого нет в машине состояний авторизации.
    #[error("invalid transition from {from:?} on {event}")]
    InvalidTransition {
        /// Экран, на котором находилась сессия.
        from: AuthScreen,
        /// Имя события.
        event: &'static str,
    },

    /// Успешный вход без токена в ответе.
    #[error("login succeeded without a token")]
    MissingToken,

    /// Операция отменена вместе с представлением, которое её запустило.
    #[error("cancelled")]
    Cancelled,
}

/// Результат операций `blog-client`.
pub type BlogClientResult<T> = Result<T, BlogClientError>;

impl BlogClientError {
    pub(crate) fn from_http_status(status: reqwest::StatusCode, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| format!("http status {status}"));
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Self::Unauthorized(message)
            }
            reqwest::StatusCode::NOT_FOUND => Self::NotFound(message),
            status if status.is_client_error() => Self::InvalidRequest(message),
            status => Self::Server {
                status: status.as_u16(),
                message,
            },
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_http_status(status, None);
        }
        Self::Http(err)
    }

    /// Текст, который представление показывает пользователю.
    ///
    /// Для ошибок сервера это сообщение из тела ответа без технического префикса.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized(message)
            | Self::NotFound(message)
            | Self::InvalidRequest(message)
            | Self::Rejected(message)
            | Self::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
