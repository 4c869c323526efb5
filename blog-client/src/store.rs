use std::sync::Arc;
use std::time::Duration;

use crate::auth_api::AuthApi;
use crate::blog_api::BlogApi;
use crate::error::BlogClientResult;
use crate::http_client::{HttpClient, build_client};
use crate::session::Session;
use crate::storage::TokenStorage;

/// Базовый URL API по умолчанию.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";

#[derive(Debug, Clone)]
/// Параметры клиента.
pub struct ClientConfig {
    /// Базовый URL API, например `http://localhost:3000/api`.
    pub api_base_url: String,
    /// Таймаут запроса. `None`: ждать транспорт без ограничения.
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Конфигурация с базовым URL и без таймаута.
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            request_timeout: None,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

#[derive(Clone)]
/// Контекст приложения: оба клиента API, их кэш и хранилище токена.
///
/// Создаётся один раз при старте и явно передаётся представлениям.
pub struct Store {
    auth: AuthApi,
    blog: BlogApi,
    storage: Arc<dyn TokenStorage>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("auth", &self.auth)
            .field("blog", &self.blog)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Собирает контекст. Оба клиента делят один `reqwest::Client`.
    pub fn new(config: &ClientConfig, storage: Arc<dyn TokenStorage>) -> BlogClientResult<Self> {
        let client = build_client(config.request_timeout)?;
        let base_url = config.api_base_url.trim_end_matches('/');

        let auth = AuthApi::new(HttpClient::with_client(base_url, client.clone()));
        let blog = BlogApi::new(
            HttpClient::with_client(format!("{base_url}/post"), client),
            Arc::clone(&storage),
        );

        Ok(Self {
            auth,
            blog,
            storage,
        })
    }

    /// Клиент `/auth/*`.
    pub fn auth(&self) -> &AuthApi {
        &self.auth
    }

    /// Клиент `/post/*`.
    pub fn blog(&self) -> &BlogApi {
        &self.blog
    }

    /// Восстанавливает машину состояний авторизации из хранилища.
    pub fn session(&self) -> BlogClientResult<Session> {
        Session::restore(Arc::clone(&self.storage))
    }
}
