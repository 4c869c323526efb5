//! Машина состояний авторизации: какой экран показывать.
//!
//! ```text
//! login --LoginSucceeded--> home      (токен сохраняется)
//! login --ShowRegister----> register
//! register --RegisterSucceeded--> login
//! register --ShowLogin----> login
//! ```
//!
//! `home` терминален: выхода из сессии нет.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::error::{BlogClientError, BlogClientResult};
use crate::storage::{TOKEN_KEY, TokenStorage, load_token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Экран приложения.
pub enum AuthScreen {
    /// Форма входа.
    Login,
    /// Форма регистрации.
    Register,
    /// Лента постов.
    Home,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Событие, меняющее экран.
pub enum AuthEvent {
    /// Сервер принял учётные данные и выдал токен.
    LoginSucceeded {
        /// Токен сессии.
        token: String,
    },
    /// Пользователь перешёл к регистрации.
    ShowRegister,
    /// Регистрация прошла успешно.
    RegisterSucceeded,
    /// Пользователь вернулся к форме входа.
    ShowLogin,
}

impl AuthEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::LoginSucceeded { .. } => "LoginSucceeded",
            Self::ShowRegister => "ShowRegister",
            Self::RegisterSucceeded => "RegisterSucceeded",
            Self::ShowLogin => "ShowLogin",
        }
    }
}

/// Состояние авторизации: текущий экран и токен сессии.
pub struct Session {
    screen: AuthScreen,
    token: Option<String>,
    storage: Arc<dyn TokenStorage>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("screen", &self.screen)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl Session {
    /// Восстанавливает сессию из хранилища до первой отрисовки.
    ///
    /// Сохранённый токен сразу даёт `Home`, иначе `Login`.
    pub fn restore(storage: Arc<dyn TokenStorage>) -> BlogClientResult<Self> {
        let token = load_token(storage.as_ref())?;
        let screen = if token.is_some() {
            AuthScreen::Home
        } else {
            AuthScreen::Login
        };
        info!(?screen, "session restored");

        Ok(Self {
            screen,
            token,
            storage,
        })
    }

    /// Текущий экран.
    pub fn screen(&self) -> AuthScreen {
        self.screen
    }

    /// Токен сессии, если пользователь вошёл.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Применяет событие и возвращает новый экран.
    ///
    /// Недопустимое событие оставляет сессию без изменений.
    pub fn apply(&mut self, event: AuthEvent) -> BlogClientResult<AuthScreen> {
        let from = self.screen;
        let next = match (from, event) {
            (AuthScreen::Login, AuthEvent::LoginSucceeded { token }) => {
                let token = token.trim();
                if token.is_empty() {
                    return Err(BlogClientError::MissingToken);
                }
                self.storage.set(TOKEN_KEY, token)?;
                self.token = Some(token.to_string());
                AuthScreen::Home
            }
            (AuthScreen::Login, AuthEvent::ShowRegister) => AuthScreen::Register,
            (AuthScreen::Register, AuthEvent::RegisterSucceeded | AuthEvent::ShowLogin) => {
                AuthScreen::Login
            }
            (from, event) => {
                return Err(BlogClientError::InvalidTransition {
                    from,
                    event: event.name(),
                });
            }
        };

        info!(?from, to = ?next, "auth screen changed");
        self.screen = next;
        Ok(next)
    }
}
