//! Клиентская библиотека блога: авторизация, лента постов и создание постов
//! поверх REST API (`/auth/*`, `/post/*`).
//!
//! Состав:
//! - [`AuthApi`] и [`BlogApi`]: запросы к API, ответы в конверте [`ApiResponse`];
//! - [`QueryCache`]: кэш запросов с инвалидацией по тегам;
//! - [`Session`]: машина состояний экранов `login`/`register`/`home`, токен
//!   хранится в [`TokenStorage`] под ключом [`TOKEN_KEY`];
//! - [`Store`]: контекст приложения, который явно передаётся представлениям;
//! - [`views`]: модели форм и ленты, независимые от способа отрисовки.
#![warn(missing_docs)]

mod auth_api;
mod blog_api;
mod cache;
mod envelope;
mod error;
mod http_client;
mod models;
mod scope;
mod session;
mod storage;
mod store;
pub mod views;

pub use auth_api::AuthApi;
pub use blog_api::{BlogApi, FETCH_ALL_POSTS, FETCH_PERSONAL_POSTS, PostsResponse};
pub use cache::{CacheEntry, QueryCache, QueryKey, Subscription, Tag};
pub use envelope::ApiResponse;
pub use error::{BlogClientError, BlogClientResult};
pub use models::{BlogPost, Comment, LoginData, NewBlogPost};
pub use scope::{CancelToken, ViewScope};
pub use session::{AuthEvent, AuthScreen, Session};
pub use storage::{FileStorage, MemoryStorage, TOKEN_KEY, TokenStorage, load_token};
pub use store::{ClientConfig, DEFAULT_API_BASE_URL, Store};
