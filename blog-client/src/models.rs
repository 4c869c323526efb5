use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Публичная модель поста.
///
/// `id`, даты и `author_id` назначает сервер при создании; дальше пост
/// только читается.
pub struct BlogPost {
    /// Идентификатор поста.
    pub id: String,
    /// Дата и время создания поста (UTC).
    pub created_at: DateTime<Utc>,
    /// Дата и время последнего обновления поста (UTC).
    pub updated_at: DateTime<Utc>,
    /// Идентификатор автора.
    pub author_id: String,
    /// Заголовок поста.
    pub title: String,
    /// Подзаголовок поста.
    pub subtitle: String,
    /// Содержимое поста.
    pub content: String,
    /// Комментарии (сервер пока не описывает их структуру).
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Комментарий к посту. Поля не определены, любые ключи игнорируются.
pub struct Comment {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Данные успешного входа.
pub struct LoginData {
    /// Токен сессии.
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Поля нового поста.
pub struct NewBlogPost {
    /// Заголовок.
    pub title: String,
    /// Подзаголовок.
    pub subtitle: String,
    /// Содержимое.
    pub content: String,
}
