use std::sync::Arc;

use reqwest::Method;
use tracing::{debug, info, warn};

use crate::cache::{QueryCache, QueryKey, Subscription, Tag};
use crate::envelope::ApiResponse;
use crate::error::BlogClientResult;
use crate::http_client::HttpClient;
use crate::models::{BlogPost, NewBlogPost};
use crate::storage::{TokenStorage, load_token};

/// Имя запроса всех постов в кэше.
pub const FETCH_ALL_POSTS: &str = "fetchAllPosts";
/// Имя запроса постов текущего пользователя в кэше.
pub const FETCH_PERSONAL_POSTS: &str = "fetchPersonalPosts";

/// Кэшируемый ответ со списком постов.
pub type PostsResponse = ApiResponse<Vec<BlogPost>>;

#[derive(Clone)]
/// Клиент `/post/*`.
///
/// Каждый запрос берёт токен из хранилища и, если он есть, добавляет
/// `Authorization: Bearer <token>`. Без токена заголовок просто не отправляется.
pub struct BlogApi {
    http: HttpClient,
    storage: Arc<dyn TokenStorage>,
    cache: QueryCache<PostsResponse>,
}

impl std::fmt::Debug for BlogApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlogApi")
            .field("http", &self.http)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl BlogApi {
    pub(crate) fn new(http: HttpClient, storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            http,
            storage,
            cache: QueryCache::new(),
        }
    }

    /// Ключ кэша для [`BlogApi::fetch_all_posts`].
    pub fn all_posts_key() -> QueryKey {
        QueryKey::unit(FETCH_ALL_POSTS)
    }

    /// Ключ кэша для [`BlogApi::fetch_personal_posts`].
    pub fn personal_posts_key() -> QueryKey {
        QueryKey::unit(FETCH_PERSONAL_POSTS)
    }

    /// Кэш списков постов.
    pub fn cache(&self) -> &QueryCache<PostsResponse> {
        &self.cache
    }

    /// Подписка активного представления на список всех постов.
    pub fn subscribe_all_posts(&self) -> Subscription<PostsResponse> {
        self.cache.subscribe(&Self::all_posts_key())
    }

    /// Все посты. Результат помечен тегом `BlogPost` и обновляется после создания поста.
    pub async fn fetch_all_posts(&self) -> BlogClientResult<PostsResponse> {
        self.cache
            .query(&Self::all_posts_key(), &[Tag::BLOG_POST], || self.get_posts("/all"))
            .await
    }

    /// Посты текущего пользователя. Без тегов: инвалидация их не затрагивает.
    pub async fn fetch_personal_posts(&self) -> BlogClientResult<PostsResponse> {
        self.cache
            .query(&Self::personal_posts_key(), &[], || self.get_posts("/"))
            .await
    }

    /// Создаёт пост.
    ///
    /// Если сервер подтвердил создание (`success = true`), тег `BlogPost`
    /// инвалидируется и подписанные запросы перезапрашиваются. Отказ сервера,
    /// ошибка транспорта или HTTP оставляют кэш как был.
    pub async fn create_blog_post(
        &self,
        post: &NewBlogPost,
    ) -> BlogClientResult<ApiResponse<BlogPost>> {
        let token = self.token()?;
        let response: ApiResponse<BlogPost> = self
            .http
            .send(Method::POST, "/", Some(post), token.as_deref())
            .await?;

        if response.success {
            self.invalidate(&[Tag::BLOG_POST]).await;
        } else {
            debug!(message = ?response.message, "create rejected, cache kept");
        }
        Ok(response)
    }

    /// Пост из закэшированного списка всех постов.
    pub fn cached_post(&self, id: &str) -> Option<BlogPost> {
        self.cache
            .get(&Self::all_posts_key())?
            .value
            .data?
            .into_iter()
            .find(|post| post.id == id)
    }

    async fn invalidate(&self, tags: &[Tag]) {
        let subscribed = self.cache.invalidate(tags);
        info!(?tags, refetching = subscribed.len(), "tags invalidated");

        for key in subscribed {
            if let Err(err) = self.refetch(&key).await {
                warn!(%key, error = %err, "refetch after invalidation failed");
            }
        }
    }

    async fn refetch(&self, key: &QueryKey) -> BlogClientResult<PostsResponse> {
        match key.endpoint() {
            FETCH_PERSONAL_POSTS => {
                self.cache
                    .refetch(key, &[], || self.get_posts("/"))
                    .await
            }
            _ => {
                self.cache
                    .refetch(key, &[Tag::BLOG_POST], || self.get_posts("/all"))
                    .await
            }
        }
    }

    async fn get_posts(&self, path: &str) -> BlogClientResult<PostsResponse> {
        let token = self.token()?;
        self.http
            .send::<(), _>(Method::GET, path, None, token.as_deref())
            .await
    }

    fn token(&self) -> BlogClientResult<Option<String>> {
        load_token(self.storage.as_ref())
    }
}
