//! Модели представлений: формы входа, регистрации, создания поста и лента.
//!
//! Не зависят от способа отрисовки. Хранят только значения полей и
//! переключатели интерфейса; всё остальное живёт в [`Store`] и [`Session`].

use std::future::Future;

use crate::blog_api::PostsResponse;
use crate::cache::Subscription;
use crate::error::{BlogClientError, BlogClientResult};
use crate::models::{BlogPost, NewBlogPost};
use crate::scope::CancelToken;
use crate::session::{AuthEvent, Session};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Чем закончилась отправка формы.
pub enum SubmitOutcome {
    /// Операция прошла успешно.
    Success,
    /// Ошибка транспорта/HTTP: показывается под формой.
    Inline(String),
    /// Сервер ответил `success = false`: блокирующее сообщение.
    Alert(String),
    /// Представление закрыли до ответа сервера; состояние не менялось.
    Cancelled,
}

impl SubmitOutcome {
    fn from_error(err: BlogClientError) -> Self {
        match err {
            BlogClientError::Cancelled => Self::Cancelled,
            other => Self::Inline(other.user_message()),
        }
    }
}

async fn guarded<T>(
    cancel: &CancelToken,
    request: impl Future<Output = BlogClientResult<T>>,
) -> BlogClientResult<T> {
    cancel.run(request).await?
}

#[derive(Debug, Clone, Default)]
/// Форма входа.
pub struct LoginForm {
    /// Email.
    pub email: String,
    /// Пароль.
    pub password: String,
}

impl LoginForm {
    /// Отправляет учётные данные; при успехе сохраняет токен и переводит сессию в `Home`.
    pub async fn submit(
        &self,
        store: &Store,
        session: &mut Session,
        cancel: &CancelToken,
    ) -> SubmitOutcome {
        let request = store.auth().login(&self.email, &self.password);
        let response = match guarded(cancel, request).await {
            Ok(response) => response,
            Err(err) => return SubmitOutcome::from_error(err),
        };

        if !response.success {
            return SubmitOutcome::Alert(response.failure_message());
        }

        let token = response.data.map(|data| data.token).unwrap_or_default();
        match session.apply(AuthEvent::LoginSucceeded { token }) {
            Ok(_) => SubmitOutcome::Success,
            Err(err) => SubmitOutcome::from_error(err),
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Форма регистрации.
pub struct RegisterForm {
    /// Имя.
    pub first_name: String,
    /// Фамилия.
    pub last_name: String,
    /// Email.
    pub email: String,
    /// Пароль.
    pub password: String,
}

impl RegisterForm {
    /// Регистрирует пользователя; при успехе возвращает сессию к форме входа
    /// (автоматического входа нет).
    pub async fn submit(
        &self,
        store: &Store,
        session: &mut Session,
        cancel: &CancelToken,
    ) -> SubmitOutcome {
        let request = store.auth().register(
            &self.first_name,
            &self.last_name,
            &self.email,
            &self.password,
        );
        let response = match guarded(cancel, request).await {
            Ok(response) => response,
            Err(err) => return SubmitOutcome::from_error(err),
        };

        if !response.success {
            return SubmitOutcome::Alert(response.failure_message());
        }

        match session.apply(AuthEvent::RegisterSucceeded) {
            Ok(_) => SubmitOutcome::Success,
            Err(err) => SubmitOutcome::from_error(err),
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Форма нового поста.
pub struct CreatePostForm {
    /// Заголовок.
    pub title: String,
    /// Подзаголовок.
    pub subtitle: String,
    /// Содержимое.
    pub content: String,
}

impl CreatePostForm {
    /// Создаёт пост.
    pub async fn submit(&self, store: &Store, cancel: &CancelToken) -> SubmitOutcome {
        let post = NewBlogPost {
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            content: self.content.clone(),
        };

        match guarded(cancel, store.blog().create_blog_post(&post)).await {
            Ok(response) if response.success => SubmitOutcome::Success,
            Ok(response) => SubmitOutcome::Alert(response.failure_message()),
            Err(err) => SubmitOutcome::from_error(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Состояние ленты после загрузки.
pub enum PostsView {
    /// Посты есть.
    Loaded(Vec<BlogPost>),
    /// Сервер вернул пустой список.
    Empty,
    /// Загрузка не удалась.
    Failed(String),
}

impl PostsView {
    fn from_response(response: &PostsResponse) -> Self {
        if !response.success {
            return Self::Failed(response.failure_message());
        }
        match response.data.as_deref() {
            Some([]) | None => Self::Empty,
            Some(posts) => Self::Loaded(posts.to_vec()),
        }
    }
}

#[derive(Debug)]
/// Главный экран: лента постов, открытый пост и форма создания.
///
/// Пока экран существует, он подписан на список постов, и создание поста
/// сразу обновляет ленту.
pub struct HomeView {
    store: Store,
    subscription: Subscription<PostsResponse>,
    show_create_form: bool,
    selected_post: Option<BlogPost>,
}

impl HomeView {
    /// Открывает экран и подписывается на список постов.
    pub fn new(store: Store) -> Self {
        let subscription = store.blog().subscribe_all_posts();
        Self {
            store,
            subscription,
            show_create_form: false,
            selected_post: None,
        }
    }

    /// Загружает ленту (из кэша, если он свежий).
    ///
    /// Отрисованная ревизия считается просмотренной: [`HomeView::posts_changed`]
    /// после этого ждёт только новых обновлений.
    pub async fn load_posts(&mut self, cancel: &CancelToken) -> PostsView {
        let view = match guarded(cancel, self.store.blog().fetch_all_posts()).await {
            Ok(response) => PostsView::from_response(&response),
            Err(err) => PostsView::Failed(err.user_message()),
        };
        self.subscription.mark_seen();
        view
    }

    /// Текущее содержимое кэша ленты без запроса к серверу.
    pub fn cached_posts(&self) -> Option<PostsView> {
        self.subscription
            .current()
            .map(|entry| PostsView::from_response(&entry.value))
    }

    /// Ждёт обновления ленты в кэше и отдаёт её новое состояние.
    pub async fn posts_changed(&mut self) -> Option<PostsView> {
        self.subscription.changed().await;
        self.cached_posts()
    }

    /// Показана ли форма создания поста.
    pub fn show_create_form(&self) -> bool {
        self.show_create_form
    }

    /// Показывает форму создания поста.
    pub fn open_create_form(&mut self) {
        self.show_create_form = true;
    }

    /// Скрывает форму создания поста.
    pub fn close_create_form(&mut self) {
        self.show_create_form = false;
    }

    /// Открытый пост.
    pub fn selected_post(&self) -> Option<&BlogPost> {
        self.selected_post.as_ref()
    }

    /// Открывает пост из загруженной ленты. `false`, если такого поста в ленте нет.
    pub fn open_post(&mut self, id: &str) -> bool {
        self.selected_post = self.store.blog().cached_post(id);
        self.selected_post.is_some()
    }

    /// Закрывает открытый пост.
    pub fn close_post(&mut self) {
        self.selected_post = None;
    }

    /// Создаёт пост; при успехе форма закрывается.
    pub async fn create_post(
        &mut self,
        form: &CreatePostForm,
        cancel: &CancelToken,
    ) -> SubmitOutcome {
        let outcome = form.submit(&self.store, cancel).await;
        if outcome == SubmitOutcome::Success {
            self.close_create_form();
        }
        outcome
    }
}
