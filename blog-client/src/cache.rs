//! Кэш результатов запросов с инвалидацией по тегам.
//!
//! Запись кэша адресуется [`QueryKey`] (эндпоинт + сериализованные аргументы).
//! Запрос регистрирует ключ под своими тегами в момент старта; инвалидация тега
//! помечает все его ключи устаревшими и возвращает те из них, на которые
//! сейчас кто-то подписан, чтобы вызывающий код перезапросил их.
//!
//! У каждого ключа есть эпоха инвалидации. Запрос запоминает её при старте, и
//! если к моменту записи эпоха сдвинулась, результат сохраняется устаревшим:
//! ответ, начатый до мутации, не может выдать себя за свежий.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::error::BlogClientResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Тег, под которым кэшируются результаты запросов.
pub struct Tag(pub &'static str);

impl Tag {
    /// Список постов.
    pub const BLOG_POST: Tag = Tag("BlogPost");
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Ключ кэша: имя эндпоинта и аргументы запроса в JSON.
pub struct QueryKey {
    endpoint: &'static str,
    args: String,
}

impl QueryKey {
    /// Ключ для эндпоинта с аргументами.
    pub fn new<A: Serialize + ?Sized>(endpoint: &'static str, args: &A) -> Self {
        let args = serde_json::to_string(args).unwrap_or_else(|_| "null".to_string());
        Self { endpoint, args }
    }

    /// Ключ для эндпоинта без аргументов.
    pub fn unit(endpoint: &'static str) -> Self {
        Self::new(endpoint, &())
    }

    /// Имя эндпоинта.
    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.endpoint, self.args)
    }
}

#[derive(Debug, Clone)]
/// Снимок записи кэша.
pub struct CacheEntry<V> {
    /// Последний успешный результат.
    pub value: V,
    /// Когда результат был получен.
    pub fetched_at: DateTime<Utc>,
    /// Запись помечена устаревшей инвалидацией тега.
    pub stale: bool,
}

struct CacheState<V> {
    entries: HashMap<QueryKey, CacheEntry<V>>,
    tags: HashMap<Tag, HashSet<QueryKey>>,
    subscribers: HashMap<QueryKey, usize>,
    revisions: HashMap<QueryKey, watch::Sender<u64>>,
    epochs: HashMap<QueryKey, u64>,
}

impl<V> Default for CacheState<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            tags: HashMap::new(),
            subscribers: HashMap::new(),
            revisions: HashMap::new(),
            epochs: HashMap::new(),
        }
    }
}

impl<V> CacheState<V> {
    fn revision_sender(&mut self, key: &QueryKey) -> &watch::Sender<u64> {
        self.revisions
            .entry(key.clone())
            .or_insert_with(|| watch::channel(0).0)
    }

    fn epoch(&self, key: &QueryKey) -> u64 {
        self.epochs.get(key).copied().unwrap_or(0)
    }

    fn register(&mut self, key: &QueryKey, tags: &[Tag]) {
        for tag in tags {
            self.tags.entry(*tag).or_default().insert(key.clone());
        }
    }

    fn put(&mut self, key: &QueryKey, value: V, stale: bool) {
        self.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                fetched_at: Utc::now(),
                stale,
            },
        );
        self.revision_sender(key).send_modify(|revision| *revision += 1);
    }
}

struct Inner<V> {
    state: Mutex<CacheState<V>>,
    gates: Mutex<HashMap<QueryKey, Arc<tokio::sync::Mutex<()>>>>,
}

/// Кэш запросов. Клонирование дешёвое: все клоны разделяют одно состояние.
pub struct QueryCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for QueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for QueryCache<V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(CacheState::default()),
                gates: Mutex::new(HashMap::new()),
            }),
        }
    }
}

impl<V> fmt::Debug for QueryCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("QueryCache")
            .field("entries", &state.entries.len())
            .field("tags", &state.tags.len())
            .finish()
    }
}

impl<V: Clone> QueryCache<V> {
    /// Пустой кэш.
    pub fn new() -> Self {
        Self::default()
    }

    /// Снимок записи по ключу.
    pub fn get(&self, key: &QueryKey) -> Option<CacheEntry<V>> {
        self.inner.state.lock().entries.get(key).cloned()
    }

    /// Возвращает свежую запись из кэша или выполняет `fetch`.
    ///
    /// Одновременные запросы с одинаковым ключом выполняются один раз: остальные
    /// дожидаются результата первого. Ошибка `fetch` не меняет кэш.
    pub async fn query<F, Fut>(
        &self,
        key: &QueryKey,
        tags: &[Tag],
        fetch: F,
    ) -> BlogClientResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BlogClientResult<V>>,
    {
        self.run(key, tags, false, fetch).await
    }

    /// Выполняет `fetch` независимо от состояния записи.
    ///
    /// Результат другого запроса подходит, только если тот завершился после
    /// вызова `refetch` и не был инвалидирован по дороге.
    pub async fn refetch<F, Fut>(
        &self,
        key: &QueryKey,
        tags: &[Tag],
        fetch: F,
    ) -> BlogClientResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BlogClientResult<V>>,
    {
        self.run(key, tags, true, fetch).await
    }

    async fn run<F, Fut>(
        &self,
        key: &QueryKey,
        tags: &[Tag],
        force: bool,
        fetch: F,
    ) -> BlogClientResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BlogClientResult<V>>,
    {
        let gate = self.gate(key);
        let started = Utc::now();
        let _in_flight = gate.lock().await;

        // пока ждали gate, запрос мог выполнить кто-то другой
        if let Some(entry) = self.get(key)
            && !entry.stale
            && (!force || entry.fetched_at > started)
        {
            debug!(%key, "cache hit");
            return Ok(entry.value);
        }

        let epoch = {
            let mut state = self.inner.state.lock();
            state.register(key, tags);
            state.epoch(key)
        };

        let value = fetch().await?;

        let mut state = self.inner.state.lock();
        let stale = state.epoch(key) != epoch;
        if stale {
            debug!(%key, "invalidated while in flight, stored as stale");
        }
        state.put(key, value.clone(), stale);
        Ok(value)
    }

    fn gate(&self, key: &QueryKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.inner.gates.lock();
        Arc::clone(gates.entry(key.clone()).or_default())
    }

    /// Записывает результат и регистрирует ключ под тегами.
    pub fn store(&self, key: &QueryKey, tags: &[Tag], value: V) {
        let mut state = self.inner.state.lock();
        state.register(key, tags);
        state.put(key, value, false);
    }

    /// Помечает устаревшими все записи под тегами, включая запросы в полёте.
    ///
    /// Возвращает ключи, на которые есть активные подписки.
    pub fn invalidate(&self, tags: &[Tag]) -> Vec<QueryKey> {
        let mut state = self.inner.state.lock();
        let mut keys: Vec<QueryKey> = tags
            .iter()
            .filter_map(|tag| state.tags.get(tag))
            .flat_map(|keys| keys.iter().cloned())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        keys.sort_by(|a, b| a.to_string().cmp(&b.to_string()));

        for key in &keys {
            *state.epochs.entry(key.clone()).or_insert(0) += 1;
            if let Some(entry) = state.entries.get_mut(key) {
                entry.stale = true;
            }
        }

        keys.retain(|key| state.subscribers.get(key).copied().unwrap_or(0) > 0);
        keys
    }

    /// Подписка на ключ. Пока она жива, ключ перезапрашивается при инвалидации.
    pub fn subscribe(&self, key: &QueryKey) -> Subscription<V> {
        let mut state = self.inner.state.lock();
        *state.subscribers.entry(key.clone()).or_insert(0) += 1;
        let revisions = state.revision_sender(key).subscribe();
        Subscription {
            key: key.clone(),
            cache: self.clone(),
            revisions,
        }
    }

    /// Есть ли у ключа активные подписчики.
    pub fn is_subscribed(&self, key: &QueryKey) -> bool {
        self.inner
            .state
            .lock()
            .subscribers
            .get(key)
            .is_some_and(|count| *count > 0)
    }

    fn unsubscribe(&self, key: &QueryKey) {
        let mut state = self.inner.state.lock();
        if let Some(count) = state.subscribers.get_mut(key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.subscribers.remove(key);
            }
        }
    }
}

/// Активная подписка представления на ключ кэша. Снимается при `drop`.
pub struct Subscription<V: Clone> {
    key: QueryKey,
    cache: QueryCache<V>,
    revisions: watch::Receiver<u64>,
}

impl<V: Clone> Subscription<V> {
    /// Сколько раз запись обновлялась с момента создания кэша.
    pub fn revision(&self) -> u64 {
        *self.revisions.borrow()
    }

    /// Текущий снимок записи.
    pub fn current(&self) -> Option<CacheEntry<V>> {
        self.cache.get(&self.key)
    }

    /// Отмечает текущую ревизию просмотренной: [`Subscription::changed`]
    /// будет ждать только более новых обновлений.
    pub fn mark_seen(&mut self) {
        self.revisions.mark_unchanged();
    }

    /// Ждёт следующего непросмотренного обновления записи.
    pub async fn changed(&mut self) {
        // отправитель живёт в кэше, который мы держим, так что ошибки здесь не бывает
        let _ = self.revisions.changed().await;
    }
}

impl<V: Clone> Drop for Subscription<V> {
    fn drop(&mut self) {
        self.cache.unsubscribe(&self.key);
    }
}

impl<V: Clone> fmt::Debug for Subscription<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("revision", &self.revision())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlogClientError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    const TAG_A: Tag = Tag("A");

    fn key(name: &'static str) -> QueryKey {
        QueryKey::unit(name)
    }

    #[test]
    fn query_key_serializes_arguments() {
        assert_eq!(QueryKey::unit("fetchAllPosts").to_string(), "fetchAllPosts(null)");
        assert_eq!(QueryKey::new("post", &42).to_string(), "post(42)");
    }

    #[tokio::test]
    async fn fresh_entry_is_served_from_cache() {
        let cache = QueryCache::<u32>::new();
        let calls = AtomicUsize::new(0);
        let k = key("k");

        for _ in 0..3 {
            let value = cache
                .query(&k, &[TAG_A], || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .expect("query must succeed");
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_entry() {
        let cache = QueryCache::<u32>::new();
        let k = key("k");
        cache.store(&k, &[TAG_A], 1);
        cache.invalidate(&[TAG_A]);

        let err = cache
            .query(&k, &[TAG_A], || async {
                Err(BlogClientError::Rejected("boom".into()))
            })
            .await;
        assert!(err.is_err());

        let entry = cache.get(&k).expect("entry must survive");
        assert_eq!(entry.value, 1);
        assert!(entry.stale);
    }

    #[tokio::test]
    async fn invalidation_marks_stale_and_next_query_refetches() {
        let cache = QueryCache::<u32>::new();
        let k = key("k");
        cache.store(&k, &[TAG_A], 1);

        let subscribed = cache.invalidate(&[TAG_A]);
        assert!(subscribed.is_empty());
        assert!(cache.get(&k).expect("entry").stale);

        let value = cache
            .query(&k, &[TAG_A], || async { Ok(2) })
            .await
            .expect("query");
        assert_eq!(value, 2);
        assert!(!cache.get(&k).expect("entry").stale);
    }

    #[tokio::test]
    async fn invalidation_returns_only_subscribed_keys_of_the_tag() {
        let cache = QueryCache::<u32>::new();
        let (a, b, untagged) = (key("a"), key("b"), key("untagged"));
        cache.store(&a, &[TAG_A], 1);
        cache.store(&b, &[TAG_A], 1);
        cache.store(&untagged, &[], 1);

        let _sub_a = cache.subscribe(&a);
        let _sub_untagged = cache.subscribe(&untagged);

        assert_eq!(cache.invalidate(&[TAG_A]), vec![a.clone()]);
        assert!(!cache.get(&untagged).expect("entry").stale);
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let cache = QueryCache::<u32>::new();
        let k = key("k");
        let first = cache.subscribe(&k);
        let second = cache.subscribe(&k);
        drop(first);
        assert!(cache.is_subscribed(&k));
        drop(second);
        assert!(!cache.is_subscribed(&k));
    }

    #[tokio::test]
    async fn subscription_observes_updates() {
        let cache = QueryCache::<u32>::new();
        let k = key("k");
        let mut sub = cache.subscribe(&k);
        assert_eq!(sub.revision(), 0);

        cache.store(&k, &[], 5);
        tokio::time::timeout(Duration::from_secs(1), sub.changed())
            .await
            .expect("update must be observed");
        assert_eq!(sub.revision(), 1);
        assert_eq!(sub.current().map(|entry| entry.value), Some(5));
    }

    #[tokio::test]
    async fn concurrent_identical_queries_are_deduplicated() {
        let cache = QueryCache::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key("k");

        let fetch = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<u32, BlogClientError>(9)
        };

        let (left, right) = tokio::join!(
            cache.query(&k, &[], || fetch(Arc::clone(&calls))),
            cache.query(&k, &[], || fetch(Arc::clone(&calls))),
        );

        assert_eq!(left.expect("left"), 9);
        assert_eq!(right.expect("right"), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn read_started_before_invalidation_does_not_satisfy_refetch() {
        let cache = QueryCache::<u32>::new();
        let k = key("k");
        cache.store(&k, &[TAG_A], 0);
        cache.invalidate(&[TAG_A]);
        let _sub = cache.subscribe(&k);

        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<u32>();

        let (old_read, refetched) = tokio::join!(
            cache.query(&k, &[TAG_A], || async move {
                let _ = started_tx.send(());
                Ok(release_rx.await.unwrap_or_default())
            }),
            async {
                started_rx.await.expect("read must start");
                assert_eq!(cache.invalidate(&[TAG_A]), vec![k.clone()]);
                let _ = release_tx.send(1);
                cache.refetch(&k, &[TAG_A], || async { Ok(2) }).await
            },
        );

        assert_eq!(old_read.expect("old read"), 1);
        assert_eq!(refetched.expect("refetch"), 2);
        let entry = cache.get(&k).expect("entry");
        assert_eq!(entry.value, 2);
        assert!(!entry.stale);
    }

    #[tokio::test]
    async fn first_fetch_in_flight_is_invalidated_too() {
        let cache = QueryCache::<u32>::new();
        let k = key("k");
        let _sub = cache.subscribe(&k);

        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<u32>();

        let (first, subscribed) = tokio::join!(
            cache.query(&k, &[TAG_A], || async move {
                let _ = started_tx.send(());
                Ok(release_rx.await.unwrap_or_default())
            }),
            async {
                started_rx.await.expect("fetch must start");
                let subscribed = cache.invalidate(&[TAG_A]);
                let _ = release_tx.send(1);
                subscribed
            },
        );

        assert_eq!(first.expect("first fetch"), 1);
        assert_eq!(subscribed, vec![k.clone()]);
        assert!(cache.get(&k).expect("entry").stale);
    }

    #[tokio::test]
    async fn mark_seen_waits_for_newer_updates_only() {
        let cache = QueryCache::<u32>::new();
        let k = key("k");
        let mut sub = cache.subscribe(&k);
        cache.store(&k, &[], 1);
        sub.mark_seen();

        let pending = tokio::time::timeout(Duration::from_millis(50), sub.changed()).await;
        assert!(pending.is_err(), "already seen revision must not wake the view");

        cache.store(&k, &[], 2);
        tokio::time::timeout(Duration::from_secs(1), sub.changed())
            .await
            .expect("new revision must wake the view");
        assert_eq!(sub.current().map(|entry| entry.value), Some(2));
    }

    #[tokio::test]
    async fn refetch_bypasses_fresh_entry() {
        let cache = QueryCache::<u32>::new();
        let k = key("k");
        cache.store(&k, &[], 1);

        let value = cache
            .refetch(&k, &[], || async { Ok(2) })
            .await
            .expect("refetch");
        assert_eq!(value, 2);
    }
}
