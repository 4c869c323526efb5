use std::future::Future;

use tokio::sync::watch;

use crate::error::{BlogClientError, BlogClientResult};

#[derive(Debug)]
/// Время жизни представления. При `drop` все его запросы отменяются.
pub struct ViewScope {
    cancelled: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
/// Токен отмены, выданный [`ViewScope`].
pub struct CancelToken {
    cancelled: watch::Receiver<bool>,
}

impl ViewScope {
    /// Новая, ещё не отменённая область.
    pub fn new() -> Self {
        let (cancelled, _) = watch::channel(false);
        Self { cancelled }
    }

    /// Токен для запросов этого представления.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            cancelled: self.cancelled.subscribe(),
        }
    }

    /// Отменяет все запросы области.
    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    /// Отменена ли область.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl CancelToken {
    /// Отменена ли область, выдавшая токен.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Выполняет `future`, пока область жива. После отмены future дропается
    /// и возвращается [`BlogClientError::Cancelled`].
    pub async fn run<F: Future>(&self, future: F) -> BlogClientResult<F::Output> {
        let mut cancelled = self.cancelled.clone();
        tokio::select! {
            biased;
            _ = cancelled.wait_for(|cancelled| *cancelled) => Err(BlogClientError::Cancelled),
            output = future => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn run_completes_while_scope_alive() {
        let scope = ViewScope::new();
        let value = scope.token().run(async { 5 }).await.expect("not cancelled");
        assert_eq!(value, 5);
    }

    #[tokio::test]
    async fn dropping_scope_cancels_pending_request() {
        let scope = ViewScope::new();
        let token = scope.token();

        let pending = tokio::spawn(async move {
            token
                .run(tokio::time::sleep(Duration::from_secs(30)))
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(scope);

        let result = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("must finish promptly")
            .expect("task must not panic");
        assert!(matches!(result, Err(BlogClientError::Cancelled)));
    }

    #[tokio::test]
    async fn cancelled_token_never_runs_future() {
        let scope = ViewScope::new();
        let token = scope.token();
        scope.cancel();
        assert!(token.is_cancelled());

        let polled = AtomicBool::new(false);
        let result = token
            .run(async {
                polled.store(true, Ordering::SeqCst);
                1
            })
            .await;
        assert!(matches!(result, Err(BlogClientError::Cancelled)));
        assert!(!polled.load(Ordering::SeqCst));
    }
}
