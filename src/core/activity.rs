use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Repeats a best-effort "still working" signal while a backend call is
/// outstanding. The background task stops when the guard is stopped or
/// dropped, including on early return and unwinding.
pub struct ActivityGuard {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ActivityGuard {
    pub fn spawn<F, Fut>(interval: Duration, pulse: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                pulse().await;
                tokio::select! {
                    () = child.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
            }
        });
        Self {
            token,
            handle: Some(handle),
        }
    }

    /// A guard with no background task.
    pub fn inert() -> Self {
        Self {
            token: CancellationToken::new(),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
