//! Session token manager
//!
//! Owns the bearer token for outgoing API calls. Requests that fail with
//! 401 park here while a single refresh runs; every request parked during
//! that refresh sees the same outcome.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{broadcast, oneshot};

use super::TokenStore;
use crate::api::client::ApiRequest;

/// Session events beyond this limit are dropped for slow receivers.
const EVENT_BUFFER_SIZE: usize = 16;

/// Broadcast whenever the session token is set or cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    Refreshed,
    SignedOut,
}

/// Credentials returned by a successful call to the refresh endpoint.
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    pub access_token: String,
    /// Rotated long-lived credential, when the server issued one.
    pub refresh_token: Option<String>,
}

pub type RefreshFuture = BoxFuture<'static, Result<RefreshedTokens>>;

/// Single refresh marker plus the requests waiting on it.
#[derive(Default)]
struct Flight {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<Option<String>>>,
}

struct Inner {
    store: Mutex<Box<dyn TokenStore>>,
    /// Credential applied to requests when storage has none.
    default_token: Mutex<Option<String>>,
    flight: Mutex<Flight>,
    events: broadcast::Sender<SessionEvent>,
}

/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

/// Poisoned locks are recovered; session state stays usable after a panic
/// elsewhere.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl SessionManager {
    /// Build a manager over `store`, applying any persisted token as the
    /// default credential.
    pub fn new(store: impl TokenStore + 'static) -> Self {
        let default_token = store.get_access_token();
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(Box::new(store)),
                default_token: Mutex::new(default_token),
                flight: Mutex::new(Flight::default()),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Current bearer token: persisted value first, then the default.
    pub fn token(&self) -> Option<String> {
        lock(&self.inner.store)
            .get_access_token()
            .or_else(|| lock(&self.inner.default_token).clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        lock(&self.inner.store).get_refresh_token()
    }

    #[cfg(test)]
    fn is_refreshing(&self) -> bool {
        lock(&self.inner.flight).in_flight
    }

    /// Set the current token as the request's bearer credential.
    pub fn attach_token(&self, request: &mut ApiRequest) {
        if let Some(token) = self.token() {
            request.bearer = Some(token);
        }
    }

    /// Login/logout entry point. `Some` persists and applies the token; if
    /// persisting fails nothing changes. `None` always tears the in-memory
    /// session down, even when clearing storage fails.
    pub fn set_token(&self, token: Option<String>) -> Result<()> {
        match token {
            Some(token) => {
                lock(&self.inner.store).set_access_token(token.clone())?;
                *lock(&self.inner.default_token) = Some(token);
                self.notify(SessionEvent::SignedIn);
                Ok(())
            }
            None => {
                *lock(&self.inner.default_token) = None;
                let cleared = lock(&self.inner.store).clear_tokens();
                self.notify(SessionEvent::SignedOut);
                cleared
            }
        }
    }

    pub fn set_refresh_token(&self, token: String) -> Result<()> {
        lock(&self.inner.store).set_refresh_token(token)
    }

    /// Park the caller until a fresh token is available.
    ///
    /// The first caller while no refresh is running starts one from
    /// `refresh`; later callers join it and their `refresh` is never
    /// invoked. Resolves to `None` when the refresh failed, in which case
    /// the session has already been torn down.
    pub async fn await_token<F>(&self, refresh: F) -> Option<String>
    where
        F: FnOnce() -> RefreshFuture,
    {
        let (tx, rx) = oneshot::channel();
        let lead = {
            let mut flight = lock(&self.inner.flight);
            flight.waiters.push(tx);
            !std::mem::replace(&mut flight.in_flight, true)
        };

        if lead {
            tracing::info!("Access token rejected, refreshing session...");
            let session = self.clone();
            let attempt = AssertUnwindSafe(refresh()).catch_unwind();
            // Spawned so a dropped caller cannot strand the in-flight marker.
            tokio::spawn(async move {
                let outcome = attempt
                    .await
                    .unwrap_or_else(|_| Err(anyhow!("refresh task panicked")));
                session.settle(outcome);
            });
        } else {
            tracing::debug!("Refresh already in flight, waiting for it");
        }

        rx.await.ok().flatten()
    }

    fn settle(&self, outcome: Result<RefreshedTokens>) {
        match outcome {
            Ok(tokens) => {
                self.store_refreshed(&tokens);
                let waiters = self.end_flight();
                tracing::info!("Session refreshed, replaying {} request(s)", waiters.len());
                for waiter in waiters {
                    let _ = waiter.send(Some(tokens.access_token.clone()));
                }
            }
            Err(e) => {
                tracing::warn!("Session refresh failed: {:#}", e);
                self.teardown();
                let waiters = self.end_flight();
                for waiter in waiters {
                    let _ = waiter.send(None);
                }
            }
        }
    }

    fn end_flight(&self) -> Vec<oneshot::Sender<Option<String>>> {
        let mut flight = lock(&self.inner.flight);
        flight.in_flight = false;
        std::mem::take(&mut flight.waiters)
    }

    fn store_refreshed(&self, tokens: &RefreshedTokens) {
        *lock(&self.inner.default_token) = Some(tokens.access_token.clone());
        {
            let mut store = lock(&self.inner.store);
            if let Err(e) = store.set_access_token(tokens.access_token.clone()) {
                tracing::warn!("Failed to persist refreshed token: {:#}", e);
            }
            if let Some(rt) = &tokens.refresh_token {
                if let Err(e) = store.set_refresh_token(rt.clone()) {
                    tracing::warn!("Failed to persist refresh credential: {:#}", e);
                }
            }
        }
        self.notify(SessionEvent::Refreshed);
    }

    /// Best-effort local logout; storage errors are logged, not raised.
    fn teardown(&self) {
        if let Err(e) = self.set_token(None) {
            tracing::warn!("Failed to clear stored session: {:#}", e);
        }
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        lock(&self.inner.flight).waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use reqwest::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn counting_refresh(
        calls: Arc<AtomicUsize>,
        gate: Arc<Notify>,
        result: Result<&'static str, &'static str>,
    ) -> impl FnOnce() -> RefreshFuture {
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                gate.notified().await;
                match result {
                    Ok(token) => Ok(RefreshedTokens {
                        access_token: token.to_string(),
                        refresh_token: Some("R2".to_string()),
                    }),
                    Err(msg) => Err(anyhow!(msg)),
                }
            }
            .boxed()
        }
    }

    async fn exploding_refresh() -> Result<RefreshedTokens> {
        panic!("boom")
    }

    async fn wait_for_pending(session: &SessionManager, n: usize) {
        while session.pending() < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_one_refresh() {
        let session = SessionManager::new(MemoryTokenStore::with_tokens(Some("T1"), Some("R1")));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..5 {
            let session = session.clone();
            let refresh = counting_refresh(calls.clone(), gate.clone(), Ok("T2"));
            handles.push(tokio::spawn(
                async move { session.await_token(refresh).await },
            ));
        }

        wait_for_pending(&session, 5).await;
        assert!(session.is_refreshing());
        gate.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap().as_deref(), Some("T2"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!session.is_refreshing());
        assert_eq!(session.token().as_deref(), Some("T2"));
        assert_eq!(session.refresh_token().as_deref(), Some("R2"));
    }

    #[tokio::test]
    async fn test_failed_refresh_rejects_all_and_clears_session() {
        let session = SessionManager::new(MemoryTokenStore::with_tokens(Some("T1"), Some("R1")));
        let mut events = session.subscribe();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..3 {
            let session = session.clone();
            let refresh = counting_refresh(calls.clone(), gate.clone(), Err("cookie expired"));
            handles.push(tokio::spawn(
                async move { session.await_token(refresh).await },
            ));
        }

        wait_for_pending(&session, 3).await;
        gate.notify_one();

        for handle in handles {
            assert!(handle.await.unwrap().is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(session.token().is_none());
        assert!(session.refresh_token().is_none());
        assert_eq!(events.recv().await.unwrap(), SessionEvent::SignedOut);
    }

    #[tokio::test]
    async fn test_new_flight_after_previous_settles() {
        let session = SessionManager::new(MemoryTokenStore::with_tokens(Some("T1"), Some("R1")));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        gate.notify_one();
        let first = session
            .await_token(counting_refresh(calls.clone(), gate.clone(), Ok("T2")))
            .await;
        gate.notify_one();
        let second = session
            .await_token(counting_refresh(calls.clone(), gate.clone(), Ok("T3")))
            .await;

        assert_eq!(first.as_deref(), Some("T2"));
        assert_eq!(second.as_deref(), Some("T3"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_refresh_counts_as_failure() {
        let session = SessionManager::new(MemoryTokenStore::with_tokens(Some("T1"), None));
        let token = session.await_token(|| exploding_refresh().boxed()).await;

        assert!(token.is_none());
        assert!(!session.is_refreshing());
        assert!(session.token().is_none());
    }

    #[test]
    fn test_set_token_applies_to_next_request() {
        let session = SessionManager::new(MemoryTokenStore::new());
        let mut events = session.subscribe();

        let mut request = ApiRequest::new(Method::GET, "/api/clients");
        session.attach_token(&mut request);
        assert!(request.bearer.is_none());

        session.set_token(Some("T9".to_string())).unwrap();
        session.attach_token(&mut request);
        assert_eq!(request.bearer.as_deref(), Some("T9"));
        assert_eq!(events.try_recv().unwrap(), SessionEvent::SignedIn);

        session.set_token(None).unwrap();
        assert!(session.token().is_none());
        assert_eq!(events.try_recv().unwrap(), SessionEvent::SignedOut);
    }

    /// Store whose writes always fail, like a read-only credentials file.
    struct ReadOnlyStore;

    impl TokenStore for ReadOnlyStore {
        fn get_access_token(&self) -> Option<String> {
            None
        }
        fn set_access_token(&mut self, _token: String) -> Result<()> {
            Err(anyhow!("read-only"))
        }
        fn get_refresh_token(&self) -> Option<String> {
            None
        }
        fn set_refresh_token(&mut self, _token: String) -> Result<()> {
            Err(anyhow!("read-only"))
        }
        fn clear_tokens(&mut self) -> Result<()> {
            Err(anyhow!("read-only"))
        }
    }

    #[test]
    fn test_unsaved_token_is_not_applied() {
        let session = SessionManager::new(ReadOnlyStore);
        let mut events = session.subscribe();

        assert!(session.set_token(Some("T1".to_string())).is_err());
        assert!(session.token().is_none());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_persisted_token_becomes_default() {
        let session = SessionManager::new(MemoryTokenStore::with_tokens(Some("T1"), None));
        let mut request = ApiRequest::new(Method::GET, "/api/auth/me");
        session.attach_token(&mut request);
        assert_eq!(request.bearer.as_deref(), Some("T1"));
    }
}
