//! Signed-in user and access token renewal
//!
//! A session starts with login, register or a current-user fetch. While it
//! lasts, one background task waits until shortly before the access token
//! expires and renews it; a failed renewal ends the session. Each session
//! carries a generation number, and a renewal that finishes after a logout or
//! a newer session is dropped.

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use common::{
    jwt::{read_expiry, unix_now},
    models::{LoginRequest, RegisterRequest, UserDto},
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    agent::AccountApi,
    common_store::CommonStore,
    error::{ClientError, ClientResult},
};

/// How long before expiry the access token is renewed
pub const REFRESH_LEAD: Duration = Duration::from_secs(30);

/// Time to wait before renewing `token`; zero when that moment has passed
pub fn refresh_delay(token: &str, now: u64) -> anyhow::Result<Duration> {
    let expires = read_expiry(token)?;
    let remaining = expires.saturating_sub(now);
    Ok(Duration::from_secs(remaining.saturating_sub(REFRESH_LEAD.as_secs())))
}

struct UserInner<A> {
    api: A,
    common: CommonStore,
    user: watch::Sender<Option<UserDto>>,
    refresh_timer: Mutex<Option<JoinHandle<()>>>,
    generation: AtomicU64,
}

impl<A> Drop for UserInner<A> {
    fn drop(&mut self) {
        let timer = self
            .refresh_timer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = timer.take() {
            cancel(handle);
        }
    }
}

/// Cloneable handle; clones share the session
pub struct UserStore<A> {
    inner: Arc<UserInner<A>>,
}

impl<A> Clone for UserStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: AccountApi + 'static> UserStore<A> {
    pub fn new(api: A, common: CommonStore) -> Self {
        let (user, _) = watch::channel(None);

        Self {
            inner: Arc::new(UserInner {
                api,
                common,
                user,
                refresh_timer: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn user(&self) -> Option<UserDto> {
        self.inner.user.borrow().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.user.borrow().is_some()
    }

    /// Follow session changes
    pub fn subscribe(&self) -> watch::Receiver<Option<UserDto>> {
        self.inner.user.subscribe()
    }

    pub fn has_refresh_timer(&self) -> bool {
        self.timer()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn login(&self, credentials: &LoginRequest) -> ClientResult<UserDto> {
        let user = self.inner.api.login(credentials).await?;
        self.start_session(user.clone())?;
        info!("Logged in as {}", user.username);
        Ok(user)
    }

    pub async fn register(&self, registration: &RegisterRequest) -> ClientResult<UserDto> {
        let user = self.inner.api.register(registration).await?;
        self.start_session(user.clone())?;
        info!("Registered {}", user.username);
        Ok(user)
    }

    /// Restore the session of the stored token
    pub async fn get_user(&self) -> ClientResult<UserDto> {
        let user = self.inner.api.current().await?;
        self.start_session(user.clone())?;
        Ok(user)
    }

    pub fn logout(&self) {
        self.clear_session();
        info!("Logged out");
    }

    /// Renew the access token now, replacing any pending renewal
    pub async fn refresh_token(&self) -> ClientResult<UserDto> {
        self.stop_refresh_timer();
        self.refresh().await
    }

    async fn refresh(&self) -> ClientResult<UserDto> {
        let generation = self.generation();
        let result = self.inner.api.refresh_token().await;

        if self.generation() != generation {
            debug!("Session changed while the token was renewed, dropping the result");
            return Err(ClientError::SessionChanged);
        }

        match result {
            Ok(user) => {
                self.start_session(user.clone())?;
                debug!("Access token renewed for {}", user.username);
                Ok(user)
            }
            Err(e) => {
                warn!("Token refresh failed, ending session: {}", e);
                self.clear_session();
                Err(e)
            }
        }
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn start_session(&self, user: UserDto) -> ClientResult<()> {
        let delay = refresh_delay(&user.token, unix_now()?)?;

        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.common.set_token(Some(user.token.clone()));
        self.inner.user.send_replace(Some(user));
        self.start_refresh_timer(delay);

        Ok(())
    }

    fn clear_session(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.stop_refresh_timer();
        self.inner.common.set_token(None);
        self.inner.user.send_replace(None);
    }

    fn timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .refresh_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The timer task stays in the slot while it renews, so a logout can abort it
    fn start_refresh_timer(&self, delay: Duration) {
        let store: Weak<UserInner<A>> = Arc::downgrade(&self.inner);
        let mut timer = self.timer();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let Some(inner) = store.upgrade() else {
                return;
            };
            let _ = UserStore { inner }.refresh().await;
        });

        if let Some(previous) = timer.replace(handle) {
            cancel(previous);
        }
        drop(timer);
        debug!("Token refresh scheduled in {:?}", delay);
    }

    fn stop_refresh_timer(&self) {
        if let Some(handle) = self.timer().take() {
            cancel(handle);
        }
    }
}

/// Abort a timer task unless it is the caller, which finishes on its own
fn cancel(handle: JoinHandle<()>) {
    if tokio::task::try_id() != Some(handle.id()) {
        handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::jwt::{JwtConfig, JwtService, TokenSubject};
    use uuid::Uuid;

    struct FakeAccount {
        tokens: JwtService,
        fail_refresh: Mutex<bool>,
        refresh_calls: Mutex<u32>,
        refresh_latency: Duration,
    }

    impl FakeAccount {
        fn new(access_token_expiry: u64) -> Arc<Self> {
            Self::slow(access_token_expiry, Duration::ZERO)
        }

        fn slow(access_token_expiry: u64, refresh_latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                tokens: jwt(access_token_expiry),
                fail_refresh: Mutex::new(false),
                refresh_calls: Mutex::new(0),
                refresh_latency,
            })
        }

        fn user(&self) -> ClientResult<UserDto> {
            let token = self.tokens.generate_access_token(&TokenSubject {
                id: Uuid::nil(),
                username: "bob".to_string(),
                email: "bob@test.com".to_string(),
            })?;

            Ok(UserDto {
                username: "bob".to_string(),
                display_name: "Bob".to_string(),
                image: None,
                token,
            })
        }

        fn refresh_calls(&self) -> u32 {
            *self.refresh_calls.lock().unwrap()
        }
    }

    impl AccountApi for Arc<FakeAccount> {
        async fn login(&self, credentials: &LoginRequest) -> ClientResult<UserDto> {
            if credentials.password != "Pa$$w0rd" {
                return Err(ClientError::Unauthorized("Invalid password".to_string()));
            }
            self.user()
        }

        async fn register(&self, _: &RegisterRequest) -> ClientResult<UserDto> {
            self.user()
        }

        async fn current(&self) -> ClientResult<UserDto> {
            self.user()
        }

        async fn refresh_token(&self) -> ClientResult<UserDto> {
            *self.refresh_calls.lock().unwrap() += 1;
            if !self.refresh_latency.is_zero() {
                tokio::time::sleep(self.refresh_latency).await;
            }
            if *self.fail_refresh.lock().unwrap() {
                return Err(ClientError::Unauthorized("Unauthorized".to_string()));
            }
            self.user()
        }
    }

    fn jwt(access_token_expiry: u64) -> JwtService {
        JwtService::new(JwtConfig {
            secret: "client-test-signing-key-long-enough-for-hs512".to_string(),
            access_token_expiry,
            refresh_token_expiry: 604800,
        })
        .unwrap()
    }

    fn credentials(password: &str) -> LoginRequest {
        LoginRequest {
            email: "bob@test.com".to_string(),
            password: password.to_string(),
        }
    }

    async fn settle(duration: Duration) {
        tokio::time::sleep(duration).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn delay_is_thirty_seconds_before_expiry() {
        let token = jwt(900)
            .generate_access_token(&TokenSubject {
                id: Uuid::nil(),
                username: "bob".to_string(),
                email: "bob@test.com".to_string(),
            })
            .unwrap();
        let expires = read_expiry(&token).unwrap();

        assert_eq!(
            refresh_delay(&token, expires - 900).unwrap(),
            Duration::from_secs(870)
        );
        assert_eq!(refresh_delay(&token, expires - 10).unwrap(), Duration::ZERO);
        assert_eq!(refresh_delay(&token, expires + 60).unwrap(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn login_stores_the_token_and_schedules_a_refresh() {
        let api = FakeAccount::new(40);
        let common = CommonStore::new();
        let store = UserStore::new(api.clone(), common.clone());

        let user = store.login(&credentials("Pa$$w0rd")).await.unwrap();

        assert!(store.is_logged_in());
        assert_eq!(common.token(), Some(user.token));
        assert!(store.has_refresh_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_login_leaves_the_session_empty() {
        let api = FakeAccount::new(40);
        let common = CommonStore::new();
        let store = UserStore::new(api, common.clone());

        let result = store.login(&credentials("wrong")).await;

        assert!(matches!(result, Err(ClientError::Unauthorized(_))));
        assert!(!store.is_logged_in());
        assert_eq!(common.token(), None);
        assert!(!store.has_refresh_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_renews_the_token_before_expiry() {
        let api = FakeAccount::new(40);
        let store = UserStore::new(api.clone(), CommonStore::new());
        store.login(&credentials("Pa$$w0rd")).await.unwrap();

        settle(Duration::from_secs(5)).await;
        assert_eq!(api.refresh_calls(), 0);

        settle(Duration::from_secs(7)).await;
        assert_eq!(api.refresh_calls(), 1);
        assert!(store.is_logged_in());
        assert!(store.has_refresh_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_renewal_ends_the_session() {
        let api = FakeAccount::new(40);
        let common = CommonStore::new();
        let store = UserStore::new(api.clone(), common.clone());
        store.login(&credentials("Pa$$w0rd")).await.unwrap();
        *api.fail_refresh.lock().unwrap() = true;

        settle(Duration::from_secs(12)).await;

        assert_eq!(api.refresh_calls(), 1);
        assert!(!store.is_logged_in());
        assert_eq!(common.token(), None);
        assert!(!store.has_refresh_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn new_session_replaces_the_pending_timer() {
        let api = FakeAccount::new(40);
        let store = UserStore::new(api.clone(), CommonStore::new());

        store.login(&credentials("Pa$$w0rd")).await.unwrap();
        store.get_user().await.unwrap();

        settle(Duration::from_secs(12)).await;
        assert_eq!(api.refresh_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_cancels_the_refresh() {
        let api = FakeAccount::new(40);
        let common = CommonStore::new();
        let store = UserStore::new(api.clone(), common.clone());
        store.login(&credentials("Pa$$w0rd")).await.unwrap();

        store.logout();
        settle(Duration::from_secs(60)).await;

        assert_eq!(api.refresh_calls(), 0);
        assert_eq!(common.token(), None);
        assert!(store.user().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn register_starts_a_session() {
        let api = FakeAccount::new(40);
        let store = UserStore::new(api.clone(), CommonStore::new());
        let mut session = store.subscribe();

        store
            .register(&RegisterRequest {
                display_name: "Bob".to_string(),
                email: "bob@test.com".to_string(),
                password: "Pa$$w0rd".to_string(),
                username: "bob".to_string(),
            })
            .await
            .unwrap();

        assert!(session.has_changed().unwrap());
        assert_eq!(session.borrow_and_update().as_ref().unwrap().username, "bob");
        assert!(store.has_refresh_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn logout_during_a_renewal_keeps_the_user_signed_out() {
        let api = FakeAccount::slow(40, Duration::from_secs(5));
        let common = CommonStore::new();
        let store = UserStore::new(api.clone(), common.clone());
        store.login(&credentials("Pa$$w0rd")).await.unwrap();

        settle(Duration::from_secs(11)).await;
        assert_eq!(api.refresh_calls(), 1);

        store.logout();
        settle(Duration::from_secs(10)).await;

        assert!(!store.is_logged_in());
        assert_eq!(common.token(), None);
        assert!(!store.has_refresh_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_finishing_after_logout_is_dropped() {
        let api = FakeAccount::slow(40, Duration::from_secs(5));
        let common = CommonStore::new();
        let store = UserStore::new(api.clone(), common.clone());
        store.login(&credentials("Pa$$w0rd")).await.unwrap();

        let (renewal, ()) = tokio::join!(store.refresh_token(), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            store.logout();
        });

        assert!(matches!(renewal, Err(ClientError::SessionChanged)));
        assert!(!store.is_logged_in());
        assert_eq!(common.token(), None);
        assert!(!store.has_refresh_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn login_during_a_renewal_leaves_one_timer() {
        let api = FakeAccount::slow(40, Duration::from_secs(5));
        let store = UserStore::new(api.clone(), CommonStore::new());
        store.login(&credentials("Pa$$w0rd")).await.unwrap();

        settle(Duration::from_secs(11)).await;
        assert_eq!(api.refresh_calls(), 1);

        store.login(&credentials("Pa$$w0rd")).await.unwrap();
        settle(Duration::from_secs(5)).await;
        assert!(store.is_logged_in());
        assert!(store.has_refresh_timer());

        // Only the timer of the second login is left, due 10 s after it
        settle(Duration::from_secs(6)).await;
        assert_eq!(api.refresh_calls(), 2);
    }
}
