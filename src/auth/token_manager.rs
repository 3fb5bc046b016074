//! Token manager with single-flight refresh.
//!
//! State machine:
//! - `Idle` -> `Refreshing` when a refresh is requested,
//! - `Refreshing` -> `Idle` when the refresher returns a new pair,
//! - `Refreshing` -> `Invalidated` when it fails (credentials are cleared),
//! - `Invalidated` stays put until [`TokenManager::set_credentials`] installs a new pair.
//!
//! The check-and-set that starts a refresh happens under a synchronous lock
//! with no await point, and the refresh itself runs on its own task, so a
//! caller that gives up waiting never strands the other waiters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use super::{RefreshError, TokenPair, TokenRefresher};

type RefreshOutcome = Result<TokenPair, RefreshError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Lifecycle state of the credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Idle,
    Refreshing,
    Invalidated,
}

#[derive(Debug, Default)]
struct Credentials {
    access_token: String,
    refresh_token: String,
    expires_at: Option<Instant>,
}

impl Credentials {
    fn from_pair(pair: &TokenPair) -> Self {
        Self {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            expires_at: pair.expires_in.map(|d| Instant::now() + d),
        }
    }

    fn to_pair(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_in: self
                .expires_at
                .map(|t| t.saturating_duration_since(Instant::now())),
        }
    }
}

struct Inner {
    credentials: Credentials,
    state: TokenState,
    in_flight: Option<SharedRefresh>,
    /// Bumped whenever credentials are installed or cleared from outside a
    /// refresh, so a refresh that started earlier does not overwrite them.
    generation: u64,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}

/// Settle a refresh started in `generation`; later generations win.
fn settle(inner: &Mutex<Inner>, generation: u64, outcome: &RefreshOutcome) {
    let mut inner = lock(inner);
    if inner.generation != generation {
        debug!("token refresh settled after credentials were replaced; ignoring");
        return;
    }
    match outcome {
        Ok(pair) => {
            inner.credentials = Credentials::from_pair(pair);
            inner.state = TokenState::Idle;
            info!("token refresh succeeded");
        }
        Err(e) => {
            inner.credentials = Credentials::default();
            inner.state = TokenState::Invalidated;
            warn!(error = %e, "token refresh failed; credentials invalidated");
        }
    }
    inner.in_flight = None;
}

enum Begin {
    Ready(TokenPair),
    Wait(SharedRefresh),
    Refused(RefreshError),
}

/// Owns the credential pair and coordinates at most one refresh at a time.
pub struct TokenManager {
    refresher: Arc<dyn TokenRefresher>,
    inner: Arc<Mutex<Inner>>,
    refresh_calls: AtomicU64,
}

impl TokenManager {
    /// Manager holding `initial` credentials, in `Idle`.
    pub fn new(refresher: Arc<dyn TokenRefresher>, initial: TokenPair) -> Self {
        Self::with_state(refresher, Credentials::from_pair(&initial), TokenState::Idle)
    }

    /// Manager with no credentials. It starts `Invalidated`: there is nothing
    /// to exchange until [`set_credentials`](Self::set_credentials) is called.
    pub fn unauthenticated(refresher: Arc<dyn TokenRefresher>) -> Self {
        Self::with_state(refresher, Credentials::default(), TokenState::Invalidated)
    }

    fn with_state(refresher: Arc<dyn TokenRefresher>, credentials: Credentials, state: TokenState) -> Self {
        Self {
            refresher,
            inner: Arc::new(Mutex::new(Inner {
                credentials,
                state,
                in_flight: None,
                generation: 0,
            })),
            refresh_calls: AtomicU64::new(0),
        }
    }

    /// Current access token; empty means unauthenticated. Never blocks on a refresh.
    pub fn current_access_token(&self) -> String {
        lock(&self.inner).credentials.access_token.clone()
    }

    pub fn state(&self) -> TokenState {
        lock(&self.inner).state
    }

    pub fn is_authenticated(&self) -> bool {
        !lock(&self.inner).credentials.access_token.is_empty()
    }

    /// True when the access token is known to expire within `skew`.
    ///
    /// Tokens without a reported lifetime never count as expired.
    pub fn is_expired(&self, skew: Duration) -> bool {
        lock(&self.inner)
            .credentials
            .expires_at
            .map(|t| Instant::now() + skew >= t)
            .unwrap_or(false)
    }

    /// Number of calls made to the refresh endpoint so far.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Install credentials obtained by re-authentication. Leaves any state for `Idle`.
    pub fn set_credentials(&self, pair: TokenPair) {
        let mut inner = lock(&self.inner);
        inner.generation += 1;
        inner.credentials = Credentials::from_pair(&pair);
        inner.state = TokenState::Idle;
        inner.in_flight = None;
        info!("credentials installed");
    }

    /// Drop the credentials (logout). Moves to `Invalidated`.
    pub fn clear(&self) {
        let mut inner = lock(&self.inner);
        inner.generation += 1;
        inner.credentials = Credentials::default();
        inner.state = TokenState::Invalidated;
        inner.in_flight = None;
        info!("credentials cleared");
    }

    /// Refresh the credentials, joining an in-flight refresh if there is one.
    ///
    /// Every caller that joins the same refresh gets the same result. When the
    /// manager is `Invalidated` this fails immediately without calling the endpoint.
    pub async fn request_refresh(&self) -> RefreshOutcome {
        let begin = self.begin(None);
        self.finish(begin).await
    }

    /// Like [`request_refresh`](Self::request_refresh), but if the credentials
    /// already moved past `used_token` (a concurrent refresh finished), returns
    /// the current pair without starting another refresh.
    pub async fn refresh_after(&self, used_token: Option<&str>) -> RefreshOutcome {
        let begin = self.begin(Some(used_token.unwrap_or("")));
        self.finish(begin).await
    }

    async fn finish(&self, begin: Begin) -> RefreshOutcome {
        match begin {
            Begin::Ready(pair) => Ok(pair),
            Begin::Wait(shared) => shared.await,
            Begin::Refused(err) => Err(err),
        }
    }

    fn begin(&self, used_token: Option<&str>) -> Begin {
        let mut inner = lock(&self.inner);
        match inner.state {
            TokenState::Refreshing => match inner.in_flight.clone() {
                Some(shared) => {
                    debug!("joining in-flight token refresh");
                    Begin::Wait(shared)
                }
                None => Begin::Wait(self.start(&mut inner)),
            },
            TokenState::Invalidated => Begin::Refused(RefreshError::already_invalidated()),
            TokenState::Idle => {
                if let Some(used) = used_token {
                    let current = &inner.credentials.access_token;
                    if !current.is_empty() && current != used {
                        debug!("credentials already rotated; skipping refresh");
                        return Begin::Ready(inner.credentials.to_pair());
                    }
                }
                Begin::Wait(self.start(&mut inner))
            }
        }
    }

    fn start(&self, inner: &mut Inner) -> SharedRefresh {
        inner.state = TokenState::Refreshing;
        let generation = inner.generation;
        let refresh_token = inner.credentials.refresh_token.clone();
        let refresher = self.refresher.clone();
        let state = self.inner.clone();
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        debug!("starting token refresh");

        let task = tokio::spawn({
            let state = state.clone();
            async move {
                let outcome = refresher.refresh(&refresh_token).await;
                settle(&state, generation, &outcome);
                outcome
            }
        });

        let shared = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let outcome = Err(RefreshError::new(format!("refresh task aborted: {}", e)));
                    settle(&state, generation, &outcome);
                    outcome
                }
            }
        }
        .boxed()
        .shared();

        inner.in_flight = Some(shared.clone());
        shared
    }
}
