//! Bounded, backoff-aware dispatch of provider lookups
//!
//! One [`Scheduler`] is shared by every in-flight evaluation. It bounds how
//! many provider lookups run at once, independently of how many posts are
//! being evaluated, and honors pause requests:
//!
//! - a provider returning [`ProviderError::Backoff`] pauses all dispatch and
//!   its own lookup is retried once dispatch resumes;
//! - queued lookups stay queued while paused;
//! - a timed pause ends by itself, an indefinite one on [`Scheduler::resume`].
//!
//! Dropping the future returned by [`Scheduler::run`] abandons the lookup.

use super::providers::{Pause, ProviderError};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{watch, Semaphore};
use tokio::time::Instant;

/// Default number of lookups allowed to run at once
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Scheduler settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum concurrent provider lookups
    pub max_concurrent: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

impl SchedulerConfig {
    /// Set the concurrency bound (at least 1)
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PauseState {
    Running,
    Until(Instant),
    Indefinite,
}

impl PauseState {
    /// The longer of two pauses
    fn merge(self, other: PauseState) -> PauseState {
        match (self, other) {
            (PauseState::Indefinite, _) | (_, PauseState::Indefinite) => PauseState::Indefinite,
            (PauseState::Until(a), PauseState::Until(b)) => PauseState::Until(a.max(b)),
            (PauseState::Running, state) | (state, PauseState::Running) => state,
        }
    }
}

/// Lookup counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Lookups started, retries included
    pub dispatched: u64,
    /// Lookups that answered with a backoff request
    pub backoffs: u64,
}

/// Shared lookup pool
#[derive(Debug)]
pub struct Scheduler {
    permits: Semaphore,
    state: watch::Sender<PauseState>,
    config: SchedulerConfig,
    dispatched: AtomicU64,
    backoffs: AtomicU64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create a scheduler with the default settings
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler with custom settings
    pub fn with_config(config: SchedulerConfig) -> Self {
        let (state, _) = watch::channel(PauseState::Running);
        Self {
            permits: Semaphore::new(config.max_concurrent.max(1)),
            state,
            config,
            dispatched: AtomicU64::new(0),
            backoffs: AtomicU64::new(0),
        }
    }

    /// Current settings
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Stop dispatching new lookups
    ///
    /// When already paused, the longer of the two pauses wins.
    pub fn pause(&self, pause: Pause) {
        let requested = match pause {
            Pause::For(duration) => PauseState::Until(Instant::now() + duration),
            Pause::Indefinite => PauseState::Indefinite,
        };
        self.state.send_if_modified(|state| {
            let merged = state.merge(requested);
            let changed = merged != *state;
            *state = merged;
            changed
        });
        log_debug!("scheduler paused: {:?}", pause);
    }

    /// Resume dispatching immediately
    pub fn resume(&self) {
        self.state.send_if_modified(|state| {
            let changed = *state != PauseState::Running;
            *state = PauseState::Running;
            changed
        });
    }

    /// Whether dispatch is currently paused
    pub fn is_paused(&self) -> bool {
        match *self.state.borrow() {
            PauseState::Running => false,
            PauseState::Until(deadline) => Instant::now() < deadline,
            PauseState::Indefinite => true,
        }
    }

    /// Counters since creation
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            backoffs: self.backoffs.load(Ordering::Relaxed),
        }
    }

    /// Run a lookup under the concurrency bound
    ///
    /// `job` is called again whenever it answers with a backoff request.
    /// Every other result, errors included, is returned to the caller.
    pub async fn run<T, F, Fut>(&self, mut job: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        loop {
            self.wait_until_running().await;

            let permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| ProviderError::Unavailable)?;

            // A pause may have started while waiting for the permit
            if self.is_paused() {
                drop(permit);
                continue;
            }

            self.dispatched.fetch_add(1, Ordering::Relaxed);
            let result = job().await;
            drop(permit);

            match result {
                Err(ProviderError::Backoff(pause)) => {
                    self.backoffs.fetch_add(1, Ordering::Relaxed);
                    self.pause(pause);
                }
                other => return other,
            }
        }
    }

    async fn wait_until_running(&self) {
        let mut rx = self.state.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                PauseState::Running => return,
                PauseState::Until(deadline) => {
                    if Instant::now() >= deadline {
                        self.expire(deadline);
                        return;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => self.expire(deadline),
                        _ = rx.changed() => {}
                    }
                }
                PauseState::Indefinite => {
                    if rx.changed().await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    /// End a timed pause unless it was replaced meanwhile
    fn expire(&self, deadline: Instant) {
        self.state.send_if_modified(|state| {
            if *state == PauseState::Until(deadline) {
                *state = PauseState::Running;
                true
            } else {
                false
            }
        });
    }
}
