//! Rate limiter built around a single coordinating task.
//!
//! The shared [`RateLimitState`] is owned by one spawned task. Callers talk to
//! it over a channel: they ask for admission, receive either a pause or a
//! slot, and report the response back when the call completes. Because only
//! the coordinator touches the state, updates are never interleaved no matter
//! how many tasks issue requests.
//!
//! Admission follows two rules:
//! - A pause is in effect while a server-advised `X-RateLimit-ToWait-Sec`
//!   has not elapsed, or for one cooldown when the remaining budget is at or
//!   below the reserve. Every caller sharing the limiter honors it.
//! - At most `concurrency` calls hold a slot. Further callers queue in FIFO
//!   order until a slot is released.

use crate::{RateLimitConfig, RateLimitHeaders, RateLimitObserver, RateLimitState, TracingObserver};
use qualys_error::{RateLimitError, RateLimitErrorKind};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

enum Command {
    Acquire {
        admitted: bool,
        reply: oneshot::Sender<Admission>,
    },
    TryAcquire {
        reply: oneshot::Sender<Option<RateLimiterGuard>>,
    },
    Release {
        headers: Option<RateLimitHeaders>,
        reply: Option<oneshot::Sender<RateLimitState>>,
    },
    Snapshot {
        reply: oneshot::Sender<RateLimitState>,
    },
}

enum Admission {
    Wait {
        wait: Duration,
        state: RateLimitState,
    },
    Granted(RateLimiterGuard),
}

/// Handle to the task that owns the shared rate limit state.
///
/// Cloning the handle is cheap; every clone talks to the same coordinator, so
/// all requests for one Qualys subscription must go through clones of one
/// limiter.
///
/// # Example
///
/// ```rust,ignore
/// use qualys_rate_limit::{RateLimiter, RateLimitConfig};
///
/// let limiter = RateLimiter::new(RateLimitConfig::default());
///
/// let guard = limiter.acquire("/qps/rest/portal/version").await?;
/// let response = client.get(url).send().await?;
/// let state = guard.complete(RateLimitHeaders::from_headers(response.headers())).await?;
/// ```
#[derive(Clone)]
pub struct RateLimiter {
    sender: mpsc::UnboundedSender<Command>,
    config: RateLimitConfig,
    observer: Arc<dyn RateLimitObserver>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter starting from the conservative default state.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_state(config, RateLimitState::default())
    }

    /// Create a limiter starting from a specific state.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_state(config: RateLimitConfig, state: RateLimitState) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut coordinator = Coordinator {
            config,
            state,
            pause_until: None,
            waiters: VecDeque::new(),
            receiver,
            handle: sender.downgrade(),
        };
        coordinator.absorb_initial_wait();
        tokio::spawn(coordinator.run());

        Self {
            sender,
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the observer notified at admission, response and retry points.
    pub fn with_observer(mut self, observer: Arc<dyn RateLimitObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Static configuration this limiter was built with.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Observer notified at the executor's decision points.
    pub fn observer(&self) -> &dyn RateLimitObserver {
        self.observer.as_ref()
    }

    /// Wait for admission and a free concurrency slot.
    ///
    /// Returns a guard that releases the slot when completed or dropped.
    #[instrument(skip(self))]
    pub async fn acquire(&self, endpoint: &str) -> Result<RateLimiterGuard, RateLimitError> {
        let mut admitted = false;
        loop {
            let (reply, response) = oneshot::channel();
            self.send(Command::Acquire { admitted, reply })?;

            match response.await.map_err(|_| closed())? {
                Admission::Granted(guard) => {
                    trace!(running = guard.state().concurrency_running, "Slot granted");
                    return Ok(guard);
                }
                Admission::Wait { wait, state } => {
                    self.observer.on_admission(endpoint, wait, &state);
                    tokio::time::sleep(wait).await;
                    admitted = true;
                }
            }
        }
    }

    /// Take a slot only if no pause is in effect and a slot is free right now.
    pub async fn try_acquire(&self) -> Result<Option<RateLimiterGuard>, RateLimitError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::TryAcquire { reply })?;
        response.await.map_err(|_| closed())
    }

    /// Current state as seen by the coordinator.
    pub async fn snapshot(&self) -> Result<RateLimitState, RateLimitError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot { reply })?;
        response.await.map_err(|_| closed())
    }

    fn send(&self, command: Command) -> Result<(), RateLimitError> {
        self.sender.send(command).map_err(|_| closed())
    }
}

/// RAII guard for one concurrency slot.
///
/// Call [`RateLimiterGuard::complete`] with the response headers to fold them
/// into the shared state. Dropping the guard without completing it (transport
/// error, cancelled future) still releases the slot and applies the local
/// decrement.
pub struct RateLimiterGuard {
    sender: mpsc::UnboundedSender<Command>,
    state: RateLimitState,
    released: bool,
}

impl fmt::Debug for RateLimiterGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiterGuard")
            .field("state", &self.state)
            .field("released", &self.released)
            .finish()
    }
}

impl RateLimiterGuard {
    /// State snapshot taken when the slot was granted.
    pub fn state(&self) -> &RateLimitState {
        &self.state
    }

    /// Release the slot and report the response's rate limit headers.
    ///
    /// Returns the state after the update.
    pub async fn complete(
        mut self,
        headers: RateLimitHeaders,
    ) -> Result<RateLimitState, RateLimitError> {
        let (reply, response) = oneshot::channel();
        self.released = true;
        self.sender
            .send(Command::Release {
                headers: Some(headers),
                reply: Some(reply),
            })
            .map_err(|_| closed())?;
        response.await.map_err(|_| closed())
    }
}

impl Drop for RateLimiterGuard {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.sender.send(Command::Release {
                headers: None,
                reply: None,
            });
        }
    }
}

fn closed() -> RateLimitError {
    RateLimitError::new(RateLimitErrorKind::CoordinatorClosed)
}

/// Caller queued for a free slot.
struct Waiter {
    /// Already waited out an admission pause before queueing.
    admitted: bool,
    reply: oneshot::Sender<Admission>,
}

struct Coordinator {
    config: RateLimitConfig,
    state: RateLimitState,
    pause_until: Option<Instant>,
    waiters: VecDeque<Waiter>,
    receiver: mpsc::UnboundedReceiver<Command>,
    handle: mpsc::WeakUnboundedSender<Command>,
}

impl Coordinator {
    async fn run(mut self) {
        debug!(state = ?self.state, "Rate limit coordinator started");
        while let Some(command) = self.receiver.recv().await {
            match command {
                Command::Acquire { admitted, reply } => self.acquire(admitted, reply),
                Command::TryAcquire { reply } => self.try_acquire(reply),
                Command::Release { headers, reply } => self.release(headers, reply),
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.state.clone());
                }
            }
        }
        debug!("Rate limit coordinator stopped");
    }

    fn absorb_initial_wait(&mut self) {
        if self.state.to_wait_seconds > 0 {
            let seconds = u64::from(self.state.to_wait_seconds);
            self.extend_pause(Instant::now() + Duration::from_secs(seconds));
        }
    }

    fn acquire(&mut self, admitted: bool, reply: oneshot::Sender<Admission>) {
        if let Some(wait) = self.admission_wait(admitted) {
            let _ = reply.send(Admission::Wait {
                wait,
                state: self.state.clone(),
            });
            return;
        }

        if self.state.has_free_slot() && self.waiters.is_empty() {
            self.grant(reply);
        } else {
            trace!(queued = self.waiters.len() + 1, "All slots busy, queueing");
            self.waiters.push_back(Waiter { admitted, reply });
        }
    }

    fn try_acquire(&mut self, reply: oneshot::Sender<Option<RateLimiterGuard>>) {
        let now = Instant::now();
        let blocked = self.pause_remaining(now).is_some()
            || self.state.budget_exhausted(&self.config)
            || !self.state.has_free_slot()
            || !self.waiters.is_empty();
        if blocked {
            let _ = reply.send(None);
            return;
        }

        let Some(guard) = self.issue_guard() else {
            let _ = reply.send(None);
            return;
        };
        if let Err(Some(guard)) = reply.send(Some(guard)) {
            self.reclaim(guard);
        }
    }

    /// Pause to impose before this caller may take a slot.
    ///
    /// Callers that already waited out an admission pause (`admitted`) skip
    /// the budget check but still honor pauses started since.
    fn admission_wait(&mut self, admitted: bool) -> Option<Duration> {
        let now = Instant::now();
        if !admitted
            && self.state.budget_exhausted(&self.config)
            && self.pause_remaining(now).is_none()
        {
            debug!(
                limit_remaining = self.state.limit_remaining,
                reserve_limit = self.config.reserve_limit,
                "Budget at reserve, pausing admissions"
            );
            self.extend_pause(now + self.config.cooldown());
        }
        self.pause_remaining(now)
    }

    fn pause_remaining(&self, now: Instant) -> Option<Duration> {
        self.pause_until
            .and_then(|until| until.checked_duration_since(now))
            .filter(|wait| !wait.is_zero())
    }

    fn extend_pause(&mut self, until: Instant) {
        self.pause_until = Some(match self.pause_until {
            Some(current) if current > until => current,
            _ => until,
        });
    }

    fn grant(&mut self, reply: oneshot::Sender<Admission>) {
        let Some(guard) = self.issue_guard() else {
            return;
        };
        if let Err(Admission::Granted(guard)) = reply.send(Admission::Granted(guard)) {
            self.reclaim(guard);
        }
    }

    fn issue_guard(&mut self) -> Option<RateLimiterGuard> {
        let sender = self.handle.upgrade()?;
        self.state.concurrency_running += 1;
        debug_assert!(self.state.concurrency_running <= self.state.concurrency);
        Some(RateLimiterGuard {
            sender,
            state: self.state.clone(),
            released: false,
        })
    }

    /// Take back a slot whose caller went away before receiving it.
    fn reclaim(&mut self, mut guard: RateLimiterGuard) {
        guard.released = true;
        self.state.concurrency_running = self.state.concurrency_running.saturating_sub(1);
        self.wake_waiters();
    }

    fn release(
        &mut self,
        headers: Option<RateLimitHeaders>,
        reply: Option<oneshot::Sender<RateLimitState>>,
    ) {
        self.state.concurrency_running = self.state.concurrency_running.saturating_sub(1);

        match headers {
            Some(headers) if !headers.is_empty() => {
                self.state.apply_headers(&headers);
                if let Some(seconds) = headers.to_wait_seconds.filter(|s| *s > 0) {
                    debug!(to_wait_seconds = seconds, "Provider advised a pause");
                    self.extend_pause(Instant::now() + Duration::from_secs(u64::from(seconds)));
                }
            }
            _ => self.state.apply_local_decrement(),
        }

        trace!(state = ?self.state, "Slot released");
        if let Some(reply) = reply {
            let _ = reply.send(self.state.clone());
        }
        self.wake_waiters();
    }

    fn wake_waiters(&mut self) {
        while self.state.has_free_slot() {
            let Some(Waiter { admitted, reply }) = self.waiters.pop_front() else {
                break;
            };
            if reply.is_closed() {
                continue;
            }
            // Responses that arrived while queued may have spent the budget.
            if let Some(wait) = self.admission_wait(admitted) {
                let _ = reply.send(Admission::Wait {
                    wait,
                    state: self.state.clone(),
                });
                continue;
            }
            self.grant(reply);
        }
    }
}
