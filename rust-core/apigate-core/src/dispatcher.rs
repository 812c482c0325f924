//! # Dispatcher
//!
//! Invokes backend handlers with validated input under a per-handler
//! concurrency bound, a per-call deadline and transient-failure retries.
//!
//! ## Slots
//!
//! Each handler owns a fair (FIFO) semaphore sized
//! `max_concurrent_per_handler`. A request that finds no free slot waits in
//! line, unless `queue_limit` is set and that many requests are already
//! waiting, in which case it fails fast with `Error::Overload`.
//!
//! ## Deadline
//!
//! The deadline starts once a slot is held and spans every retry. The
//! invocation runs in its own task; on expiry the task is aborted, its late
//! result is discarded and the slot is released before `Error::Timeout` is
//! returned. Dropping a `dispatch` future at any point releases whatever it
//! holds (slot, queue position, task).

use crate::error::{Error, Result};
use crate::route::HandlerRef;
use crate::validation::ValidatedInput;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Dispatch limits
///
/// Built explicitly with [`DispatchConfig::new`]; only `retry_attempts`
/// (0) and `queue_limit` (unbounded) have defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Upper bound on in-flight invocations per handler
    pub max_concurrent_per_handler: usize,
    /// Per-call deadline, measured from slot acquisition
    pub timeout: Duration,
    /// Extra attempts after a transient failure
    pub retry_attempts: u32,
    /// Max requests waiting for a slot per handler; `None` waits without bound
    pub queue_limit: Option<usize>,
}

impl DispatchConfig {
    /// Create a config with no retries and an unbounded wait queue
    #[must_use]
    pub fn new(max_concurrent_per_handler: usize, timeout: Duration) -> Self {
        Self {
            max_concurrent_per_handler,
            timeout,
            retry_attempts: 0,
            queue_limit: None,
        }
    }

    /// Set the number of retries for transient failures
    #[must_use]
    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts;
        self
    }

    /// Bound the per-handler wait queue
    #[must_use]
    pub fn with_queue_limit(mut self, queue_limit: usize) -> Self {
        self.queue_limit = Some(queue_limit);
        self
    }

    /// Check the limits are usable
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for a concurrency bound of zero or above
    /// `Semaphore::MAX_PERMITS`, or a zero timeout
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_per_handler == 0 {
            return Err(Error::config("max_concurrent_per_handler must be at least 1"));
        }
        if self.max_concurrent_per_handler > Semaphore::MAX_PERMITS {
            return Err(Error::config(format!(
                "max_concurrent_per_handler must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::config("timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Failure reported by a backend invocation
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum InvokeError {
    /// Worth retrying (connection reset, throttled, cold start)
    #[error("transient failure: {0}")]
    Transient(String),
    /// Not retried
    #[error("{0}")]
    Failed(String),
}

/// Boxed invocation future
pub type InvokeFuture = Pin<Box<dyn Future<Output = std::result::Result<Value, InvokeError>> + Send>>;

/// Backend invocation capability
///
/// How the call happens (in-process, remote, hosted function) is up to the
/// implementation. It should give up once `deadline` has passed; the
/// dispatcher aborts it at the deadline either way.
pub trait Invoker: Send + Sync + 'static {
    /// Invoke `handler` with `input`
    fn invoke(&self, handler: &HandlerRef, input: ValidatedInput, deadline: Instant) -> InvokeFuture;
}

/// Handler function type (async)
pub type HandlerFn = Arc<dyn Fn(ValidatedInput) -> InvokeFuture + Send + Sync>;

/// In-process invoker: a registry of async functions keyed by handler name
#[derive(Clone, Default)]
pub struct LocalInvoker {
    handlers: HashMap<HandlerRef, HandlerFn>,
}

impl LocalInvoker {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async handler function
    pub fn register<F, Fut>(&mut self, handler: impl Into<HandlerRef>, f: F)
    where
        F: Fn(ValidatedInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, InvokeError>> + Send + 'static,
    {
        let wrapped: HandlerFn = Arc::new(move |input| -> InvokeFuture { Box::pin(f(input)) });
        self.handlers.insert(handler.into(), wrapped);
    }

    /// Builder form of [`LocalInvoker::register`]
    #[must_use]
    pub fn with_handler<F, Fut>(mut self, handler: impl Into<HandlerRef>, f: F) -> Self
    where
        F: Fn(ValidatedInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, InvokeError>> + Send + 'static,
    {
        self.register(handler, f);
        self
    }

    /// Whether a handler is registered
    #[must_use]
    pub fn contains(&self, handler: &HandlerRef) -> bool {
        self.handlers.contains_key(handler)
    }
}

impl fmt::Debug for LocalInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalInvoker")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Invoker for LocalInvoker {
    fn invoke(&self, handler: &HandlerRef, input: ValidatedInput, _deadline: Instant) -> InvokeFuture {
        match self.handlers.get(handler) {
            Some(f) => f(input),
            None => {
                let cause = format!("no handler registered for {handler}");
                Box::pin(async move { Err(InvokeError::Failed(cause)) })
            }
        }
    }
}

/// Slot pool for one handler
#[derive(Debug)]
struct HandlerSlots {
    permits: Arc<Semaphore>,
    waiting: AtomicUsize,
}

/// Decrements the waiter count however the wait ends
struct WaitGuard<'a>(&'a AtomicUsize);

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Join handle that aborts its task when dropped
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<T> Future for AbortOnDrop<T> {
    type Output = std::result::Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

/// Bounded, deadline-enforcing handler dispatcher
pub struct Dispatcher {
    config: DispatchConfig,
    invoker: Arc<dyn Invoker>,
    slots: HashMap<HandlerRef, HandlerSlots>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("handlers", &self.slots.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher with a slot pool for each handler
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the config is invalid
    pub fn new(
        config: DispatchConfig,
        invoker: Arc<dyn Invoker>,
        handlers: impl IntoIterator<Item = HandlerRef>,
    ) -> Result<Self> {
        config.validate()?;
        let slots = handlers
            .into_iter()
            .map(|handler| {
                let slots = HandlerSlots {
                    permits: Arc::new(Semaphore::new(config.max_concurrent_per_handler)),
                    waiting: AtomicUsize::new(0),
                };
                (handler, slots)
            })
            .collect();

        Ok(Self {
            config,
            invoker,
            slots,
        })
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Invocations currently holding a slot for `handler`
    #[must_use]
    pub fn in_flight(&self, handler: &HandlerRef) -> usize {
        self.slots.get(handler).map_or(0, |s| {
            self.config.max_concurrent_per_handler - s.permits.available_permits()
        })
    }

    /// Requests currently waiting for a slot for `handler`
    #[must_use]
    pub fn queued(&self, handler: &HandlerRef) -> usize {
        self.slots
            .get(handler)
            .map_or(0, |s| s.waiting.load(Ordering::Acquire))
    }

    /// Invoke `handler` with `input`
    ///
    /// # Errors
    ///
    /// - `Error::Overload` if the wait queue is full
    /// - `Error::Timeout` if the deadline passes first
    /// - `Error::Handler` if the backend fails, panics, or the handler is unknown
    pub async fn dispatch(&self, handler: &HandlerRef, input: ValidatedInput) -> Result<Value> {
        let slots = self.slots.get(handler).ok_or_else(|| Error::Handler {
            handler: handler.to_string(),
            cause: "handler not registered with dispatcher".to_string(),
        })?;

        let _permit = self.acquire(handler, slots).await?;
        let deadline = Instant::now() + self.config.timeout;

        let invoker = Arc::clone(&self.invoker);
        let task_handler = handler.clone();
        let retry_attempts = self.config.retry_attempts;
        let task = AbortOnDrop(tokio::spawn(async move {
            invoke_with_retry(&*invoker, &task_handler, input, deadline, retry_attempts)
                .await
        }));

        match tokio::time::timeout_at(deadline, task).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) => Err(Error::Handler {
                handler: handler.to_string(),
                cause: err.to_string(),
            }),
            Ok(Err(join_err)) => Err(Error::Handler {
                handler: handler.to_string(),
                cause: format!("invocation task failed: {join_err}"),
            }),
            Err(_) => {
                warn!(handler = %handler, timeout_ms = %self.config.timeout.as_millis(), "Invocation timed out");
                Err(Error::Timeout {
                    handler: handler.to_string(),
                    timeout: self.config.timeout,
                })
            }
        }
    }

    async fn acquire(&self, handler: &HandlerRef, slots: &HandlerSlots) -> Result<OwnedSemaphorePermit> {
        let closed = || Error::Handler {
            handler: handler.to_string(),
            cause: "slot pool closed".to_string(),
        };

        match Arc::clone(&slots.permits).try_acquire_owned() {
            Ok(permit) => return Ok(permit),
            Err(TryAcquireError::Closed) => return Err(closed()),
            Err(TryAcquireError::NoPermits) => {}
        }

        let admitted = match self.config.queue_limit {
            Some(limit) => slots
                .waiting
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| (w < limit).then_some(w + 1))
                .is_ok(),
            None => {
                slots.waiting.fetch_add(1, Ordering::AcqRel);
                true
            }
        };
        if !admitted {
            warn!(handler = %handler, "Wait queue full, rejecting request");
            return Err(Error::Overload {
                handler: handler.to_string(),
            });
        }

        let _waiting = WaitGuard(&slots.waiting);
        debug!(handler = %handler, "Waiting for a free slot");
        Arc::clone(&slots.permits)
            .acquire_owned()
            .await
            .map_err(|_| closed())
    }
}

async fn invoke_with_retry(
    invoker: &dyn Invoker,
    handler: &HandlerRef,
    input: ValidatedInput,
    deadline: Instant,
    retry_attempts: u32,
) -> std::result::Result<Value, InvokeError> {
    let mut attempt = 0;
    loop {
        match invoker.invoke(handler, input.clone(), deadline).await {
            Err(InvokeError::Transient(cause)) if attempt < retry_attempts => {
                attempt += 1;
                debug!(handler = %handler, attempt, cause = %cause, "Retrying transient failure");
            }
            outcome => return outcome,
        }
    }
}
