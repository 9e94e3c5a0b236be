//! Handler registry and bounded, isolated handler execution.
//!
//! Every handler invocation runs in its own task so the read loop never
//! waits on user code. A global semaphore caps how many invocations run
//! at once; the rest queue in arrival order. Failures and panics stop at
//! the task boundary and are logged.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cordwire_protocol::{Event, EventKind};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tracing::{debug, error, trace};

/// Error type handlers return.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// What a handler future resolves to.
pub type HandlerResult = Result<(), HandlerError>;

/// A registered handler, type-erased.
pub type BoxedHandler = Arc<dyn Fn(Event) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Handlers keyed by event kind, in registration order.
///
/// Registration is append-only; handlers survive reconnects.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<EventKind, Vec<BoxedHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the list for `kind`.
    pub fn on<F, Fut>(&mut self, kind: EventKind, handler: F) -> &mut Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let boxed: BoxedHandler = Arc::new(move |event| handler(event).boxed());
        self.handlers.entry(kind).or_default().push(boxed);
        self
    }

    /// Handlers for `kind`, in the order they were added.
    pub fn handlers_for(&self, kind: EventKind) -> &[BoxedHandler] {
        self.handlers.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of handlers registered for `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        self.handlers_for(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.values().all(Vec::is_empty)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (kind, list) in &self.handlers {
            map.entry(kind, &list.len());
        }
        map.finish()
    }
}

// ---------------------------------------------------------------------------
// Live-task set
// ---------------------------------------------------------------------------

/// Abort handles of handler tasks that have not finished yet.
///
/// The task is spawned before its handle is inserted, and the lock is
/// never held across `tokio::spawn`. A task can therefore finish before
/// its insert; its guard then leaves a tombstone that the insert consumes.
#[derive(Debug, Default)]
struct LiveSet {
    inner: Mutex<LiveInner>,
}

#[derive(Debug, Default)]
struct LiveInner {
    tasks: HashMap<u64, AbortHandle>,
    finished: HashSet<u64>,
}

impl LiveSet {
    fn lock(&self) -> MutexGuard<'_, LiveInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, id: u64, handle: AbortHandle) {
        let mut inner = self.lock();
        if !inner.finished.remove(&id) {
            inner.tasks.insert(id, handle);
        }
    }

    fn remove(&self, id: u64) {
        let mut inner = self.lock();
        if inner.tasks.remove(&id).is_none() {
            inner.finished.insert(id);
        }
    }

    fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    fn abort_all(&self) -> usize {
        let handles: Vec<AbortHandle> = self.lock().tasks.values().cloned().collect();
        // Entries are removed by the tasks' own guards.
        for handle in &handles {
            handle.abort();
        }
        handles.len()
    }
}

/// Removes one task from the live set when dropped, however the task ends.
struct LiveGuard {
    id: u64,
    live: Arc<LiveSet>,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.live.remove(self.id);
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Runs registered handlers for incoming events.
pub struct Dispatcher {
    registry: HandlerRegistry,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    live: Arc<LiveSet>,
    next_id: AtomicU64,
}

impl Dispatcher {
    /// A dispatcher that runs at most `max_concurrent` handlers at once.
    /// Zero is raised to one.
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            registry: HandlerRegistry::new(),
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            live: Arc::new(LiveSet::default()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    /// Spawns one task per handler registered for the event's kind and
    /// returns how many were spawned. Never waits.
    ///
    /// `raw` is the original payload; when given, it is logged next to any
    /// handler failure.
    pub fn dispatch(&self, event: Event, raw: Option<Arc<Value>>) -> usize {
        let kind = event.kind();
        let handlers = self.registry.handlers_for(kind);
        if handlers.is_empty() {
            trace!(event = %kind, "no handlers registered");
            return 0;
        }

        for handler in handlers {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let guard = LiveGuard {
                id,
                live: Arc::clone(&self.live),
            };
            let task = run_handler(
                guard,
                Arc::clone(&self.permits),
                Arc::clone(handler),
                event.clone(),
                raw.clone(),
            );
            let handle = tokio::spawn(task);
            self.live.insert(id, handle.abort_handle());
        }
        handlers.len()
    }

    /// Handler tasks spawned and not yet finished, queued ones included.
    pub fn live_tasks(&self) -> usize {
        self.live.len()
    }

    /// Free slots in the concurrency bound.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Cancels every live handler task. Returns how many were signalled.
    pub fn abort_all(&self) -> usize {
        let aborted = self.live.abort_all();
        if aborted > 0 {
            debug!(aborted, "aborting handler tasks");
        }
        aborted
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("max_concurrent", &self.max_concurrent)
            .field("available_permits", &self.available_permits())
            .field("live_tasks", &self.live_tasks())
            .finish()
    }
}

async fn run_handler(
    guard: LiveGuard,
    permits: Arc<Semaphore>,
    handler: BoxedHandler,
    event: Event,
    raw: Option<Arc<Value>>,
) {
    let _guard = guard;
    let kind = event.kind();

    // Closed only if the dispatcher is gone.
    let Ok(_permit) = permits.acquire_owned().await else {
        return;
    };

    // Wrapped so a panic while building the future is caught too.
    let outcome = AssertUnwindSafe(async move { handler(event).await })
        .catch_unwind()
        .await;

    let failed = match outcome {
        Ok(Ok(())) => false,
        Ok(Err(e)) => {
            error!(event = %kind, error = %e, "handler failed");
            true
        }
        Err(panic) => {
            error!(event = %kind, panic = panic_message(&*panic), "handler panicked");
            true
        }
    };
    if failed {
        if let Some(raw) = raw {
            debug!(event = %kind, payload = %raw, "payload of failed event");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic>"
    }
}
