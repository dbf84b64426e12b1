// Fetch controller.
// Drives one identifier subscription through idle/loading/fetched/error.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::cache::FetchCache;
use crate::cancel::CancellationFlag;
use crate::identifier::Identifier;
use crate::state::{FetchEvent, FetchState};
use crate::transport::{RequestOptions, Transport};

/// State shared between a controller and its in-flight operation.
struct Shared<T> {
    /// Guards every commit. Cancelling happens under this lock too, so a
    /// stale operation can never publish after its flag was set.
    publish: Mutex<Subscribers<T>>,
    state: watch::Sender<FetchState<T>>,
}

struct Subscribers<T> {
    senders: Vec<mpsc::UnboundedSender<FetchState<T>>>,
    disposed: bool,
}

impl<T> Shared<T> {
    fn cancel(&self, flag: &CancellationFlag) {
        let _guard = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        flag.cancel();
    }

    /// Stop all further publishing and end every subscription.
    fn close(&self) {
        let mut subscribers = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.disposed = true;
        subscribers.senders.clear();
    }

    fn is_closed(&self) -> bool {
        self.publish
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .disposed
    }
}

impl<T: Clone> Shared<T> {
    fn new() -> Self {
        let (state, _) = watch::channel(FetchState::Idle);
        Self {
            publish: Mutex::new(Subscribers {
                senders: Vec::new(),
                disposed: false,
            }),
            state,
        }
    }

    /// Apply `event` unless `flag` is cancelled. Returns whether it applied.
    fn commit(&self, flag: &CancellationFlag, event: FetchEvent<T>) -> bool {
        let mut subscribers = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        if flag.is_cancelled() || subscribers.disposed {
            return false;
        }

        let mut next = None;
        self.state.send_modify(|state| {
            let prev = std::mem::replace(state, FetchState::Idle);
            *state = prev.apply(event);
            next = Some(state.clone());
        });

        if let Some(next) = next {
            subscribers
                .senders
                .retain(|tx| tx.send(next.clone()).is_ok());
        }
        true
    }
}

/// Request-deduplicating, cache-backed fetch state machine.
///
/// A controller owns at most one active operation. Supplying a new
/// identifier, clearing it, or disposing the controller cancels that
/// operation: its transport call still completes and still populates the
/// cache, but it can no longer change this controller's state.
///
/// Operations run as Tokio tasks, so identifiers must be supplied from
/// within a Tokio runtime.
pub struct FetchController<T> {
    cache: Arc<dyn FetchCache<T>>,
    transport: Arc<dyn Transport<T>>,
    options: RequestOptions,
    shared: Arc<Shared<T>>,
    identifier: Option<Identifier>,
    operation: Option<CancellationFlag>,
}

impl<T> FetchController<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an idle controller over a shared cache and transport.
    pub fn new(cache: Arc<dyn FetchCache<T>>, transport: Arc<dyn Transport<T>>) -> Self {
        Self {
            cache,
            transport,
            options: RequestOptions::default(),
            shared: Arc::new(Shared::new()),
            identifier: None,
            operation: None,
        }
    }

    /// Set the options passed to the transport on every request.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Create a controller and activate it with `identifier`.
    pub fn activate(
        cache: Arc<dyn FetchCache<T>>,
        transport: Arc<dyn Transport<T>>,
        identifier: Option<&str>,
    ) -> Self {
        let mut controller = Self::new(cache, transport);
        controller.set_identifier(identifier);
        controller
    }

    /// Current state snapshot.
    pub fn state(&self) -> FetchState<T> {
        self.shared.state.borrow().clone()
    }

    /// Identifier of the current subscription, if any.
    pub fn identifier(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }

    /// Receiver that always holds the latest state.
    pub fn watch(&self) -> watch::Receiver<FetchState<T>> {
        self.shared.state.subscribe()
    }

    /// Receive every transition, starting with the current state.
    ///
    /// The stream ends when the controller is disposed.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<FetchState<T>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self
            .shared
            .publish
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !subscribers.disposed && tx.send(self.shared.state.borrow().clone()).is_ok() {
            subscribers.senders.push(tx);
        }
        rx
    }

    /// Point the controller at a new identifier.
    ///
    /// `None` or `""` cancels any operation and returns to idle without
    /// touching the cache. The same identifier again is a no-op unless the
    /// last attempt ended in an error, in which case it retries.
    pub fn set_identifier(&mut self, identifier: Option<&str>) {
        match Identifier::from_optional(identifier) {
            None => self.clear(),
            Some(id) => {
                if self.identifier.as_ref() == Some(&id) && !self.state().is_error() {
                    return;
                }
                self.identifier = Some(id);
                self.start();
            }
        }
    }

    /// Re-run the operation for the current identifier, if any.
    pub fn refetch(&mut self) {
        if self.identifier.is_some() {
            self.start();
        }
    }

    /// Wait until the controller leaves `loading` and return the state it
    /// reached (`fetched`, `error`, or `idle` when no identifier is set).
    ///
    /// Returns `None` if the controller was disposed while still loading;
    /// such an operation never reaches a terminal state here.
    pub async fn wait_terminal(&self) -> Option<FetchState<T>> {
        let mut rx = self.watch();
        loop {
            {
                let state = rx.borrow_and_update();
                if !state.is_loading() {
                    return Some(state.clone());
                }
            }
            if self.shared.is_closed() || rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Release the controller: cancel the active operation and end every
    /// subscription. Later results are discarded.
    pub fn dispose(&mut self) {
        self.release();
    }

    fn clear(&mut self) {
        self.cancel_operation();
        self.identifier = None;
        if !self.state().is_idle() {
            self.shared.commit(&CancellationFlag::new(), FetchEvent::Reset);
        }
    }

    fn start(&mut self) {
        let Some(id) = self.identifier.clone() else {
            return;
        };

        self.cancel_operation();
        let flag = CancellationFlag::new();
        self.operation = Some(flag.clone());

        if !self.shared.commit(&flag, FetchEvent::Start) {
            return;
        }

        let operation = Operation {
            id,
            flag,
            cache: Arc::clone(&self.cache),
            transport: Arc::clone(&self.transport),
            options: self.options.clone(),
            shared: Arc::clone(&self.shared),
        };
        tokio::spawn(operation.run());
    }
}

impl<T> FetchController<T> {
    fn cancel_operation(&mut self) {
        if let Some(flag) = self.operation.take() {
            self.shared.cancel(&flag);
        }
    }

    fn release(&mut self) {
        self.cancel_operation();
        self.shared.close();
    }
}

impl<T> Drop for FetchController<T> {
    fn drop(&mut self) {
        self.release();
    }
}

/// One cache-then-transport resolution for a single identifier.
struct Operation<T> {
    id: Identifier,
    flag: CancellationFlag,
    cache: Arc<dyn FetchCache<T>>,
    transport: Arc<dyn Transport<T>>,
    options: RequestOptions,
    shared: Arc<Shared<T>>,
}

impl<T> Operation<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn run(self) {
        if let Some(value) = self.cache.get(&self.id).await {
            self.finish(FetchEvent::Resolve(value));
            return;
        }

        match self.transport.request(&self.id, &self.options).await {
            Ok(payload) => {
                // Cache before publishing; cancelled operations still write.
                self.cache.set(&self.id, payload.clone()).await;
                self.finish(FetchEvent::Resolve(payload));
            }
            Err(e) => {
                warn!(identifier = %self.id, error = %e, "fetch failed");
                self.finish(FetchEvent::Fail(e.reason()));
            }
        }
    }

    fn finish(&self, event: FetchEvent<T>) {
        if self.shared.commit(&self.flag, event) {
            debug!(identifier = %self.id, "operation settled");
        } else {
            debug!(identifier = %self.id, "discarding result of stale operation");
        }
    }
}
