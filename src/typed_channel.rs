//! Typed dispatch engine over one or more transports.
//!
//! Outbound messages fan out to every transport in order. Inbound envelopes
//! from any transport are routed by their `type` string to the handlers
//! registered for that kind, in registration order.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ChannelError, Result, TransportError};
use crate::message::Envelope;
use crate::message::kind::{Carries, MessageKind, MessageSet};
use crate::subscription::Subscription;
use crate::transport::{EnvelopeHandler, Transport, TransportStats};

/// Configuration for a [`TypedChannel`].
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// Name used in log records
    pub name: String,
    /// Catch a panicking handler and keep running its siblings
    pub isolate_handler_panics: bool,
    /// Keep sending to the remaining transports after one fails
    pub continue_on_send_error: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: "typed-channel".to_string(),
            isolate_handler_panics: true,
            continue_on_send_error: true,
        }
    }
}

impl ChannelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_handler_isolation(mut self, isolate: bool) -> Self {
        self.isolate_handler_panics = isolate;
        self
    }

    pub fn with_send_isolation(mut self, isolate: bool) -> Self {
        self.continue_on_send_error = isolate;
        self
    }
}

type ErasedHandler = Arc<dyn Fn(&Envelope) + Send + Sync>;

struct Registration {
    id: u64,
    handler: ErasedHandler,
}

#[derive(Default)]
struct Registry {
    handlers: HashMap<String, Vec<Registration>>,
    next_id: u64,
}

/// Registry plus the listen epoch, shared with transport callbacks through weak references.
struct Dispatcher {
    registry: Mutex<Registry>,
    epoch: AtomicU64,
    config: ChannelConfig,
}

impl Dispatcher {
    fn register(&self, kind: &str, handler: ErasedHandler) -> u64 {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .handlers
            .entry(kind.to_string())
            .or_default()
            .push(Registration { id, handler });
        id
    }

    fn unregister(&self, kind: &str, id: u64) {
        let mut registry = self.registry.lock();
        let Some(registrations) = registry.handlers.get_mut(kind) else {
            return;
        };
        if let Some(index) = registrations.iter().position(|r| r.id == id) {
            registrations.remove(index);
        }
        if registrations.is_empty() {
            registry.handlers.remove(kind);
        }
    }

    /// Transport callback bound to one listen epoch.
    fn envelope_handler(dispatcher: &Arc<Self>, epoch: u64) -> EnvelopeHandler {
        let dispatcher = Arc::downgrade(dispatcher);
        Arc::new(move |envelope: Envelope| {
            if let Some(dispatcher) = dispatcher.upgrade() {
                if dispatcher.epoch.load(Ordering::SeqCst) == epoch {
                    dispatcher.dispatch(&envelope);
                }
            }
        })
    }

    fn dispatch(&self, envelope: &Envelope) {
        // Unknown kinds are dropped without a trace.
        let handlers: Vec<ErasedHandler> = {
            let registry = self.registry.lock();
            match registry.handlers.get(&envelope.kind) {
                Some(registrations) => registrations.iter().map(|r| r.handler.clone()).collect(),
                None => return,
            }
        };

        tracing::trace!(
            channel = %self.config.name,
            kind = %envelope.kind,
            handlers = handlers.len(),
            "dispatching envelope"
        );

        for handler in &handlers {
            if !self.config.isolate_handler_panics {
                handler(envelope);
                continue;
            }
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| handler(envelope))) {
                tracing::error!(
                    channel = %self.config.name,
                    kind = %envelope.kind,
                    panic = panic_message(panic.as_ref()),
                    "message handler panicked"
                );
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

enum ListenState {
    NotListening,
    /// Registrations are being made with the state lock released
    Starting,
    Listening(Vec<Subscription>),
}

/// A typed channel over one or more transports.
///
/// `In` is the set of kinds the channel can receive, `Out` the set it can
/// emit. The channel starts listening as soon as it is built and stops when
/// it is dropped.
pub struct TypedChannel<In: MessageSet, Out: MessageSet = In> {
    transports: Vec<Arc<dyn Transport>>,
    dispatcher: Arc<Dispatcher>,
    state: Mutex<ListenState>,
    _phantom: PhantomData<fn() -> (In, Out)>,
}

impl<In: MessageSet, Out: MessageSet> TypedChannel<In, Out> {
    /// Create a channel over a single transport
    pub fn new(transport: impl Transport + 'static) -> Result<Self> {
        Self::with_transports(vec![Arc::new(transport)])
    }

    /// Create a channel over an ordered set of transports (possibly empty)
    pub fn with_transports(transports: Vec<Arc<dyn Transport>>) -> Result<Self> {
        Self::with_config(transports, ChannelConfig::default())
    }

    pub fn with_config(transports: Vec<Arc<dyn Transport>>, config: ChannelConfig) -> Result<Self> {
        let channel = Self {
            transports,
            dispatcher: Arc::new(Dispatcher {
                registry: Mutex::new(Registry::default()),
                epoch: AtomicU64::new(0),
                config,
            }),
            state: Mutex::new(ListenState::NotListening),
            _phantom: PhantomData,
        };
        channel.listen()?;
        Ok(channel)
    }

    /// Register the channel's dispatcher once on every transport.
    ///
    /// No-op while already listening or while another `listen` is in
    /// progress. Registration is all-or-nothing: if a transport refuses, the
    /// registrations made so far are released. Transports are called with no
    /// channel lock held, so a transport may deliver from inside `receive`.
    pub fn listen(&self) -> Result<()> {
        let epoch = {
            let mut state = self.state.lock();
            if !matches!(*state, ListenState::NotListening) {
                return Ok(());
            }
            *state = ListenState::Starting;
            self.dispatcher.epoch.fetch_add(1, Ordering::SeqCst) + 1
        };

        let mut subscriptions = Vec::with_capacity(self.transports.len());
        for transport in &self.transports {
            let handler = Dispatcher::envelope_handler(&self.dispatcher, epoch);
            match transport.receive(handler) {
                Ok(subscription) => subscriptions.push(subscription),
                Err(source) => {
                    {
                        let mut state = self.state.lock();
                        if self.owns_startup(&state, epoch) {
                            *state = ListenState::NotListening;
                            self.dispatcher.epoch.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    for subscription in &subscriptions {
                        subscription.release();
                    }
                    return Err(ChannelError::Listen {
                        transport: transport.name().to_string(),
                        source,
                    });
                }
            }
        }

        {
            let mut state = self.state.lock();
            // `unlisten` during startup cancels it.
            if self.owns_startup(&state, epoch) {
                *state = ListenState::Listening(subscriptions);
                tracing::debug!(
                    channel = %self.dispatcher.config.name,
                    transports = self.transports.len(),
                    "listening"
                );
                return Ok(());
            }
        }

        for subscription in &subscriptions {
            subscription.release();
        }
        tracing::debug!(channel = %self.dispatcher.config.name, "listen cancelled");
        Ok(())
    }

    /// Whether the startup at `epoch` is still the one in progress
    fn owns_startup(&self, state: &ListenState, epoch: u64) -> bool {
        matches!(state, ListenState::Starting)
            && self.dispatcher.epoch.load(Ordering::SeqCst) == epoch
    }

    /// Release every transport registration. No-op while not listening.
    pub fn unlisten(&self) {
        let subscriptions = {
            let mut state = self.state.lock();
            let previous = std::mem::replace(&mut *state, ListenState::NotListening);
            if matches!(previous, ListenState::NotListening) {
                return;
            }
            self.dispatcher.epoch.fetch_add(1, Ordering::SeqCst);
            match previous {
                ListenState::Listening(subscriptions) => subscriptions,
                _ => Vec::new(),
            }
        };

        for subscription in &subscriptions {
            subscription.release();
        }
        tracing::debug!(channel = %self.dispatcher.config.name, "stopped listening");
    }

    pub fn is_listening(&self) -> bool {
        matches!(*self.state.lock(), ListenState::Listening(_))
    }

    /// Send a message of kind `K` through every transport.
    pub fn emit<K>(&self, _kind: K, payload: K::Payload) -> Result<()>
    where
        K: MessageKind,
        Out: Carries<K>,
    {
        let envelope = Envelope::typed::<K>(&payload)?;
        self.emit_envelope(envelope)
    }

    /// Send a prepared envelope through every transport, in order.
    pub fn emit_envelope(&self, envelope: Envelope) -> Result<()> {
        let config = &self.dispatcher.config;
        let total = self.transports.len();
        let mut failed = 0;
        let mut first_error: Option<TransportError> = None;

        tracing::trace!(channel = %config.name, kind = %envelope.kind, transports = total, "emitting");

        for transport in &self.transports {
            let Err(err) = transport.send(&envelope) else {
                continue;
            };
            tracing::warn!(
                channel = %config.name,
                transport = transport.name(),
                kind = %envelope.kind,
                error = %err,
                "transport send failed"
            );
            failed += 1;
            first_error.get_or_insert(err);
            if !config.continue_on_send_error {
                break;
            }
        }

        match first_error {
            Some(source) => Err(ChannelError::Send {
                failed,
                total,
                source,
            }),
            None => Ok(()),
        }
    }

    /// Register `handler` for inbound messages of kind `K`.
    ///
    /// Every call adds a separate registration; the returned subscription
    /// removes only this one.
    pub fn on<K, F>(&self, _kind: K, handler: F) -> Subscription
    where
        K: MessageKind,
        In: Carries<K>,
        F: Fn(K::Payload) + Send + Sync + 'static,
    {
        let channel = self.dispatcher.config.name.clone();
        let erased: ErasedHandler =
            Arc::new(
                move |envelope: &Envelope| match envelope.decode_payload::<K::Payload>() {
                    Ok(payload) => handler(payload),
                    Err(err) => tracing::warn!(
                        channel = %channel,
                        kind = K::TYPE,
                        error = %err,
                        "payload does not match message kind, handler skipped"
                    ),
                },
            );
        self.subscribe(K::TYPE, erased)
    }

    /// Register an untyped handler for the given wire `type`.
    pub fn on_envelope(
        &self,
        kind: impl AsRef<str>,
        handler: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe(kind.as_ref(), Arc::new(handler))
    }

    fn subscribe(&self, kind: &str, handler: ErasedHandler) -> Subscription {
        let id = self.dispatcher.register(kind, handler);
        let dispatcher = Arc::downgrade(&self.dispatcher);
        let kind = kind.to_string();
        Subscription::new(move || {
            if let Some(dispatcher) = dispatcher.upgrade() {
                dispatcher.unregister(&kind, id);
            }
        })
    }

    /// Handlers currently registered for a wire `type`
    pub fn handler_count(&self, kind: &str) -> usize {
        self.dispatcher
            .registry
            .lock()
            .handlers
            .get(kind)
            .map_or(0, Vec::len)
    }

    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }

    pub fn transports(&self) -> &[Arc<dyn Transport>] {
        &self.transports
    }

    /// Statistics of all transports that report them, merged
    pub fn stats(&self) -> TransportStats {
        let mut total = TransportStats::new();
        for stats in self.transports.iter().filter_map(|t| t.stats()) {
            total.merge(&stats);
        }
        total
    }

    pub fn name(&self) -> &str {
        &self.dispatcher.config.name
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.dispatcher.config
    }
}

impl<In: MessageSet, Out: MessageSet> Drop for TypedChannel<In, Out> {
    fn drop(&mut self) {
        self.unlisten();
    }
}

impl<In: MessageSet, Out: MessageSet> std::fmt::Debug for TypedChannel<In, Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedChannel")
            .field("name", &self.dispatcher.config.name)
            .field("transports", &self.transports)
            .field("listening", &self.is_listening())
            .finish()
    }
}
