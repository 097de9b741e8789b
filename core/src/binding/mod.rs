// Block data binding
//
// Ties one block's descriptor to a refresh scheduler and an observable state.
// Every activation carries a liveness flag; results from calls dispatched by a
// retired activation are dropped under the same lock that publishes state.

mod scheduler;
mod state;

pub use scheduler::RefreshScheduler;
pub use state::BindingState;

use crate::source::{DataSourceDescriptor, Resolver};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Liveness of one start/stop cycle
struct Activation {
    live: AtomicBool,
    /// Set once a resolve fails in a way the next tick cannot fix
    halted: AtomicBool,
}

/// State publisher shared by the binding and its in-flight resolve tasks
struct StateCell {
    tx: watch::Sender<BindingState>,
}

impl StateCell {
    /// Mutate and publish, unless the activation was retired.
    fn apply_if_live(&self, activation: &Activation, f: impl FnOnce(&mut BindingState)) -> bool {
        self.tx.send_if_modified(|state| {
            if !activation.live.load(Ordering::SeqCst) {
                return false;
            }
            f(state);
            true
        })
    }

    /// Retire an activation while holding the state lock.
    ///
    /// Once this returns, no call dispatched under `activation` can publish.
    fn retire(&self, activation: &Activation) {
        self.tx.send_if_modified(|_| {
            activation.live.store(false, Ordering::SeqCst);
            false
        });
    }

    fn reset(&self) {
        self.tx.send_if_modified(|state| {
            let changed = !state.is_idle();
            *state = BindingState::Idle;
            changed
        });
    }
}

/// Runtime binding of one block to its data source
pub struct BlockBinding {
    block_id: String,
    descriptor: Option<Arc<DataSourceDescriptor>>,
    resolver: Arc<dyn Resolver>,
    cell: Arc<StateCell>,
    activation: Option<Arc<Activation>>,
    scheduler: Option<RefreshScheduler>,
    dispatched: Arc<AtomicU64>,
}

impl BlockBinding {
    /// Create an inert binding; nothing is fetched until [`start`](Self::start).
    pub fn new(
        block_id: impl Into<String>,
        descriptor: Option<DataSourceDescriptor>,
        resolver: Arc<dyn Resolver>,
    ) -> Self {
        let (tx, _) = watch::channel(BindingState::Idle);
        Self {
            block_id: block_id.into(),
            descriptor: descriptor.map(Arc::new),
            resolver,
            cell: Arc::new(StateCell { tx }),
            activation: None,
            scheduler: None,
            dispatched: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn block_id(&self) -> &str {
        &self.block_id
    }

    pub fn descriptor(&self) -> Option<&DataSourceDescriptor> {
        self.descriptor.as_deref()
    }

    /// Current state snapshot
    pub fn state(&self) -> BindingState {
        self.cell.tx.borrow().clone()
    }

    /// Watch handle for the owning block; survives descriptor replacement.
    pub fn subscribe(&self) -> watch::Receiver<BindingState> {
        self.cell.tx.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.activation.is_some()
    }

    /// Number of resolve calls dispatched over the binding's lifetime.
    pub fn dispatched_calls(&self) -> u64 {
        self.dispatched.load(Ordering::SeqCst)
    }

    /// Begin fetching: one immediate resolve, then one per refresh interval.
    ///
    /// A configuration failure stops further refreshes for this activation;
    /// transport and upstream failures are retried on the next tick.
    /// Without a descriptor the binding stays idle. Calling `start` on an
    /// active binding is a no-op.
    pub fn start(&mut self) {
        if self.activation.is_some() {
            return;
        }
        let Some(descriptor) = self.descriptor.clone() else {
            debug!(target: "binding", block = %self.block_id, "No data source bound; staying idle");
            return;
        };

        let activation = Arc::new(Activation {
            live: AtomicBool::new(true),
            halted: AtomicBool::new(false),
        });
        let period = descriptor.refresh_interval();
        debug!(
            target: "binding",
            block = %self.block_id,
            kind = ?descriptor.kind,
            refresh_secs = descriptor.refresh_interval_seconds.unwrap_or(0),
            "Starting binding"
        );

        let dispatch = {
            let block_id = self.block_id.clone();
            let cell = self.cell.clone();
            let resolver = self.resolver.clone();
            let activation = activation.clone();
            let dispatched = self.dispatched.clone();
            move || {
                if activation.halted.load(Ordering::SeqCst) {
                    return false;
                }
                if !cell.apply_if_live(&activation, BindingState::begin_loading) {
                    return false;
                }
                dispatched.fetch_add(1, Ordering::SeqCst);

                let block_id = block_id.clone();
                let cell = cell.clone();
                let resolver = resolver.clone();
                let activation = activation.clone();
                let descriptor = descriptor.clone();
                tokio::spawn(async move {
                    let outcome = resolver.resolve(&descriptor).await;
                    if let Err(e) = &outcome {
                        warn!(target: "binding", block = %block_id, error = %e, "Resolve failed");
                        if !e.is_transient() {
                            activation.halted.store(true, Ordering::SeqCst);
                            debug!(target: "binding", block = %block_id, "Refresh halted until the data source changes");
                        }
                    }
                    if !cell.apply_if_live(&activation, |state| state.settle(outcome)) {
                        debug!(target: "binding", block = %block_id, "Dropping result of retired activation");
                    }
                });
                true
            }
        };

        self.activation = Some(activation);
        self.scheduler = Some(RefreshScheduler::start(period, dispatch));
    }

    /// Cancel the timer and ignore any result still in flight.
    ///
    /// The visible state stays whatever it was at the moment of the call.
    pub fn stop(&mut self) {
        if let Some(activation) = self.activation.take() {
            self.cell.retire(&activation);
            debug!(target: "binding", block = %self.block_id, "Binding stopped");
        }
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
    }

    /// Swap the bound descriptor.
    ///
    /// An equal descriptor changes nothing. Otherwise the current activation
    /// is torn down, the state resets to idle and, if the binding was active,
    /// a new activation starts for the new descriptor. Returns whether
    /// anything changed.
    pub fn replace_descriptor(&mut self, descriptor: Option<DataSourceDescriptor>) -> bool {
        if self.descriptor.as_deref() == descriptor.as_ref() {
            return false;
        }
        let was_active = self.is_active();
        self.stop();
        self.cell.reset();
        self.descriptor = descriptor.map(Arc::new);
        if was_active {
            self.start();
        }
        true
    }
}

impl Drop for BlockBinding {
    fn drop(&mut self) {
        self.stop();
    }
}
