//! Push plans: one watcher task per installed slice.
//!
//! A plan moves `Created -> Running -> Stopped` and may be restarted. Every
//! `start` bumps the plan's generation; watchers carry the generation they
//! were spawned with and the ledger drops anything whose generation is no
//! longer current.

use crate::error::push::PushError;
use crate::push::ledger::{Emission, PlanGate, PushLedger};
use crate::push::slice::{Sampler, SliceSource};
use crate::push::state_root::StateRoot;
use crate::push::transport::PushTransport;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

/// Reads the domain epoch from the state being sampled.
pub type EpochFn<S> = Arc<dyn Fn(&S) -> u64 + Send + Sync>;

/// Declarative description of a plan: a state root and the slices watching it.
pub struct PlanSpec<S> {
    name: Arc<str>,
    state: Arc<StateRoot<S>>,
    slices: Vec<Arc<dyn SliceSource<S>>>,
    epoch: EpochFn<S>,
}

impl<S> Clone for PlanSpec<S> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            state: Arc::clone(&self.state),
            slices: self.slices.clone(),
            epoch: Arc::clone(&self.epoch),
        }
    }
}

impl<S> PlanSpec<S>
where
    S: Send + Sync + 'static,
{
    pub fn builder(name: &str, state: Arc<StateRoot<S>>) -> PlanSpecBuilder<S> {
        PlanSpecBuilder {
            spec: PlanSpec {
                name: Arc::from(name),
                state,
                slices: Vec::new(),
                epoch: Arc::new(|_| 0),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub struct PlanSpecBuilder<S> {
    spec: PlanSpec<S>,
}

impl<S> PlanSpecBuilder<S>
where
    S: Send + Sync + 'static,
{
    pub fn slice(mut self, slice: impl SliceSource<S> + 'static) -> Self {
        self.spec.slices.push(Arc::new(slice));
        self
    }

    pub fn epoch(mut self, epoch: impl Fn(&S) -> u64 + Send + Sync + 'static) -> Self {
        self.spec.epoch = Arc::new(epoch);
        self
    }

    pub fn build(self) -> PlanSpec<S> {
        self.spec
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    Created,
    Running,
    Stopped,
}

pub struct PushPlan<S, T> {
    spec: PlanSpec<S>,
    ledger: PushLedger<T>,
    gate: Arc<PlanGate>,
    tasks: Vec<JoinHandle<()>>,
    state: PlanState,
}

impl<S, T> PushPlan<S, T>
where
    S: Send + Sync + 'static,
    T: PushTransport,
{
    pub fn new(spec: PlanSpec<S>, ledger: PushLedger<T>) -> Self {
        Self {
            spec,
            ledger,
            gate: Arc::new(PlanGate::new()),
            tasks: Vec::new(),
            state: PlanState::Created,
        }
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn state(&self) -> PlanState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.gate.generation()
    }

    /// Start a new generation, spawning one watcher per slice.
    ///
    /// Starting a running plan supersedes the current generation. Must be
    /// called from within a tokio runtime.
    pub fn start(&mut self) -> u64 {
        self.abort_tasks();

        let generation = self.gate.advance();
        for slice in &self.spec.slices {
            let watcher = Watcher {
                source: Arc::clone(slice),
                state: Arc::clone(&self.spec.state),
                epoch: Arc::clone(&self.spec.epoch),
                ledger: self.ledger.clone(),
                gate: Arc::clone(&self.gate),
                generation,
            };
            self.tasks.push(tokio::spawn(watcher.run()));
        }

        self.state = PlanState::Running;
        info!(
            "Push plan '{}' started: generation {}, {} slices",
            self.spec.name,
            generation,
            self.spec.slices.len()
        );
        generation
    }

    /// Stop the plan.
    ///
    /// Once this returns, no push from the stopped generation reaches the
    /// transport: the gate is closed first, then the ledger is flushed so any
    /// emission already queued is processed (and rejected) before returning.
    pub async fn stop(&mut self) -> Result<(), PushError> {
        self.gate.halt();
        self.abort_tasks();

        if self.state == PlanState::Running {
            info!(
                "Push plan '{}' stopped at generation {}",
                self.spec.name,
                self.gate.generation()
            );
        }
        self.state = PlanState::Stopped;

        self.ledger.flush().await
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl<S, T> Drop for PushPlan<S, T> {
    fn drop(&mut self) {
        self.gate.halt();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

struct Watcher<S, T> {
    source: Arc<dyn SliceSource<S>>,
    state: Arc<StateRoot<S>>,
    epoch: EpochFn<S>,
    ledger: PushLedger<T>,
    gate: Arc<PlanGate>,
    generation: u64,
}

impl<S, T> Watcher<S, T>
where
    S: Send + Sync + 'static,
    T: PushTransport,
{
    async fn run(self) {
        // Subscribe before the initial sample so no mutation slips between them.
        let mut changes = self.state.subscribe();
        let mut sampler = self.source.sampler();
        let debounce = self.source.meta().level.debounce();

        self.sample_and_emit(sampler.as_mut()).await;

        loop {
            if matches!(changes.recv().await, Err(RecvError::Closed)) {
                break;
            }

            if !debounce.is_zero() {
                settle(&mut changes, debounce).await;
            }

            if !self.gate.admits(self.generation) {
                break;
            }

            self.sample_and_emit(sampler.as_mut()).await;
        }

        debug!(
            "Watcher for slice '{}' exiting (generation {})",
            self.source.meta().name,
            self.generation
        );
    }

    async fn sample_and_emit(&self, sampler: &mut dyn Sampler<S>) {
        let (sampled, epoch) = self
            .state
            .read(|state| (sampler.sample(state), (self.epoch)(state)))
            .await;

        let meta = self.source.meta();
        let payload = match sampled {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                trace!("Slice '{}' produced no changes", meta.name);
                return;
            }
            Err(e) => {
                error!("Failed to sample slice '{}': {}", meta.name, e);
                self.ledger.health().record_failure(&e);
                return;
            }
        };

        let emission = Emission {
            gate: Arc::clone(&self.gate),
            generation: self.generation,
            slice: Arc::clone(&meta.name),
            store: meta.store,
            op: meta.op,
            level: meta.level,
            epoch,
            payload,
        };

        if let Err(e) = self.ledger.emit(emission).await {
            error!("Failed to queue push for slice '{}': {}", meta.name, e);
            self.ledger.health().record_failure(&e);
        }
    }
}

/// Trailing-edge debounce: returns once `window` passes without a new change.
async fn settle(changes: &mut broadcast::Receiver<u64>, window: Duration) {
    let timer = sleep(window);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            _ = &mut timer => return,
            received = changes.recv() => match received {
                Ok(_) | Err(RecvError::Lagged(_)) => {
                    timer.as_mut().reset(Instant::now() + window);
                }
                Err(RecvError::Closed) => return,
            },
        }
    }
}
