//! Push ledger actor.
//!
//! The ledger is the single writer for everything the push watchers share:
//! revision counters, the content-dedup cache, and the transport itself.
//!
//! # Architecture
//!
//! - Watchers send [`Emission`]s through an mpsc channel
//! - A dedicated task processes commands one at a time
//! - The generation gate is checked right before the transport call, inside
//!   the actor, so a plan that was stopped or restarted can never deliver a
//!   stale payload even if its watcher was mid-flight
//!
//! A `Flush` command is answered only after every command queued before it
//! has been fully processed, which is what `PushPlan::stop` relies on.

use crate::error::push::PushError;
use crate::push::clock::RevisionClock;
use crate::push::dedup::ContentDedup;
use crate::push::health::HealthMonitor;
use crate::push::transport::{PushFrame, PushTransport};

use common::ErrorLocation;
use common::wire::{PUSH_ENVELOPE_VERSION, PushEnvelope, PushLevel, PushOp, StoreKey};

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::{debug, error, info, trace, warn};
use serde_json::value::RawValue;
use tokio::sync::{Mutex, mpsc, oneshot};
use uuid::Uuid;

/// Generation gate shared between a plan, its watchers and the ledger.
#[derive(Debug, Default)]
pub struct PlanGate {
    generation: AtomicU64,
    running: AtomicBool,
}

impl PlanGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump the generation and mark the plan running. Returns the new generation.
    pub(crate) fn advance(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.running.store(true, Ordering::SeqCst);
        generation
    }

    pub(crate) fn halt(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether an emission tagged with `generation` may still be delivered.
    pub fn admits(&self, generation: u64) -> bool {
        self.is_running() && self.generation() == generation
    }
}

/// A sampled payload on its way to the transport.
pub struct Emission {
    pub gate: Arc<PlanGate>,
    pub generation: u64,
    pub slice: Arc<str>,
    pub store: StoreKey,
    pub op: PushOp,
    pub level: PushLevel,
    pub epoch: u64,
    pub payload: Box<RawValue>,
}

/// Counters kept by the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub delivered: u64,
    pub deduplicated: u64,
    pub stale: u64,
    pub failed: u64,
}

enum LedgerCommand {
    Emit(Emission),
    Message(Vec<u8>),
    Flush(oneshot::Sender<()>),
    ClearDedup(oneshot::Sender<()>),
    Stats(oneshot::Sender<LedgerStats>),
    Revision(StoreKey, oneshot::Sender<u64>),
}

/// Handle to the ledger actor. Clones share the same actor.
///
/// The actor is spawned lazily on first use, so a ledger can be created
/// outside a tokio runtime.
pub struct PushLedger<T> {
    command_tx: Arc<Mutex<Option<mpsc::Sender<LedgerCommand>>>>,
    transport: Arc<T>,
    health: HealthMonitor,
    queue_size: usize,
}

impl<T> Clone for PushLedger<T> {
    fn clone(&self) -> Self {
        Self {
            command_tx: Arc::clone(&self.command_tx),
            transport: Arc::clone(&self.transport),
            health: self.health.clone(),
            queue_size: self.queue_size,
        }
    }
}

impl<T> PushLedger<T>
where
    T: PushTransport,
{
    pub fn new(transport: Arc<T>, health: HealthMonitor, queue_size: usize) -> Self {
        Self {
            command_tx: Arc::new(Mutex::new(None)),
            transport,
            health,
            queue_size: queue_size.max(1),
        }
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Queue a sampled payload for delivery.
    pub async fn emit(&self, emission: Emission) -> Result<(), PushError> {
        self.send(LedgerCommand::Emit(emission)).await
    }

    /// Queue a non-push frame (ack or response) behind any pending pushes.
    pub async fn send_message(&self, bytes: Vec<u8>) -> Result<(), PushError> {
        self.send(LedgerCommand::Message(bytes)).await
    }

    /// Wait until every command queued so far has been processed.
    pub async fn flush(&self) -> Result<(), PushError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LedgerCommand::Flush(reply_tx)).await?;
        reply_rx.await.map_err(|e| PushError::Ledger {
            message: format!("Ledger dropped flush reply: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Forget every cached payload so the next push on each channel is delivered.
    pub async fn clear_dedup(&self) -> Result<(), PushError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LedgerCommand::ClearDedup(reply_tx)).await?;
        reply_rx.await.map_err(|e| PushError::Ledger {
            message: format!("Ledger dropped clear reply: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    pub async fn stats(&self) -> Result<LedgerStats, PushError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LedgerCommand::Stats(reply_tx)).await?;
        reply_rx.await.map_err(|e| PushError::Ledger {
            message: format!("Ledger dropped stats reply: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Last revision handed out for `store`.
    pub async fn current_revision(&self, store: StoreKey) -> Result<u64, PushError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LedgerCommand::Revision(store, reply_tx)).await?;
        reply_rx.await.map_err(|e| PushError::Ledger {
            message: format!("Ledger dropped revision reply: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    async fn send(&self, command: LedgerCommand) -> Result<(), PushError> {
        let tx = self.ensure_actor().await;

        tx.send(command).await.map_err(|e| PushError::Ledger {
            message: format!("Ledger actor died: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    async fn ensure_actor(&self) -> mpsc::Sender<LedgerCommand> {
        let mut tx_guard = self.command_tx.lock().await;
        if let Some(tx) = tx_guard.as_ref() {
            return tx.clone();
        }

        let (tx, rx) = mpsc::channel(self.queue_size);
        *tx_guard = Some(tx.clone());
        drop(tx_guard);

        tokio::spawn(ledger_actor(
            rx,
            Arc::clone(&self.transport),
            self.health.clone(),
        ));
        info!("Push ledger actor spawned");
        tx
    }
}

/// State owned exclusively by the actor task.
#[derive(Default)]
struct Book {
    clock: RevisionClock,
    dedup: ContentDedup,
    stats: LedgerStats,
}

async fn ledger_actor<T: PushTransport>(
    mut command_rx: mpsc::Receiver<LedgerCommand>,
    transport: Arc<T>,
    health: HealthMonitor,
) {
    let mut book = Book::default();

    while let Some(command) = command_rx.recv().await {
        match command {
            LedgerCommand::Emit(emission) => {
                deliver(&mut book, transport.as_ref(), &health, emission).await;
            }
            LedgerCommand::Message(bytes) => match transport.send_message(bytes).await {
                Ok(()) => health.record_success(),
                Err(e) => {
                    error!("Failed to send bridge message: {}", e);
                    health.record_failure(&e);
                }
            },
            LedgerCommand::Flush(reply) => {
                let _ = reply.send(());
            }
            LedgerCommand::ClearDedup(reply) => {
                debug!("Clearing {} cached push payloads", book.dedup.len());
                book.dedup.clear();
                let _ = reply.send(());
            }
            LedgerCommand::Stats(reply) => {
                let _ = reply.send(book.stats);
            }
            LedgerCommand::Revision(store, reply) => {
                let _ = reply.send(book.clock.current(store));
            }
        }
    }

    debug!("Push ledger actor stopped");
}

async fn deliver<T: PushTransport>(
    book: &mut Book,
    transport: &T,
    health: &HealthMonitor,
    emission: Emission,
) {
    if !emission.gate.admits(emission.generation) {
        book.stats.stale += 1;
        trace!(
            "Dropping stale push from slice '{}' (generation {})",
            emission.slice, emission.generation
        );
        return;
    }

    let payload = emission.payload.get().as_bytes();
    if book
        .dedup
        .is_duplicate(emission.store, emission.op, emission.epoch, payload)
    {
        book.stats.deduplicated += 1;
        trace!(
            "Skipping unchanged push on {}/{} from slice '{}'",
            emission.store, emission.op, emission.slice
        );
        return;
    }

    let revision = book.clock.next(emission.store);
    let push_id = Uuid::new_v4().to_string();
    let envelope = PushEnvelope {
        version: PUSH_ENVELOPE_VERSION,
        revision,
        epoch: emission.epoch,
        push_id: &push_id,
        store: emission.store,
        op: emission.op,
        level: emission.level,
        payload: &emission.payload,
    };

    let bytes = match envelope.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            book.stats.failed += 1;
            error!("Failed to encode push envelope for {}: {}", emission.store, e);
            health.record_failure(&e);
            return;
        }
    };

    let frame = PushFrame {
        store: emission.store,
        op: emission.op,
        level: emission.level,
        revision,
        epoch: emission.epoch,
        push_id,
        bytes,
    };

    match transport.push_json(frame).await {
        Ok(()) => {
            book.stats.delivered += 1;
            book.dedup
                .record(emission.store, emission.op, emission.epoch, payload.to_vec());
            health.record_success();
        }
        Err(e) => {
            book.stats.failed += 1;
            warn!(
                "Push on {} (revision {}) failed: {}",
                emission.store, revision, e
            );
            health.record_failure(&e);
        }
    }
}
