//! Session controller binding one transport, one router and a set of push plans.
//!
//! Push plans are not constructed until the content surface sends the ready
//! handshake. A repeated handshake is a no-op. [`BridgeController::teardown`]
//! returns the controller to its pre-handshake state so it can serve another
//! session on the same transport.

use crate::config::BridgeConfig;
use crate::error::envelope::EnvelopeError;
use crate::error::handler::HandlerError;
use crate::error::push::PushError;
use crate::push::{
    HealthMonitor, HealthReport, LedgerStats, PlanSpec, PushLedger, PushPlan, PushTransport,
};
use crate::router::{CommandRouter, DispatchOutcome};

use common::wire::AckFrame;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, watch};

pub struct BridgeController<S, T> {
    router: CommandRouter,
    ledger: PushLedger<T>,
    specs: Vec<PlanSpec<S>>,
    plans: Mutex<Vec<PushPlan<S, T>>>,
    is_bridge_ready: AtomicBool,
    /// Serializes inbound dispatch per session.
    inbound: Mutex<()>,
}

impl<S, T> BridgeController<S, T>
where
    S: Send + Sync + 'static,
    T: PushTransport,
{
    pub fn builder(config: &BridgeConfig, transport: Arc<T>) -> BridgeControllerBuilder<S, T> {
        let health = HealthMonitor::new(config.push.health_failure_threshold);
        BridgeControllerBuilder {
            router: CommandRouter::new(&config.router),
            ledger: PushLedger::new(transport, health, config.push.ledger_queue),
            specs: Vec::new(),
        }
    }

    pub fn is_bridge_ready(&self) -> bool {
        self.is_bridge_ready.load(Ordering::SeqCst)
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    pub fn health(&self) -> HealthReport {
        self.ledger.health().current()
    }

    pub fn subscribe_health(&self) -> watch::Receiver<HealthReport> {
        self.ledger.health().subscribe()
    }

    pub async fn ledger_stats(&self) -> Result<LedgerStats, PushError> {
        self.ledger.stats().await
    }

    /// Generations of the currently constructed plans, in declaration order.
    pub async fn plan_generations(&self) -> Vec<u64> {
        self.plans
            .lock()
            .await
            .iter()
            .map(PushPlan::generation)
            .collect()
    }

    /// Dispatch one inbound message and send its ack and response.
    ///
    /// Messages are processed one at a time per controller.
    pub async fn handle_inbound(&self, raw: &str) -> DispatchOutcome {
        let _turn = self.inbound.lock().await;

        let outcome = self.router.dispatch(raw).await;

        if let Some(ack) = &outcome.ack {
            self.send_frame(&AckFrame { ack: ack.clone() }).await;
        }
        if let Some(response) = &outcome.response {
            self.send_frame(response).await;
        }
        if outcome.handshake {
            self.mark_ready().await;
        }

        outcome
    }

    /// Stop every plan, clear the content-dedup cache and re-arm the handshake.
    pub async fn teardown(&self) {
        let mut plans = self.plans.lock().await;
        for plan in plans.iter_mut() {
            if let Err(e) = plan.stop().await {
                error!("Failed to stop push plan '{}': {}", plan.name(), e);
            }
        }
        plans.clear();
        drop(plans);

        if let Err(e) = self.ledger.clear_dedup().await {
            error!("Failed to clear push dedup cache: {}", e);
        }

        self.router.close_gate();
        if self.is_bridge_ready.swap(false, Ordering::SeqCst) {
            info!("Bridge session torn down");
        }
    }

    async fn mark_ready(&self) {
        if self.is_bridge_ready.swap(true, Ordering::SeqCst) {
            debug!("Repeated ready handshake ignored");
            return;
        }

        let mut plans = self.plans.lock().await;
        for spec in &self.specs {
            let mut plan = PushPlan::new(spec.clone(), self.ledger.clone());
            plan.start();
            plans.push(plan);
        }
        info!("Bridge ready: started {} push plans", plans.len());
    }

    async fn send_frame(&self, frame: &impl Serialize) {
        let bytes = match serde_json::to_vec(frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode outbound frame: {}", e);
                return;
            }
        };

        if let Err(e) = self.ledger.send_message(bytes).await {
            error!("Failed to queue outbound frame: {}", e);
        }
    }
}

pub struct BridgeControllerBuilder<S, T> {
    router: CommandRouter,
    ledger: PushLedger<T>,
    specs: Vec<PlanSpec<S>>,
}

impl<S, T> BridgeControllerBuilder<S, T>
where
    S: Send + Sync + 'static,
    T: PushTransport,
{
    pub fn plan(mut self, spec: PlanSpec<S>) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn handler<P, R, F, Fut>(mut self, method: &str, handler: F) -> Self
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        self.router.register(method, handler);
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&EnvelopeError) + Send + Sync + 'static) -> Self {
        self.router.set_error_callback(Arc::new(callback));
        self
    }

    pub fn build(self) -> BridgeController<S, T> {
        BridgeController {
            router: self.router,
            ledger: self.ledger,
            specs: self.specs,
            plans: Mutex::new(Vec::new()),
            is_bridge_ready: AtomicBool::new(false),
            inbound: Mutex::new(()),
        }
    }
}
