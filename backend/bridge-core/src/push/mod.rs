//! Outbound push pipeline (native state → content surface).
//!
//! - [`StateRoot`]: observable state with an explicit change channel
//! - [`Slice`] / [`EntitySlice`]: what to capture from the state
//! - [`PushPlan`]: watcher tasks with debounce and generation tagging
//! - [`PushLedger`]: single-writer actor owning revisions, dedup and the transport
//! - [`PushTransport`]: the sink supplied by the surface integration

pub mod clock;
pub mod dedup;
pub mod entity_slice;
pub mod health;
pub mod ledger;
pub mod plan;
pub mod slice;
pub mod state_root;
pub mod transport;

pub use clock::RevisionClock;
pub use dedup::ContentDedup;
pub use entity_slice::{EntitySlice, EntityTracker};
pub use health::{ConnectionHealth, HealthMonitor, HealthReport};
pub use ledger::{Emission, LedgerStats, PlanGate, PushLedger};
pub use plan::{EpochFn, PlanSpec, PlanSpecBuilder, PlanState, PushPlan};
pub use slice::{Sampler, Slice, SliceMeta, SliceSource};
pub use state_root::StateRoot;
pub use transport::{ChannelTransport, OutboundFrame, PushFrame, PushTransport};
