//! Session services for the Alexandra concierge.
//!
//! Wraps the pure rules of `alexandra-core` in stateful, durable services:
//! - `ConversationStateStore` owns the per-session phase machine (`state`)
//! - `UsageLedger` books billable events and enforces quotas (`ledger`)
//! - `TouristMemory` keeps the preference-learning log (`memory`)
//! - `RateGate` turns quota state into allow/deny (`gate`)
//! - `SessionRuntime` chains one utterance through all of them (`runtime`)
//!
//! # Concurrency
//!
//! Each service serializes read-modify-persist cycles per session id through
//! its own `SessionLocks` registry. Writes are flushed before a call returns.

pub mod gate;
pub mod ledger;
pub mod locks;
pub mod memory;
pub mod metrics;
pub mod runtime;
pub mod state;

mod storage;

pub use gate::{GateDecision, RateGate};
pub use ledger::{RecordOutcome, UsageLedger};
pub use locks::SessionLocks;
pub use memory::TouristMemory;
pub use metrics::{MetricsSnapshot, RuntimeMetrics};
pub use runtime::{
    EvictionReport, RecoveryOutcome, Repositories, RuntimeSettings, SessionRuntime, TurnOutcome,
    TurnReport, TurnRequest, UpgradeReceipt,
};
pub use state::{ConversationStateStore, ObservedUtterance};
