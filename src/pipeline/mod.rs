//! Email-driven reconciliation pipeline.
//!
//! Poll driver → claim ledger → classifier (with context) → schema
//! validator → reconciler → store.

pub mod claims;
pub mod classifier;
pub mod context;
pub mod poller;
pub mod reconciler;
pub mod schema;
pub mod types;

pub use claims::ClaimLedger;
pub use classifier::Classifier;
pub use poller::{PollDriver, PollReport, PollSettings, spawn_poll_scheduler};
pub use reconciler::{Reconciler, Reconciliation};
pub use schema::{DecisionValidator, Violation, ViolationKind};
pub use types::{Action, Decision, InboundEmail, JobContext};
