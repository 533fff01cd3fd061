//! Control-plane core of the iteration orchestrator: converts a prompt
//! into a file-level diff, snapshots a version, runs a sandboxed build
//! with a bounded auto-repair loop, debits a credit ledger atomically,
//! and keeps an append-only audit trail.
//!
//! Modules are organized leaf-first: [`ledger`], [`rate_limit`], and
//! [`sanitize`] stand alone; [`diff`] and [`repair`] operate on file
//! snapshots; [`store`] is the persistence seam; [`orchestrator`]
//! composes all of the above into the per-iteration state machine.

pub mod config;
pub mod diff;
pub mod error;
pub mod ledger;
pub mod models;
pub mod orchestrator;
pub mod rate_limit;
pub mod repair;
pub mod runner_client;
pub mod sanitize;
pub mod store;

pub use config::Config;
pub use error::{OrchestratorError, Result};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
