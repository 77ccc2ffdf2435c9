//! In-process adapters for the ledger's ports
//!
//! These back unit and scenario tests; the production PostgreSQL adapters
//! live in the `infra_db` crate.

mod memory;

pub use memory::{CapturingAlertSink, MemoryLedgerStore, ScriptedGateway};
