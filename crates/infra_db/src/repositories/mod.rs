//! Repository implementations backing the domain ports

pub mod directory;
pub mod ledger;

pub use directory::PostgresStoreDirectory;
pub use ledger::PostgresLedgerStore;
