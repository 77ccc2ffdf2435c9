//! In-process adapters for the tenancy ports

mod memory;

pub use memory::MemoryDirectory;
