//! In-memory document store for casebook records.
//!
//! `MemoryStore` implements both `RemoteStore` and `PushSource`, so it can
//! back an `OptimisticController` and feed `LiveView`s. It adds simulated
//! latency, server-side timestamps, failure injection and write holds for
//! exercising the save path without a network.

pub mod config;
pub mod memory;
pub mod seed;

pub use config::MemoryStoreConfig;
pub use memory::{MemoryStore, WriteGate};
pub use seed::SeedError;
