//! Application layer containing the transfer orchestration.
//!
//! `TransferEngine` is the entry point. It combines the per-account
//! `ConcurrencyGuard`, the store's units of work, and the `CacheLayer` that
//! serves read-only lookups.

pub mod cache;
pub mod engine;
pub mod guard;
