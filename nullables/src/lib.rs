//! Nullable infrastructure for deterministic testing.
//!
//! The coordinator only talks to the outside world through
//! [`RegistryClient`](carbon_registry::RegistryClient) and
//! [`VerdictPublisher`](carbon_publisher::VerdictPublisher). This crate
//! provides test-friendly implementations of both that:
//! - Return scripted values
//! - Count every call so tests can assert on fan-out
//! - Can be held, slowed down or made to fail on demand
//! - Never touch the network

pub mod publisher;
pub mod registry;

pub use publisher::NullLedger;
pub use registry::ScriptedRegistry;
