//! HTTP API for the verification coordinator.
//!
//! Endpoints:
//! - `POST /verify`: request verification of a credit and wait for the result
//! - `GET /credits/{id}`: current verification state
//! - `DELETE /credits/{id}/wave`: cancel the in-flight wave
//! - `GET /stats`: coordinator counters

pub mod error;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use server::{router, RpcServer};
