//! Registry clients, the I/O boundary towards external carbon registries.
//!
//! Each registry is reached through a [`RegistryClient`]. A client never
//! fails its caller: a credit the registry does not know is
//! [`QueryOutcome::NotFound`](carbon_types::QueryOutcome::NotFound), and any
//! transport or parse problem is folded into
//! [`QueryOutcome::Failure`](carbon_types::QueryOutcome::Failure).
//!
//! Design:
//! - Credits are translated to registry serial numbers by a [`KeyMapper`];
//!   credits missing from its table still get a derived key
//! - [`HttpRegistryClient`] speaks `GET {endpoint}/credits/{key}` → JSON record
//! - [`StaticRegistryClient`] serves a configured in-memory table
//! - [`RegistrySet`] fixes which registries are queried, and in which order

pub mod client;
pub mod error;
pub mod fixed;
pub mod http;
pub mod keys;
pub mod registry;

pub use client::RegistryClient;
pub use error::RegistryError;
pub use fixed::StaticRegistryClient;
pub use http::{HttpRegistryClient, HttpRegistryConfig};
pub use keys::KeyMapper;
pub use registry::RegistrySet;
