//! Rust and Python-facing client library for the Folketinget Open Data API
//! (ODA), the OData service behind <https://oda.ft.dk/api>.
//!
//! Public API layers:
//! - [`ApiClient`]/[`BlockingApiClient`]: generic JSON HTTP clients.
//! - [`OdaClient`]/[`BlockingOdaClient`]: operation-id and typed entity clients.
//! - [`model`]: generated entity types and the OData envelopes.
//! - [`catalog`]: the entity set and operation registry.
//! - [`sync::UpdatedSince`]: incremental paging by update timestamp.
//! - [`ClientError`]: unified error type used by all clients.
//!
//! The catalog and the entity types are generated at build time from
//! `metadata/oda.json`.

mod blocking_client;
pub mod catalog;
mod client;
mod error;
pub mod model;
mod oda_client;
mod query;
pub mod sync;
pub mod transform;

/// Generic blocking JSON REST client.
pub use blocking_client::BlockingApiClient;
pub use catalog::{
    EntitySetDefinition, OperationDefinition, OperationKind, oda_default_server_url,
};
/// Generic async JSON REST client.
pub use client::ApiClient;
/// Error type returned by all client operations.
pub use error::ClientError;
pub use model::{Collection, Entity};
/// Operation-id and typed ODA clients.
///
/// [`OdaClient`] is async; [`BlockingOdaClient`] mirrors it synchronously.
pub use oda_client::{BlockingOdaClient, OdaClient};
pub use query::{QueryOptions, QueryParameter};

#[cfg(feature = "python")]
mod python;
