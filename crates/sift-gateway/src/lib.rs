//! HTTP surface for the Sift search service.
//!
//! Exposes `GET /health` and `POST /search` over axum and maps the query
//! orchestrator's typed errors onto status codes.

/// Error-to-response mapping.
pub mod error;
/// Request identity resolution and access logging.
pub mod middleware;
/// Router construction and handlers.
pub mod server;

pub use error::ApiError;
pub use middleware::{ClientIdentity, ANONYMOUS_IDENTITY, CLIENT_ID_HEADER};
pub use server::{AppState, GatewayServer, SearchRequest, DEFAULT_TOP_K};
