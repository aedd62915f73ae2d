//! Atomgraph Server Library
//!
//! JSON-RPC 2.0 surface over the Atomgraph retrieval and impact-analysis
//! engine: snapshot installation, impact analysis, fused retrieval, and
//! request cancellation over stdio.

pub mod backend;
pub mod cache;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod requests;
pub mod server;
pub mod transport;

pub use backend::Backend;
pub use error::ApiError;
pub use server::Server;
