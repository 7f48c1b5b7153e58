//! Transport driver interface.
//!
//! Transports (HTTP adapters, federation gateways, websocket bridges)
//! live outside this crate. They receive the assembled schema, own the
//! wire protocol, and feed requests back through the schema's
//! execution entry points.

use async_graphql::dynamic::Schema;
use async_trait::async_trait;

use crate::Result;

/// A transport serving an assembled schema.
#[async_trait]
pub trait TransportDriver: Send + Sync {
    /// Starts the transport with the given schema graph.
    async fn start(&self, schema: Schema) -> Result<()>;

    /// Stops the transport.
    async fn stop(&self);

    /// Handles one request.
    async fn handle(&self, request: async_graphql::Request) -> async_graphql::Response;
}
