//! Connection contract between the engine and the service under test.
//!
//! Commands are opaque strings. Each `send` is answered by exactly one decoded
//! [`Value`] on the same connection.
use crate::error::TransportError;
use std::future::Future;
use std::time::Duration;
use surge_core::Value;

#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    type Conn: Connection + 'static;

    async fn connect(&self) -> Result<Self::Conn, TransportError>;
}

#[trait_variant::make(Connection: Send)]
pub trait LocalConnection {
    async fn send(&mut self, command: &str) -> Result<(), TransportError>;

    async fn receive(&mut self) -> Result<Value, TransportError>;

    async fn close(&mut self);
}

/// Bounds `fut` by `limit`, reporting an elapsed deadline as
/// [`TransportError::Timeout`].
pub async fn deadline<T, F>(op: &'static str, limit: Duration, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(TransportError::Timeout {
            op,
            timeout: limit,
        }),
    }
}
