//! In-process loopback transport.
//!
//! Connects two [`Connection`]s over an in-memory duplex pipe. The loopback
//! speaks the lean protocol variant: request/response frames only, no
//! config handshake, no layer data.

use crate::connection::{Connection, ConnectionSide};
use crate::error::Result;
use crate::protocol::ProtocolVariant;

/// Default in-memory pipe capacity per direction.
pub const DEFAULT_LOOPBACK_CAPACITY: usize = 64 * 1024;

/// Create a connected client/server pair inside this process.
pub async fn loopback_pair() -> Result<(Connection, Connection)> {
    loopback_pair_with_capacity(DEFAULT_LOOPBACK_CAPACITY).await
}

/// As [`loopback_pair`], with an explicit pipe capacity.
pub async fn loopback_pair_with_capacity(capacity: usize) -> Result<(Connection, Connection)> {
    let (client_stream, server_stream) = tokio::io::duplex(capacity);
    let client = Connection::start(
        client_stream,
        ConnectionSide::Client,
        ProtocolVariant::Lean,
    )
    .await?;
    let server = Connection::start(
        server_stream,
        ConnectionSide::Server,
        ProtocolVariant::Lean,
    )
    .await?;
    Ok((client, server))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loopback_pair_sides_and_variant() {
        let (client, server) = loopback_pair().await.unwrap();

        assert_eq!(client.side(), ConnectionSide::Client);
        assert_eq!(server.side(), ConnectionSide::Server);
        assert_eq!(client.variant(), ProtocolVariant::Lean);
        assert_eq!(server.variant(), ProtocolVariant::Lean);
    }
}
