//! TCP stream transport.
//!
//! Thin wrappers over tokio's TCP types that apply the connection-oriented
//! defaults this protocol wants: `TCP_NODELAY` on, since frames are small
//! and latency-sensitive.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::error::Result;

/// TCP listener for accepting peer connections.
pub struct SocketListener {
    listener: TcpListener,
}

impl SocketListener {
    /// Bind to an address.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Accept a single peer connection.
    pub async fn accept(&self) -> Result<TcpStream> {
        let (stream, _addr) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// The locally bound address (useful when binding to port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Connect to a listening peer.
pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}
