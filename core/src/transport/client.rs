//! RPC client: a fresh connection per call, closed after the reply.
//! Grounded on `relay::client::send_and_receive_raw`'s framing and, for the
//! liveness probe, `original_source/node/ping.go`.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::rustls;
use tokio_rustls::TlsConnector;
use tracing::warn;

use crate::error::ChordError;
use crate::node::NodeRef;

use super::codec::{read_frame, write_frame, RpcReply, RpcRequest};

const PING_TIMEOUT: Duration = Duration::from_secs(1);

pub trait AsyncReadWrite: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncReadWrite for T {}

async fn dial(
    peer: &NodeRef,
    client_tls: Option<&Arc<rustls::ClientConfig>>,
) -> std::io::Result<Box<dyn AsyncReadWrite>> {
    let tcp = TcpStream::connect(peer.addr()).await?;
    match client_tls {
        None => Ok(Box::new(tcp)),
        Some(cfg) => {
            let connector = TlsConnector::from(cfg.clone());
            let server_name = rustls::ServerName::try_from(peer.ip.as_str())
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
            let tls_stream = connector.connect(server_name, tcp).await?;
            Ok(Box::new(tls_stream))
        }
    }
}

/// Synchronous-shaped call: opens a fresh connection, sends `request`,
/// reads exactly one reply, and lets the connection drop. No pooling.
pub async fn call(
    peer: &NodeRef,
    request: RpcRequest,
    client_tls: Option<&Arc<rustls::ClientConfig>>,
) -> Result<RpcReply, ChordError> {
    let method = request.method_name();
    let mut stream = dial(peer, client_tls).await.map_err(|e| {
        warn!(addr = %peer.addr(), method, error = %e, "rpc dial failed");
        ChordError::Unreachable {
            addr: peer.addr(),
            method,
            source: e,
        }
    })?;

    write_frame(&mut stream, &request).await.map_err(|e| {
        warn!(addr = %peer.addr(), method, error = %e, "rpc write failed");
        ChordError::UnreachableMsg {
            addr: peer.addr(),
            method,
        }
    })?;

    let reply: RpcReply = read_frame(&mut stream).await.map_err(|e| {
        warn!(addr = %peer.addr(), method, error = %e, "rpc read failed");
        ChordError::UnreachableMsg {
            addr: peer.addr(),
            method,
        }
    })?;

    Ok(reply)
}

/// TCP (or TLS) connect with a 1-second timeout, immediate close. Success
/// iff the connect (and, when TLS is on, the handshake) succeeded.
pub async fn ping(peer: &NodeRef, client_tls: Option<&Arc<rustls::ClientConfig>>) -> Result<(), ChordError> {
    let method = "Ping";
    match timeout(PING_TIMEOUT, dial(peer, client_tls)).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(ChordError::Unreachable {
            addr: peer.addr(),
            method,
            source: e,
        }),
        Err(_) => Err(ChordError::UnreachableMsg {
            addr: peer.addr(),
            method,
        }),
    }
}
