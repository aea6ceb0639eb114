//! RPC server: accepts connections and dispatches each to a registered
//! handler. The handler receives the node instance as context at
//! registration time (an `Arc<dyn RpcHandler>` bound once, in `main.rs`/
//! `membership.rs`) rather than reaching for an ambient singleton.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::{rustls, TlsAcceptor};
use tracing::{debug, warn};

use crate::error::ChordError;

use super::codec::{read_frame, write_frame, RpcReply, RpcRequest};

#[async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    async fn handle(&self, request: RpcRequest) -> RpcReply;
}

/// Runs the accept loop until `shutdown` is set to `true`. Each accepted
/// connection is handled on its own task; outstanding handlers are allowed
/// to finish once shutdown is observed (we only stop accepting new work).
pub async fn serve(
    listener: TcpListener,
    handler: Arc<dyn RpcHandler>,
    server_tls: Option<Arc<rustls::ServerConfig>>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "rpc accept failed");
                        continue;
                    }
                };
                let handler = handler.clone();
                let server_tls = server_tls.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, handler, server_tls).await {
                        debug!(%addr, error = %e, "rpc connection ended with error");
                    }
                });
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    handler: Arc<dyn RpcHandler>,
    server_tls: Option<Arc<rustls::ServerConfig>>,
) -> Result<(), ChordError> {
    match server_tls {
        None => handle_framed(stream, handler).await,
        Some(cfg) => {
            let acceptor = TlsAcceptor::from(cfg);
            let tls_stream = acceptor
                .accept(stream)
                .await
                .map_err(|e| ChordError::Codec(e.to_string()))?;
            handle_framed(tls_stream, handler).await
        }
    }
}

async fn handle_framed<S>(mut stream: S, handler: Arc<dyn RpcHandler>) -> Result<(), ChordError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let request: RpcRequest = read_frame(&mut stream)
        .await
        .map_err(|e| ChordError::Codec(e.to_string()))?;
    let reply = handler.handle(request).await;
    write_frame(&mut stream, &reply)
        .await
        .map_err(|e| ChordError::Codec(e.to_string()))?;
    Ok(())
}
