//! Ring entry and departure: `create`, `join`, `quit`, grounded on
//! `node/initialize.go` and `node/quit.go`.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::{Config, Mode};
use crate::error::ChordError;
use crate::identifier::generate_identifier;
use crate::node::NodeRef;
use crate::node_handle::ChordNode;
use crate::storage::Storage;
use crate::transport::{self, RpcReply, RpcRequest};

/// Builds the node's own identity, binds its listener, and brings up the
/// maintenance loops. Dispatches to the create or join path based on
/// `config.mode`; both return a running node ready to serve.
pub async fn start(
    config: Config,
    local_storage: Arc<dyn Storage>,
    backup_storages: Vec<Arc<dyn Storage>>,
    client_tls: Option<Arc<tokio_rustls::rustls::ClientConfig>>,
    server_tls: Option<Arc<tokio_rustls::rustls::ServerConfig>>,
) -> Result<Arc<ChordNode>, ChordError> {
    config.validate()?;

    let addr = format!("{}:{}", config.ip, config.port);
    let id = match config.identifier_override {
        Some(id) => id,
        None => generate_identifier(&addr, config.m),
    };
    let info = NodeRef::new(id, config.ip.clone(), config.port.to_string());

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ChordError::Config(format!("failed to bind {addr}: {e}")))?;

    let node = ChordNode::new(info, &config, local_storage, backup_storages, client_tls, server_tls);

    {
        let node = node.clone();
        let handler: Arc<dyn transport::RpcHandler> = node.clone();
        let shutdown = node.shutdown_rx();
        let server_tls = node.server_tls.clone();
        tokio::spawn(async move {
            transport::serve(listener, handler, server_tls, shutdown).await;
        });
    }

    match &config.mode {
        Mode::Create => create_ring(&node),
        Mode::Join { seed_ip, seed_port } => join_ring(&node, seed_ip, *seed_port).await?,
    }

    node.start_periodic_tasks();

    // Let the first stabilize/fix_fingers/check_predecessor tick land
    // before handing the node back to the caller.
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;

    info!(id, addr = %node.info.addr(), "node started");
    Ok(node)
}

/// A freshly created ring is a ring of one: every successor slot and every
/// finger points back at `self`, predecessor stays empty.
fn create_ring(node: &Arc<ChordNode>) {
    let self_ref = node.info.clone();
    node.routing.set_successors(vec![self_ref.clone(); node.r]);
    for i in 0..node.m as usize {
        node.routing.set_finger(i, self_ref.clone());
    }
}

/// Asks `seed` to locate this node's successor, then seeds the successor
/// list and finger table from that successor's own state. `fix_fingers`
/// fills the rest in over subsequent ticks.
async fn join_ring(node: &Arc<ChordNode>, seed_ip: &str, seed_port: u16) -> Result<(), ChordError> {
    let seed = NodeRef::new(0, seed_ip, seed_port.to_string());

    match node.call_peer(&seed, RpcRequest::GetLength).await? {
        RpcReply::Length { m, r } if m == node.m && r == node.r => {}
        RpcReply::Length { m, r } => {
            return Err(ChordError::ProtocolMismatch {
                addr: seed.addr(),
                expected_m: node.m,
                expected_r: node.r,
                got_m: m,
                got_r: r,
            });
        }
        other => return Err(ChordError::Codec(format!("unexpected reply to GetLength: {other:?}"))),
    }

    let successor = node.find_successor_via(&seed, node.info.id).await?;
    if !node.live_check(&successor).await {
        return Err(ChordError::UnreachableMsg {
            addr: successor.addr(),
            method: "join: successor returned by seed is not live",
        });
    }

    let fetched = match node.call_peer(&successor, RpcRequest::GetSuccessors).await? {
        RpcReply::Successors(list) => list,
        other => return Err(ChordError::Codec(format!("unexpected reply to GetSuccessors: {other:?}"))),
    };

    let mut successors = Vec::with_capacity(node.r);
    successors.push(successor.clone());
    successors.extend(fetched.into_iter().take(node.r - 1));
    while successors.len() < node.r {
        successors.push(NodeRef::empty());
    }
    node.routing.set_successors(successors);

    for i in 0..node.m as usize {
        node.routing.set_finger(i, successor.clone());
    }

    Ok(())
}

impl ChordNode {
    /// `find_successor`, but dialing an arbitrary entry point instead of
    /// `self` for the first hop — needed only during `join`, before this
    /// node has any routing state of its own to iterate through.
    async fn find_successor_via(&self, entry: &NodeRef, id: crate::identifier::Identifier) -> Result<NodeRef, ChordError> {
        let mut next = entry.clone();
        for step in 0..crate::lookup::MAX_STEPS {
            let reply = self.call_peer(&next, RpcRequest::FindSuccessorStep { id }).await?;
            let (found, node) = match reply {
                RpcReply::FindSuccessorStep { found, node } => (found, node),
                other => return Err(ChordError::Codec(format!("unexpected reply to FindSuccessorStep: {other:?}"))),
            };
            info!(step, found, next = %node, "join find_successor step");
            if found {
                return Ok(node);
            }
            next = node;
        }
        Err(ChordError::HopBudgetExceeded(crate::lookup::MAX_STEPS))
    }

    /// Notifies both ring neighbors, then stops the maintenance loops and
    /// the RPC server. A lone node (its own successor) just stops. Local
    /// files are not handed off here: the predecessor's own replica chain
    /// already has them backed up, and will push them to this node's
    /// successor the next time it stabilizes.
    pub async fn quit(self: &Arc<Self>) {
        let successor = self.routing.get_first_successor();
        if successor.id == self.info.id {
            info!("quitting a single-node ring, nothing to hand off");
            self.shutdown().await;
            return;
        }

        let predecessor = self.predecessor();

        match self
            .call_peer(
                &successor,
                RpcRequest::NotifyPredecessorLeave {
                    node: predecessor.clone().unwrap_or_else(NodeRef::empty),
                },
            )
            .await
        {
            Ok(_) => info!(peer = %successor, "notified successor of departure"),
            Err(e) => warn!(peer = %successor, error = %e, "failed to notify successor of departure"),
        }

        if let Some(predecessor) = predecessor {
            if self.live_check(&predecessor).await {
                match self.call_peer(&predecessor, RpcRequest::NotifySuccessorLeave).await {
                    Ok(_) => info!(peer = %predecessor, "notified predecessor of departure"),
                    Err(e) => warn!(peer = %predecessor, error = %e, "failed to notify predecessor of departure"),
                }
            }
        }

        self.shutdown().await;
    }
}
