//! `ChordNode`: the façade gluing routing, storage, transport, and
//! maintenance together. Owned as a single instance per process and passed
//! into the RPC dispatcher at registration time — handlers receive it as
//! `self` rather than reaching for a process-wide singleton.

use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::{watch, Semaphore};
use tokio_rustls::rustls;
use tracing::warn;

use crate::config::Config;
use crate::error::ChordError;
use crate::identifier::Identifier;
use crate::node::NodeRef;
use crate::routing::RoutingTable;
use crate::storage::Storage;
use crate::transport::{self, RpcHandler, RpcReply, RpcRequest};

pub struct ChordNode {
    pub info: NodeRef,
    pub m: u32,
    pub r: usize,
    pub(crate) routing: RoutingTable,
    pub(crate) local_storage: Arc<dyn Storage>,
    pub(crate) backup_storages: Vec<Arc<dyn Storage>>,
    pub(crate) client_tls: Option<Arc<rustls::ClientConfig>>,
    pub(crate) server_tls: Option<Arc<rustls::ServerConfig>>,
    pub(crate) fix_fingers_cursor: AtomicUsize,
    pub(crate) stabilize_ms: u64,
    pub(crate) fix_fingers_ms: u64,
    pub(crate) check_predecessor_ms: u64,
    pub(crate) shutdown_tx: watch::Sender<bool>,
    pub(crate) shutdown_rx: watch::Receiver<bool>,
    /// Bounds how many fire-and-forget handler tasks (`Notify` and
    /// friends) may run concurrently, instead of an unbounded per-call
    /// fan-out.
    fire_and_forget_limit: Arc<Semaphore>,
    /// Lets fire-and-forget RPC handlers (`Notify` and friends) obtain a
    /// strong `Arc` to hand to a detached task without every caller having
    /// to carry one around.
    self_weak: Weak<ChordNode>,
}

/// Cap on concurrently running fire-and-forget handler tasks per node.
const FIRE_AND_FORGET_CONCURRENCY: usize = 64;

impl ChordNode {
    pub fn new(
        info: NodeRef,
        config: &Config,
        local_storage: Arc<dyn Storage>,
        backup_storages: Vec<Arc<dyn Storage>>,
        client_tls: Option<Arc<rustls::ClientConfig>>,
        server_tls: Option<Arc<rustls::ServerConfig>>,
    ) -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let routing = RoutingTable::new(info.id, config.m, config.r);
        Arc::new_cyclic(|weak| Self {
            info,
            m: config.m,
            r: config.r,
            routing,
            local_storage,
            backup_storages,
            client_tls,
            server_tls,
            fix_fingers_cursor: AtomicUsize::new(0),
            stabilize_ms: config.stabilize_ms,
            fix_fingers_ms: config.fix_fingers_ms,
            check_predecessor_ms: config.check_predecessor_ms,
            shutdown_tx,
            shutdown_rx,
            fire_and_forget_limit: Arc::new(Semaphore::new(FIRE_AND_FORGET_CONCURRENCY)),
            self_weak: weak.clone(),
        })
    }

    pub(crate) async fn call_peer(&self, peer: &NodeRef, request: RpcRequest) -> Result<RpcReply, ChordError> {
        transport::call(peer, request, self.client_tls.as_ref()).await
    }

    pub(crate) async fn ping(&self, peer: &NodeRef) -> Result<(), ChordError> {
        transport::ping(peer, self.client_tls.as_ref()).await
    }

    /// Mirrors `NodeInfo.LiveCheck`: a node is live iff it's non-empty and
    /// responds to `Ping`.
    pub(crate) async fn live_check(&self, peer: &NodeRef) -> bool {
        !peer.is_empty(self.m) && self.ping(peer).await.is_ok()
    }

    pub fn predecessor(&self) -> Option<NodeRef> {
        self.routing.get_predecessor()
    }

    pub fn successors(&self) -> Vec<NodeRef> {
        self.routing.get_successors()
    }

    pub fn fingers(&self) -> Vec<NodeRef> {
        (0..self.m as usize).map(|i| self.routing.get_finger(i)).collect()
    }

    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub(crate) fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    pub fn local_identifier(&self, name: &str) -> Identifier {
        crate::identifier::generate_identifier(name, self.m)
    }

    pub fn store_file(&self, filename: &str, data: Vec<u8>) -> Result<(), ChordError> {
        self.local_storage.put(filename, data)
    }

    pub fn get_file(&self, filename: &str) -> Result<Vec<u8>, ChordError> {
        self.local_storage.get(filename)
    }

    pub fn store_files(&self, files: crate::storage::FileList) -> Result<(), ChordError> {
        self.local_storage.put_files(files)
    }

    pub fn get_all_files(&self) -> Result<crate::storage::FileList, ChordError> {
        self.local_storage.get_all_files()
    }

    /// Stores `data` under `name` on a (possibly remote) peer, used by the
    /// CLI's `storefile` command after resolving the owning node.
    pub async fn call_peer_store(&self, peer: &NodeRef, name: &str, data: Vec<u8>) -> Result<(), ChordError> {
        match self
            .call_peer(
                peer,
                RpcRequest::StoreFile {
                    name: name.to_string(),
                    data,
                },
            )
            .await?
        {
            RpcReply::StoreFile { success: true } => Ok(()),
            _ => Err(ChordError::UnreachableMsg {
                addr: peer.addr(),
                method: "StoreFile",
            }),
        }
    }

    /// Fetches `name` from a (possibly remote) peer, used by the CLI's
    /// `getfile` command after resolving the owning node.
    pub async fn call_peer_get(&self, peer: &NodeRef, name: &str) -> Result<Vec<u8>, ChordError> {
        match self
            .call_peer(
                peer,
                RpcRequest::GetFile {
                    name: name.to_string(),
                },
            )
            .await?
        {
            RpcReply::GetFile { success: true, data } => Ok(data),
            _ => Err(ChordError::UnreachableMsg {
                addr: peer.addr(),
                method: "GetFile",
            }),
        }
    }

    /// Spawns a detached task carrying a strong reference to this node.
    /// Used by the fire-and-forget RPC handlers: the caller gets an
    /// immediate ack while the real work proceeds independently, gated by
    /// `fire_and_forget_limit` so a burst of `Notify`/leave calls can't pile
    /// up an unbounded number of tasks.
    pub(crate) fn spawn_on_self<F, Fut>(&self, work: F)
    where
        F: FnOnce(Arc<ChordNode>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let Some(this) = self.self_weak.upgrade() else {
            return;
        };
        let limit = self.fire_and_forget_limit.clone();
        tokio::spawn(async move {
            let _permit = match limit.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            work(this).await;
        });
    }
}

#[async_trait]
impl RpcHandler for ChordNode {
    async fn handle(&self, request: RpcRequest) -> RpcReply {
        match request {
            RpcRequest::GetInfo => RpcReply::Info(self.info.clone()),

            RpcRequest::GetLength => RpcReply::Length { m: self.m, r: self.r },

            RpcRequest::GetPredecessor => {
                RpcReply::Predecessor(self.routing.get_predecessor().unwrap_or_else(NodeRef::empty))
            }

            RpcRequest::GetSuccessors => RpcReply::Successors(self.routing.get_successors()),

            RpcRequest::FindSuccessorStep { id } => {
                let (found, node) = self.find_successor_step(id).await;
                RpcReply::FindSuccessorStep { found, node }
            }

            RpcRequest::Notify { node } => {
                self.spawn_on_self(move |this| async move { this.notify(node).await });
                RpcReply::Ack
            }

            RpcRequest::NotifySuccessorLeave => {
                self.spawn_on_self(move |this| async move { this.on_notify_successor_leave().await });
                RpcReply::Ack
            }

            RpcRequest::NotifyPredecessorLeave { node } => {
                self.spawn_on_self(move |this| async move { this.on_notify_predecessor_leave(node).await });
                RpcReply::Ack
            }

            RpcRequest::StoreFile { name, data } => {
                let success = self.store_file(&name, data).is_ok();
                RpcReply::StoreFile { success }
            }

            RpcRequest::GetFile { name } => match self.get_file(&name) {
                Ok(data) => RpcReply::GetFile { success: true, data },
                Err(e) => {
                    warn!(file = %name, error = %e, "GetFile failed");
                    RpcReply::GetFile {
                        success: false,
                        data: Vec::new(),
                    }
                }
            },

            RpcRequest::StoreFiles { files } => {
                let success = self.store_files(files).is_ok();
                RpcReply::StoreFiles { success }
            }

            RpcRequest::GetAllFiles => match self.get_all_files() {
                Ok(files) => RpcReply::Files { success: true, files },
                Err(e) => {
                    warn!(error = %e, "GetAllFiles failed");
                    RpcReply::Files {
                        success: false,
                        files: Vec::new(),
                    }
                }
            },

            RpcRequest::GetAllBackupFiles => match self.get_all_backup_files() {
                Ok(lists) => RpcReply::BackupFiles { success: true, lists },
                Err(e) => {
                    warn!(error = %e, "GetAllBackupFiles failed");
                    RpcReply::BackupFiles {
                        success: false,
                        lists: Vec::new(),
                    }
                }
            },
        }
    }
}
