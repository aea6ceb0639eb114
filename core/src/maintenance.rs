//! The three periodic maintenance tasks, grounded on `node/stabilize.go`,
//! plus the loop-spawning/shutdown plumbing of `node/initialize.go`.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::identifier::{generate_identifier, mod_interval_check};
use crate::node::NodeRef;
use crate::node_handle::ChordNode;
use crate::transport::{RpcReply, RpcRequest};

impl ChordNode {
    /// One iteration: reconcile the replica chain, then notify the current
    /// first successor that this node may be its predecessor.
    pub async fn stabilize(&self) {
        if let Err(e) = self.update_replica().await {
            warn!(error = %e, "update_replica failed during stabilize");
        }

        let successor = self.routing.get_first_successor();
        match self
            .call_peer(
                &successor,
                RpcRequest::Notify {
                    node: self.info.clone(),
                },
            )
            .await
        {
            Ok(_) => {}
            Err(e) => warn!(peer = %successor, error = %e, "failed to notify successor"),
        }
    }

    /// Advances the shared `fix_fingers` cursor by one and refreshes that
    /// finger slot. The cursor is a field on the node rather than the
    /// source's package-level global, but a single node process still
    /// gives it the same process-wide-cursor behavior a package-level
    /// global would.
    pub async fn fix_fingers(&self) {
        let m = self.m as usize;
        let mut next = self.fix_fingers_cursor.load(Ordering::Relaxed);
        next += 1;
        if next > m - 1 {
            next = 0;
        }
        self.fix_fingers_cursor.store(next, Ordering::Relaxed);

        let target_id = self.routing.finger_id(next);
        info!(next, target_id, "fix_fingers");

        match self.find_successor(target_id).await {
            Ok(candidate) if self.live_check(&candidate).await => {
                self.routing.set_finger(next, candidate);
            }
            Ok(_) => self.routing.set_finger(next, NodeRef::empty()),
            Err(e) => {
                warn!(next, error = %e, "fix_fingers find_successor failed");
                self.routing.set_finger(next, NodeRef::empty());
            }
        }
    }

    /// Pings the current predecessor; clears it on failure, leaves it
    /// unchanged on success.
    pub async fn check_predecessor(&self) {
        let Some(predecessor) = self.routing.get_predecessor() else {
            return;
        };
        if !self.live_check(&predecessor).await {
            info!(peer = %predecessor, "predecessor is gone, clearing");
            self.routing.set_predecessor(None);
        }
    }

    /// Received from a candidate `n'` proposing itself as this node's
    /// predecessor. Adopts it when the current predecessor is empty or
    /// `n'` lies in the open interval `(predecessor, self)`, provided `n'`
    /// is actually live.
    pub(crate) async fn notify(&self, candidate: NodeRef) {
        let old_predecessor = self.routing.get_predecessor();
        let should_adopt = match &old_predecessor {
            None => true,
            Some(pred) => mod_interval_check(candidate.id, pred.id, self.info.id, false, false, self.m),
        };
        if !should_adopt {
            return;
        }
        if !self.live_check(&candidate).await {
            return;
        }
        self.routing.set_predecessor(Some(candidate.clone()));
        self.transfer_files_to_predecessor(old_predecessor, candidate).await;
    }

    /// After adopting a new predecessor, hands it the files whose
    /// identifier falls in `(old_predecessor, new_predecessor]`.
    async fn transfer_files_to_predecessor(&self, old_predecessor: Option<NodeRef>, new_predecessor: NodeRef) {
        if new_predecessor.id == self.info.id {
            info!("new predecessor is self, nothing to transfer");
            return;
        }

        let old_predecessor = match old_predecessor {
            Some(p) if self.live_check(&p).await => p,
            _ => {
                info!("old predecessor is empty or dead, nothing to transfer");
                return;
            }
        };

        let old_id = old_predecessor.id;
        let new_id = new_predecessor.id;
        let m = self.m;
        let extracted = self
            .local_storage
            .extract_files_by_filter(&|name| mod_interval_check(generate_identifier(name, m), old_id, new_id, false, true, m))
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to extract files for predecessor transfer");
                Vec::new()
            });

        if extracted.is_empty() {
            return;
        }

        match self
            .call_peer(
                &new_predecessor,
                RpcRequest::StoreFiles {
                    files: extracted.clone(),
                },
            )
            .await
        {
            Ok(RpcReply::StoreFiles { success: true }) => {
                info!(peer = %new_predecessor, "transferred files to new predecessor");
            }
            _ => {
                error!(peer = %new_predecessor, "failed to transfer files to new predecessor, storing them back locally");
                if let Err(e) = self.local_storage.put_files(extracted) {
                    error!(error = %e, "failed to store files back after a failed transfer");
                }
            }
        }
    }

    pub(crate) async fn on_notify_successor_leave(&self) {
        if let Err(e) = self.update_replica().await {
            warn!(error = %e, "update_replica failed while handling a departing successor");
        }
    }

    pub(crate) async fn on_notify_predecessor_leave(&self, handed_off_predecessor: NodeRef) {
        if self.live_check(&handed_off_predecessor).await {
            self.routing.set_predecessor(Some(handed_off_predecessor));
        }
    }

    /// Spawns the three maintenance loops; each selects between its own
    /// tick and the shared shutdown signal.
    pub(crate) fn start_periodic_tasks(self: &Arc<Self>) {
        spawn_periodic_loop(self.clone(), self.stabilize_ms, self.shutdown_rx(), |node| {
            Box::pin(async move { node.stabilize().await })
        });
        spawn_periodic_loop(self.clone(), self.fix_fingers_ms, self.shutdown_rx(), |node| {
            Box::pin(async move { node.fix_fingers().await })
        });
        spawn_periodic_loop(self.clone(), self.check_predecessor_ms, self.shutdown_rx(), |node| {
            Box::pin(async move { node.check_predecessor().await })
        });
    }
}

fn spawn_periodic_loop<F>(
    node: Arc<ChordNode>,
    period_ms: u64,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
    tick: F,
) where
    F: Fn(Arc<ChordNode>) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(period_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    tick(node.clone()).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });
}
