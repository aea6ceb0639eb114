//! `update_replica`: successor-list and backup-list reconciliation under
//! churn. Grounded on `node/replication.go` and the backup-storage wrappers
//! in `node/storage.go`. Every step, tie-break, and degradation rule here
//! has a direct counterpart there.

use tracing::{error, info, warn};

use crate::error::ChordError;
use crate::identifier::mod_interval_check;
use crate::node_handle::ChordNode;
use crate::storage::FileList;
use crate::transport::RpcReply;

impl ChordNode {
    /// Scans the successor list from index 0; the first entry whose `Ping`
    /// succeeds becomes `successor[0]` immediately. Returns its old index,
    /// or an error if none responded (the caller treats that as fatal).
    async fn find_first_live_successor(&self) -> Result<usize, ChordError> {
        let r = self.r;
        for index in 0..r {
            let candidate = self.routing.get_successor(index);
            if self.live_check(&candidate).await {
                self.routing.set_first_successor(candidate.clone());
                info!(index, peer = %candidate, "found first live successor");
                return Ok(index);
            }
        }
        Err(ChordError::AllSuccessorsDead)
    }

    /// Absorbs a node that joined between `self` and `successor[0]`: asks
    /// the successor for its own predecessor `x`, and if `x` is live and
    /// lies in `(self, successor[0])`, replaces `successor[0]` with `x`.
    /// A dead or empty `x` is not an error — "do nothing" is the preserved
    /// behavior in both cases.
    async fn handle_x(&self) {
        let successor = self.routing.get_first_successor();
        let x = match self.call_peer(&successor, crate::transport::RpcRequest::GetPredecessor).await {
            Ok(RpcReply::Predecessor(x)) => x,
            _ => {
                warn!(peer = %successor, "failed to get successor's predecessor");
                return;
            }
        };
        if !self.live_check(&x).await {
            return;
        }
        if mod_interval_check(x.id, self.info.id, successor.id, false, false, self.m) {
            info!(peer = %x, "absorbing successor's predecessor as the new first successor");
            self.routing.set_first_successor(x);
        }
    }

    /// Reconciles the successor list with the (possibly updated)
    /// `successor[0]`'s own list: `[successor[0]] ++ fetched[0..r-1]`.
    async fn update_successors(&self) -> Result<(), ChordError> {
        let successor = self.routing.get_first_successor();
        let fetched = match self.call_peer(&successor, crate::transport::RpcRequest::GetSuccessors).await? {
            RpcReply::Successors(list) => list,
            other => return Err(ChordError::Codec(format!("unexpected reply to GetSuccessors: {other:?}"))),
        };
        if fetched.len() != self.r {
            return Err(ChordError::ProtocolMismatch {
                addr: successor.addr(),
                expected_m: self.m,
                expected_r: self.r,
                got_m: self.m,
                got_r: fetched.len(),
            });
        }
        let mut new_list = Vec::with_capacity(self.r);
        new_list.push(successor);
        new_list.extend(fetched.into_iter().take(self.r - 1));
        self.routing.set_successors(new_list);
        Ok(())
    }

    async fn get_successor_files(&self) -> Result<FileList, ChordError> {
        let successor = self.routing.get_first_successor();
        match self.call_peer(&successor, crate::transport::RpcRequest::GetAllFiles).await? {
            RpcReply::Files { success: true, files } => Ok(files),
            _ => Err(ChordError::UnreachableMsg {
                addr: successor.addr(),
                method: "GetAllFiles",
            }),
        }
    }

    async fn get_successor_backup_files(&self) -> Result<Vec<FileList>, ChordError> {
        let successor = self.routing.get_first_successor();
        match self
            .call_peer(&successor, crate::transport::RpcRequest::GetAllBackupFiles)
            .await?
        {
            RpcReply::BackupFiles { success: true, lists } if lists.len() == self.r => Ok(lists),
            RpcReply::BackupFiles { success: true, .. } => Err(ChordError::ProtocolMismatch {
                addr: successor.addr(),
                expected_m: self.m,
                expected_r: self.r,
                got_m: self.m,
                got_r: 0,
            }),
            _ => Err(ChordError::UnreachableMsg {
                addr: successor.addr(),
                method: "GetAllBackupFiles",
            }),
        }
    }

    /// Rebuilds the `r` backup stores from `successor[0]`'s own files and
    /// backups. If even `successor[0]`'s files can't be fetched, all
    /// backups are cleared rather than left stale. If only the backup
    /// fetch fails, the layout degrades to `[successor_files]` alone and a
    /// soft error is recorded (but still returned).
    async fn update_backup_files(&self) -> Result<(), ChordError> {
        let successor_files = match self.get_successor_files().await {
            Ok(files) => files,
            Err(e) => {
                self.delete_all_backup_files()?;
                return Err(e);
            }
        };

        let (new_layout, soft_error) = match self.get_successor_backup_files().await {
            Ok(backups) => {
                let mut layout = Vec::with_capacity(self.r);
                layout.push(successor_files);
                layout.extend(backups.into_iter().take(self.r - 1));
                (layout, None)
            }
            Err(e) => {
                warn!(error = %e, "failed to get successor's backup files, degrading to successor files only");
                (vec![successor_files], Some(e))
            }
        };

        self.delete_all_backup_files()?;
        self.store_backup_files(new_layout)?;

        match soft_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Pushes files displaced from backup stores `[0, k)` onto the new
    /// `successor[0]`; on failure, stashes them in this node's own local
    /// store so a later `Notify`-driven transfer can retry.
    async fn send_backup_files(&self, displaced_files: FileList) -> Result<(), ChordError> {
        let successor = self.routing.get_first_successor();
        match self
            .call_peer(
                &successor,
                crate::transport::RpcRequest::StoreFiles {
                    files: displaced_files,
                },
            )
            .await
        {
            Ok(RpcReply::StoreFiles { success: true }) => Ok(()),
            Ok(_) | Err(_) => Err(ChordError::UnreachableMsg {
                addr: successor.addr(),
                method: "StoreFiles",
            }),
        }
    }

    /// The replication pipeline, run once per `stabilize` tick. Guarantees
    /// the three invariants in the design: `successor[0]` live-if-any-live,
    /// the successor-list reconciliation, and the backup-list
    /// reconciliation.
    pub(crate) async fn update_replica(&self) -> Result<(), ChordError> {
        let index_of_first_live = match self.find_first_live_successor().await {
            Ok(i) => i,
            Err(e) => {
                error!("all successors are dead; this node is partitioned from its slice of the ring");
                std::process::exit(1);
                #[allow(unreachable_code)]
                {
                    return Err(e);
                }
            }
        };
        let first_successor_died = index_of_first_live > 0;

        let displaced_files = if first_successor_died {
            match self.get_backup_files_up_to_index(index_of_first_live) {
                Ok(files) => files,
                Err(e) => {
                    warn!(error = %e, "failed to read displaced backup files");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        // From here on successor[0] is settled; x may still replace it.
        self.handle_x().await;

        if first_successor_died && !displaced_files.is_empty() {
            if let Err(e) = self.send_backup_files(displaced_files.clone()).await {
                warn!(error = %e, "failed to send displaced backup files to the new successor, storing them locally");
                if let Err(e) = self.local_storage.put_files(displaced_files) {
                    error!(error = %e, "failed to store displaced files back locally");
                }
            }
        }

        self.update_successors().await?;
        self.update_backup_files().await?;
        Ok(())
    }

    /// Flattens backup stores `[0, end_index)` into a single list. A
    /// per-store read failure clears that store and continues.
    fn get_backup_files_up_to_index(&self, end_index: usize) -> Result<FileList, ChordError> {
        if end_index >= self.r {
            return Err(ChordError::Storage(format!("end_index {end_index} out of range")));
        }
        let mut out = Vec::new();
        for store in &self.backup_storages[..end_index] {
            match store.get_all_files() {
                Ok(files) => out.extend(files),
                Err(_) => store.clear()?,
            }
        }
        Ok(out)
    }

    /// Writes `file_lists[i]` into backup store `i`. A per-store write
    /// failure clears that store and continues to the next.
    fn store_backup_files(&self, file_lists: Vec<FileList>) -> Result<(), ChordError> {
        if file_lists.len() != self.r {
            return Err(ChordError::Storage("backup file list count mismatch".into()));
        }
        for (store, files) in self.backup_storages.iter().zip(file_lists) {
            if store.put_files(files).is_err() {
                store.clear()?;
            }
        }
        Ok(())
    }

    fn delete_all_backup_files(&self) -> Result<(), ChordError> {
        for store in &self.backup_storages {
            store.clear()?;
        }
        Ok(())
    }

    pub(crate) fn get_all_backup_files(&self) -> Result<Vec<FileList>, ChordError> {
        self.backup_storages.iter().map(|s| s.get_all_files()).collect()
    }
}
