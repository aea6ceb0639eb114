//! Iterative `find_successor`, grounded on `node/find.go`.

use tracing::{info, warn};

use crate::error::ChordError;
use crate::identifier::{mod_interval_check, Identifier};
use crate::node::NodeRef;
use crate::node_handle::ChordNode;
use crate::transport::{RpcReply, RpcRequest};

/// Hard hop budget for `find_successor`.
pub const MAX_STEPS: u32 = 10;

impl ChordNode {
    /// Iteratively asks successive peers (starting at `self`) for the
    /// successor of `id`, over the wire each time — including the first
    /// hop to `self` — every step goes through the same RPC-wrapper call
    /// path, first hop included.
    pub async fn find_successor(&self, id: Identifier) -> Result<NodeRef, ChordError> {
        let mut next = self.info.clone();
        for step in 0..MAX_STEPS {
            let reply = self.call_peer(&next, RpcRequest::FindSuccessorStep { id }).await?;
            let (found, node) = match reply {
                RpcReply::FindSuccessorStep { found, node } => (found, node),
                other => return Err(ChordError::Codec(format!("unexpected reply to FindSuccessorStep: {other:?}"))),
            };
            info!(step, found, next = %node, "find_successor step");
            if found {
                return Ok(node);
            }
            next = node;
        }
        warn!(id, "find_successor exceeded hop budget");
        Err(ChordError::HopBudgetExceeded(MAX_STEPS))
    }

    /// The single-hop step executed locally by whichever node receives
    /// `FindSuccessorStep`: if `id` falls in `(self, successor]`, that
    /// successor is the answer; otherwise defer to the closest preceding
    /// node known locally.
    pub(crate) async fn find_successor_step(&self, id: Identifier) -> (bool, NodeRef) {
        let successor = self.routing.get_first_successor();
        if mod_interval_check(id, self.info.id, successor.id, false, true, self.m) {
            (true, successor)
        } else {
            (false, self.closest_preceding(id).await)
        }
    }

    /// Scans the finger table from `m-1` down to `0` for the first
    /// non-empty entry in `(self, id)`, then asks that finger for its
    /// successor list and does the same backward scan over it, returning
    /// whichever entry is closer.
    pub(crate) async fn closest_preceding(&self, id: Identifier) -> NodeRef {
        let finger_entry = self.find_nearest_node_in_fingers(id);

        let successors = match self.call_peer(&finger_entry, RpcRequest::GetSuccessors).await {
            Ok(RpcReply::Successors(list)) => list,
            _ => return finger_entry,
        };

        find_nearest_node(&finger_entry, id, &successors, self.m)
    }

    fn find_nearest_node_in_fingers(&self, id: Identifier) -> NodeRef {
        for i in (0..self.m as usize).rev() {
            let finger = self.routing.get_finger(i);
            if finger.is_empty(self.m) {
                continue;
            }
            if !mod_interval_check(finger.id, self.info.id, id, false, false, self.m) {
                continue;
            }
            return finger;
        }
        self.info.clone()
    }
}

/// Scans `list` back-to-front for the first entry in the open modular
/// interval `(origin.id, id)`, falling back to `origin` itself.
fn find_nearest_node(origin: &NodeRef, id: Identifier, list: &[NodeRef], m: u32) -> NodeRef {
    for entry in list.iter().rev() {
        if entry.is_empty(m) {
            continue;
        }
        if !mod_interval_check(entry.id, origin.id, id, false, false, m) {
            continue;
        }
        return entry.clone();
    }
    origin.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_nearest_node_scans_back_to_front() {
        let m = 10;
        let origin = NodeRef::new(100, "127.0.0.1", "9000");
        let list = vec![
            NodeRef::new(150, "127.0.0.1", "9001"),
            NodeRef::new(300, "127.0.0.1", "9002"),
            NodeRef::empty(),
        ];
        // id = 400: both 150 and 300 lie in (100, 400); last non-empty wins.
        let nearest = find_nearest_node(&origin, 400, &list, m);
        assert_eq!(nearest.id, 300);
    }

    #[test]
    fn find_nearest_node_falls_back_to_origin() {
        let m = 10;
        let origin = NodeRef::new(100, "127.0.0.1", "9000");
        let list = vec![NodeRef::empty(), NodeRef::empty()];
        let nearest = find_nearest_node(&origin, 400, &list, m);
        assert_eq!(nearest.id, 100);
    }
}
