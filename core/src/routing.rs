//! Predecessor / successor-list / finger-table state, each behind its own
//! `parking_lot::RwLock`, grounded on `node/get_set.go`. Direct field access
//! is forbidden outside this module; every accessor here takes the
//! appropriate lock for the minimum span and returns an owned copy.

use parking_lot::RwLock;

use crate::identifier::{add_mod, Identifier};
use crate::node::NodeRef;

pub struct RoutingTable {
    m: u32,
    predecessor: RwLock<Option<NodeRef>>,
    /// Fixed length `r`; unset slots hold `NodeRef::empty()`.
    successors: RwLock<Vec<NodeRef>>,
    /// Fixed length `m`; unset slots hold `NodeRef::empty()`.
    fingers: RwLock<Vec<NodeRef>>,
    /// Ideal target identifier for each finger slot, computed once.
    finger_ids: Vec<Identifier>,
}

impl RoutingTable {
    pub fn new(self_id: Identifier, m: u32, r: usize) -> Self {
        let finger_ids = (0..m as u64).map(|i| add_mod(self_id, 1u64 << i, m)).collect();
        Self {
            m,
            predecessor: RwLock::new(None),
            successors: RwLock::new(vec![NodeRef::empty(); r]),
            fingers: RwLock::new(vec![NodeRef::empty(); m as usize]),
            finger_ids,
        }
    }

    pub fn r(&self) -> usize {
        self.successors.read().len()
    }

    pub fn m(&self) -> u32 {
        self.m
    }

    pub fn get_predecessor(&self) -> Option<NodeRef> {
        self.predecessor.read().clone()
    }

    pub fn set_predecessor(&self, predecessor: Option<NodeRef>) {
        *self.predecessor.write() = predecessor;
    }

    pub fn get_successors(&self) -> Vec<NodeRef> {
        self.successors.read().clone()
    }

    pub fn set_successors(&self, successors: Vec<NodeRef>) {
        *self.successors.write() = successors;
    }

    pub fn get_successor(&self, index: usize) -> NodeRef {
        self.successors.read()[index].clone()
    }

    /// Specially cased for the first successor, the hottest of the list.
    pub fn get_first_successor(&self) -> NodeRef {
        self.successors.read()[0].clone()
    }

    pub fn set_successor(&self, index: usize, successor: NodeRef) {
        self.successors.write()[index] = successor;
    }

    pub fn set_first_successor(&self, successor: NodeRef) {
        self.successors.write()[0] = successor;
    }

    pub fn get_finger(&self, index: usize) -> NodeRef {
        self.fingers.read()[index].clone()
    }

    /// No wholesale finger-table get/set: fingers are only ever touched one
    /// index at a time, by `fix_fingers`.
    pub fn set_finger(&self, index: usize, finger: NodeRef) {
        self.fingers.write()[index] = finger;
    }

    pub fn finger_id(&self, index: usize) -> Identifier {
        self.finger_ids[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_table_has_fixed_lengths_and_empty_slots() {
        let t = RoutingTable::new(100, 10, 3);
        assert_eq!(t.get_successors().len(), 3);
        assert!(t.get_successors().iter().all(|n| n.is_empty(10)));
        assert!(t.get_predecessor().is_none());
        for i in 0..10 {
            assert!(t.get_finger(i).is_empty(10));
        }
    }

    #[test]
    fn finger_ids_follow_the_power_of_two_formula() {
        let t = RoutingTable::new(100, 10, 3);
        assert_eq!(t.finger_id(0), (100 + 1) % 1024);
        assert_eq!(t.finger_id(1), (100 + 2) % 1024);
        assert_eq!(t.finger_id(9), (100 + 512) % 1024);
    }

    #[test]
    fn set_first_successor_only_touches_index_zero() {
        let t = RoutingTable::new(100, 10, 3);
        t.set_successors(vec![
            NodeRef::new(1, "a", "1"),
            NodeRef::new(2, "b", "2"),
            NodeRef::new(3, "c", "3"),
        ]);
        t.set_first_successor(NodeRef::new(9, "z", "9"));
        let list = t.get_successors();
        assert_eq!(list[0].id, 9);
        assert_eq!(list[1].id, 2);
        assert_eq!(list[2].id, 3);
    }
}
