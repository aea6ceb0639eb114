//! Node descriptor: an immutable `(id, ip, port)` triple, grounded on
//! `node/model.go`'s `NodeInfo`.

use serde::{Deserialize, Serialize};

use crate::identifier::{two_pow_m, Identifier};

/// A reference to a peer on the ring. Cheap to clone; passed by value
/// throughout the routing and replication code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: Identifier,
    pub ip: String,
    pub port: String,
}

impl NodeRef {
    pub fn new(id: Identifier, ip: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            id,
            ip: ip.into(),
            port: port.into(),
        }
    }

    /// The wire-compatible "unset" placeholder: an out-of-range id paired
    /// with blank address fields. Kept for call sites (wire encoding,
    /// `printstate`) that want a concrete empty value rather than
    /// `Option<NodeRef>`; internal routing state prefers `Option`.
    pub fn empty() -> Self {
        Self {
            id: u64::MAX,
            ip: String::new(),
            port: String::new(),
        }
    }

    /// A NodeRef is empty when its id falls outside `[0, 2^m)` or either
    /// address field is blank.
    pub fn is_empty(&self, m: u32) -> bool {
        self.id >= two_pow_m(m) || self.ip.is_empty() || self.port.is_empty()
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeRef(id={}, addr={}:{})", self.id, self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sentinel_is_empty_for_any_reasonable_m() {
        let e = NodeRef::empty();
        assert!(e.is_empty(10));
        assert!(e.is_empty(63));
    }

    #[test]
    fn real_node_is_not_empty() {
        let n = NodeRef::new(100, "127.0.0.1", "9000");
        assert!(!n.is_empty(10));
    }

    #[test]
    fn blank_address_marks_empty_even_with_in_range_id() {
        let n = NodeRef::new(5, "", "9000");
        assert!(n.is_empty(10));
    }
}
