//! Tagged unions carried from connector through dispatcher to apps, and
//! back out again (§3 "Action record" / "Response record").
//!
//! Routing responses carry short node ids, not full IPv6 addresses:
//! the controller's graph and DFS/RPL apps never resolve a full
//! address, matching the original's `spath[]` of node ids. Expanding a
//! ROUTING response's ids into `srh::SrhRoute`'s `Ipv6Addr` hops is the
//! node-side runtime's job (it owns the node's address/prefix), not
//! the controller's.

use crate::usdn::wire::NsuPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    NetUpdate,
    Routing,
    Join,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    NetUpdate { src: u16, snapshot: NsuPayload },
    Routing { tx_id: u8, src: u16, dst: u16 },
    Join { node_addr: u16 },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::NetUpdate { .. } => ActionKind::NetUpdate,
            Action::Routing { .. } => ActionKind::Routing,
            Action::Join { .. } => ActionKind::Join,
        }
    }

    /// Originating address, copied into the response's destination
    /// before the connector sends it out (dispatch step 5).
    pub fn src(&self) -> u16 {
        match self {
            Action::NetUpdate { src, .. } => *src,
            Action::Routing { src, .. } => *src,
            Action::Join { node_addr } => *node_addr,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Routing { tx_id: u8, compression: u8, ids: Vec<u16> },
    Ack,
    Nack,
    Cfg(crate::usdn::wire::CfgPayload),
}
