//! C7 network model: a flat bounded set of node records keyed by short
//! id, maintained by heartbeats and node-state updates. Grounded on
//! the reference crate's `rustc_hash::FxHashMap`-keyed connection table
//! (`flow_manager/state.rs`), generalised from socket keys to node ids.

use crate::error::{SdnError, SdnResult};
use crate::timer::Timer;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub dest_id: u16,
    pub rssi: i16,
    pub status: LinkStatus,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub tries: u8,
    /// True once a CFG response has gone out and we're waiting on an
    /// acknowledging NSU/CJOIN.
    pub pending: bool,
}

#[derive(Debug, PartialEq)]
pub struct Node {
    pub id: u16,
    pub addr: u16,
    pub cfg_id: u8,
    pub rank: u8,
    pub handshake: Handshake,
    pub handshake_timer: Timer,
    pub links: Vec<Link>,
}

pub struct NetworkModel {
    max_nodes: usize,
    max_links_per_node: usize,
    nodes: FxHashMap<u16, Node>,
}

impl NetworkModel {
    pub fn new(max_nodes: usize, max_links_per_node: usize) -> Self {
        NetworkModel { max_nodes, max_links_per_node, nodes: FxHashMap::default() }
    }

    pub fn get(&self, id: u16) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: u16) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn upsert(&mut self, id: u16, addr: u16) -> SdnResult<&mut Node> {
        if !self.nodes.contains_key(&id) && self.nodes.len() >= self.max_nodes {
            return Err(SdnError::PoolFull { pool: "controller.network.nodes" });
        }
        Ok(self.nodes.entry(id).or_insert_with(|| Node {
            id,
            addr,
            cfg_id: 0,
            rank: 0,
            handshake: Handshake::default(),
            handshake_timer: Timer::new(),
            links: Vec::new(),
        }))
    }

    /// Upserts by id, copying the address if changed. Never touches
    /// `cfg_id`/`rank`.
    pub fn heartbeat(&mut self, id: u16, addr: u16) -> SdnResult<&mut Node> {
        let node = self.upsert(id, addr)?;
        node.addr = addr;
        Ok(node)
    }

    /// Heartbeat plus config/rank fields, as carried by an NSU.
    pub fn update(&mut self, id: u16, addr: u16, cfg_id: u8, rank: u8) -> SdnResult<&mut Node> {
        let node = self.upsert(id, addr)?;
        node.addr = addr;
        node.cfg_id = cfg_id;
        node.rank = rank;
        Ok(node)
    }

    /// Upserts an edge on `src`'s link list, creating a shell node for
    /// `dst_id` if one doesn't exist yet (I3).
    pub fn link_update(&mut self, src: u16, dst_id: u16, rssi: i16) -> SdnResult<()> {
        if self.get(dst_id).is_none() {
            self.upsert(dst_id, dst_id)?;
        }
        let max_links_per_node = self.max_links_per_node;
        let node = self.upsert(src, src)?;
        if node.links.len() >= max_links_per_node {
            if let Some(existing) = node.links.iter_mut().find(|l| l.dest_id == dst_id) {
                existing.rssi = rssi;
                existing.status = LinkStatus::Up;
                return Ok(());
            }
            return Err(SdnError::PoolFull { pool: "controller.network.links" });
        }
        match node.links.iter_mut().find(|l| l.dest_id == dst_id) {
            Some(existing) => {
                existing.rssi = rssi;
                existing.status = LinkStatus::Up;
            }
            None => node.links.push(Link { dest_id: dst_id, rssi, status: LinkStatus::Up }),
        }
        Ok(())
    }

    /// Full adjacency snapshot used by the DFS routing app. Returns
    /// the neighbor ids of `id`, empty if the node is unknown.
    pub fn neighbors(&self, id: u16) -> Vec<u16> {
        self.nodes
            .get(&id)
            .map(|n| n.links.iter().filter(|l| l.status == LinkStatus::Up).map(|l| l.dest_id).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, id: u16) -> bool {
        self.nodes.contains_key(&id)
    }
}
