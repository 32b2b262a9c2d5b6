//! RPL-derived routing app (§4.7, ROUTING alternative): builds a path
//! via the RPL DODAG root instead of the DFS graph search, for
//! deployments where the mesh's own RPL instance already knows a
//! route. The actual RPL protocol is out of this crate's scope (§1);
//! `RplNodeStore` is the sketched external collaborator interface the
//! app is built against.

use super::App;
use crate::controller::action::{Action, Response};
use crate::controller::network::NetworkModel;
use std::net::Ipv6Addr;
use std::time::Instant;

pub trait RplNodeStore: Send {
    /// Ascending path from `node` to the DODAG root, inclusive of both.
    fn path_to_root(&self, node: u16) -> Option<Vec<u16>>;
    fn address_of(&self, id: u16) -> Option<Ipv6Addr>;
}

fn common_prefix_bytes(a: Ipv6Addr, b: Ipv6Addr) -> u8 {
    a.octets().iter().zip(b.octets().iter()).take_while(|(x, y)| x == y).count() as u8
}

pub struct RplRoutingApp<S> {
    store: S,
}

impl<S: RplNodeStore> RplRoutingApp<S> {
    pub fn new(store: S) -> Self {
        RplRoutingApp { store }
    }

    pub fn route(&self, src: u16, dst: u16) -> Option<(u8, Vec<u16>)> {
        let up = self.store.path_to_root(src)?;
        let down = self.store.path_to_root(dst)?;

        let src_addr = self.store.address_of(src)?;
        let dst_addr = self.store.address_of(dst)?;
        let root_addr = self.store.address_of(*up.last()?)?;

        // Split reference, mirroring the original's count_matching_bytes
        // loop: up-path hops (excluding src and the root) compare
        // against src, the root itself compares against dst, and
        // down-path hops (excluding dst and the root) compare against
        // dst. A single reference point (e.g. always dst) under-counts
        // the match on the src side of the path.
        let mut compression = common_prefix_bytes(root_addr, dst_addr);
        for &id in up.get(1..up.len().saturating_sub(1)).unwrap_or(&[]) {
            let addr = self.store.address_of(id)?;
            compression = compression.min(common_prefix_bytes(addr, src_addr));
        }
        for &id in down.get(1..down.len().saturating_sub(1)).unwrap_or(&[]) {
            let addr = self.store.address_of(id)?;
            compression = compression.min(common_prefix_bytes(addr, dst_addr));
        }
        let compression = compression.min(15);

        let mut path = up;
        path.extend(down[..down.len().saturating_sub(1)].iter().rev().copied());
        Some((compression, path))
    }
}

impl<S: RplNodeStore> App for RplRoutingApp<S> {
    fn run(&mut self, action: &Action, _network: &mut NetworkModel, _now: Instant) -> Option<Response> {
        let Action::Routing { tx_id, src, dst } = action else { return None };
        let (compression, ids) = self.route(*src, *dst)?;
        Some(Response::Routing { tx_id: *tx_id, compression, ids })
    }
}
