//! Shortest-path routing app (§4.7): depth-first search over the
//! network graph, keeping the best (shortest) path found so far.

use super::App;
use crate::controller::action::{Action, Response};
use crate::controller::network::NetworkModel;
use std::time::Instant;

pub struct DfsRoutingApp;

impl DfsRoutingApp {
    /// Returns the ids of a shortest path from `src` to `dst`
    /// (inclusive of both endpoints), or `None` if none exists.
    pub fn shortest_path(network: &NetworkModel, src: u16, dst: u16) -> Option<Vec<u16>> {
        if !network.contains(src) || !network.contains(dst) {
            return None;
        }
        let upper_bound = network.len() + 1;
        let mut best: Option<Vec<u16>> = None;
        let mut stack = vec![src];
        Self::dfs(network, dst, &mut stack, &mut best, upper_bound);
        best
    }

    fn dfs(network: &NetworkModel, dst: u16, stack: &mut Vec<u16>, best: &mut Option<Vec<u16>>, upper_bound: usize) {
        let current = *stack.last().unwrap();
        if current == dst {
            if stack.len() <= best.as_ref().map(|b| b.len()).unwrap_or(upper_bound) {
                *best = Some(stack.clone());
            }
            return;
        }
        if stack.len() >= upper_bound {
            return;
        }
        for neighbor in network.neighbors(current) {
            if stack.contains(&neighbor) {
                continue;
            }
            stack.push(neighbor);
            Self::dfs(network, dst, stack, best, upper_bound);
            stack.pop();
        }
    }
}

impl App for DfsRoutingApp {
    fn run(&mut self, action: &Action, network: &mut NetworkModel, _now: Instant) -> Option<Response> {
        let Action::Routing { tx_id, src, dst } = action else { return None };
        let path = Self::shortest_path(network, *src, *dst)?;
        Some(Response::Routing { tx_id: *tx_id, compression: 15, ids: path })
    }
}
