//! C6 + C7: the embedded SDN controller (Atom). Owns the ingress
//! queue, southbound connectors, dispatcher, network model, and the
//! registered applications.

pub mod action;
pub mod apps;
pub mod connector;
pub mod dispatcher;
pub mod network;
pub mod queue;

use crate::usdn::wire::CfgPayload;
use action::ActionKind;
use apps::JoinApp;
use connector::{ConnectorId, RplIcmpConnector, SouthboundConnector, UsdnUdpConnector};
use dispatcher::{Dispatcher, Outgoing};
use network::NetworkModel;
use queue::IngressQueue;
use std::time::Instant;

pub struct Controller {
    queue: IngressQueue,
    dispatcher: Dispatcher,
    network: NetworkModel,
    join_candidates: Vec<u16>,
}

impl Controller {
    pub fn new(
        ingress_queue_len: usize,
        max_nodes: usize,
        max_links_per_node: usize,
        cfg_template: CfgPayload,
    ) -> Self {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_connector(Box::new(UsdnUdpConnector) as Box<dyn SouthboundConnector>);
        dispatcher.register_connector(Box::new(RplIcmpConnector) as Box<dyn SouthboundConnector>);
        dispatcher.register_app(ActionKind::Join, Box::new(JoinApp::new(cfg_template)));
        dispatcher.register_app(ActionKind::Routing, Box::new(apps::DfsRoutingApp));

        Controller {
            queue: IngressQueue::new(ingress_queue_len),
            dispatcher,
            network: NetworkModel::new(max_nodes, max_links_per_node),
            join_candidates: Vec::new(),
        }
    }

    pub fn ingest(&mut self, connector: ConnectorId, src: u16, bytes: &[u8], ext_len: usize, hop_count: u8) -> crate::error::SdnResult<()> {
        if !self.join_candidates.contains(&src) {
            self.join_candidates.push(src);
        }
        self.queue.add(connector, src, bytes, ext_len, hop_count)
    }

    /// Runs one dispatch iteration plus the JOIN handshake retry sweep
    /// (§4.7 handshake timer callback). Called from the owning
    /// runtime's tick loop.
    pub fn poll(&mut self, now: Instant) -> Vec<Outgoing> {
        let mut out = Vec::new();
        if let Some(sent) = self.dispatcher.dispatch_one(&mut self.queue, &mut self.network, now) {
            out.push(sent);
        }
        out.extend(self.dispatcher.poll_retries(
            ActionKind::Join,
            ConnectorId::UsdnUdp,
            &mut self.network,
            &self.join_candidates,
            now,
        ));
        out
    }

    pub fn network(&self) -> &NetworkModel {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut NetworkModel {
        &mut self.network
    }
}

#[cfg(test)]
mod tests;
