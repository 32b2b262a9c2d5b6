//! C6 dispatch loop (§4.6). A single cooperative task: pop one
//! message, decode it through its originating connector, run the
//! registered apps for its `ActionKind` in priority order, and hand
//! the first response (if any) back to the same connector to encode
//! and send.

use crate::controller::action::{Action, ActionKind, Response};
use crate::controller::apps::App;
use crate::controller::connector::{ConnectorId, SouthboundConnector};
use crate::controller::network::NetworkModel;
use crate::controller::queue::IngressQueue;
use crate::logger::{self, BreadcrumbFlags};
use rustc_hash::FxHashMap;
use std::time::Instant;

/// What the dispatcher asks its owner to physically send.
pub struct Outgoing {
    pub connector: ConnectorId,
    pub dest: u16,
    pub bytes: Vec<u8>,
}

pub struct Dispatcher {
    connectors: FxHashMap<ConnectorId, Box<dyn SouthboundConnector>>,
    apps: FxHashMap<ActionKind, Vec<Box<dyn App>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher { connectors: FxHashMap::default(), apps: FxHashMap::default() }
    }

    pub fn register_connector(&mut self, connector: Box<dyn SouthboundConnector>) {
        self.connectors.insert(connector.id(), connector);
    }

    pub fn register_app(&mut self, kind: ActionKind, app: Box<dyn App>) {
        self.apps.entry(kind).or_default().push(app);
    }

    /// Runs the time-driven retry sweep for every app registered under
    /// `kind`, encoding any resulting responses through `connector`.
    pub fn poll_retries(
        &mut self,
        kind: ActionKind,
        connector: ConnectorId,
        network: &mut NetworkModel,
        ids: &[u16],
        now: Instant,
    ) -> Vec<Outgoing> {
        let mut out = Vec::new();
        let Some(apps) = self.apps.get_mut(&kind) else { return out };
        let Some(conn) = self.connectors.get(&connector) else { return out };
        for app in apps.iter_mut() {
            for (dest, response) in app.poll_retries(network, ids, now) {
                let tx_id = match &response {
                    Response::Routing { tx_id, .. } => *tx_id,
                    _ => 0,
                };
                let action = Action::Join { node_addr: dest };
                if let Ok(bytes) = conn.encode(&action, &response, tx_id) {
                    out.push(Outgoing { connector, dest, bytes });
                }
            }
        }
        out
    }

    /// Drains exactly one queued packet, matching §4.6 "yields after
    /// one message". Returns `None` on an empty queue, a decode
    /// failure, or no response being produced (NETUPDATE still
    /// short-circuits the network model even without a response).
    pub fn dispatch_one(
        &mut self,
        queue: &mut IngressQueue,
        network: &mut NetworkModel,
        now: Instant,
    ) -> Option<Outgoing> {
        let packet = queue.remove()?;
        let connector = self.connectors.get(&packet.connector)?;
        let action = match connector.decode(&packet.bytes, packet.src) {
            Ok(Some(action)) => action,
            Ok(None) => return None,
            Err(err) => {
                logger::warn(format!("dispatch: decode failed on {:?}: {err}", packet.connector));
                return None;
            }
        };
        logger::log_in("ACTION", packet.src, 0, 0, packet.hop_count);

        if let Action::NetUpdate { src, snapshot } = &action {
            if let Err(err) = network.update(*src, *src, snapshot.cfg_id, snapshot.rank) {
                logger::warn(format!("dispatch: network update failed: {err}"));
            }
            for link in &snapshot.links {
                let _ = network.link_update(*src, link.nbr_id, link.rssi);
            }
        }

        let kind = action.kind();
        let mut response = None;
        if let Some(apps) = self.apps.get_mut(&kind) {
            for app in apps.iter_mut() {
                if let Some(r) = app.run(&action, network, now) {
                    response = Some(r);
                    break;
                }
            }
        }
        let response = response?;
        let connector = self.connectors.get(&packet.connector)?;
        let tx_id = match &response {
            Response::Routing { tx_id, .. } => *tx_id,
            _ => 0,
        };
        match connector.encode(&action, &response, tx_id) {
            Ok(bytes) => {
                logger::log_out("RESPONSE", 0, action.src(), tx_id as u16);
                Some(Outgoing { connector: packet.connector, dest: action.src(), bytes })
            }
            Err(err) => {
                logger::warn(format!("dispatch: encode failed: {err}"));
                None
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::apps::JoinApp;
    use crate::controller::connector::UsdnUdpConnector;
    use crate::usdn::wire::{CfgPayload, UsdnMessage};

    fn cfg_template() -> CfgPayload {
        CfgPayload {
            sdn_net: 1,
            cfg_id: 1,
            ft_lifetime_ticks: 300_000,
            query_full: 0,
            query_idx: 24,
            query_len: 16,
            update_period: 60,
            rpl_dio_interval: 32,
            rpl_dfrt_lifetime: 120,
        }
    }

    #[test]
    fn cjoin_flows_through_to_cfg_response() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_connector(Box::new(UsdnUdpConnector));
        dispatcher.register_app(ActionKind::Join, Box::new(JoinApp::new(cfg_template())));

        let mut network = NetworkModel::new(8, 4);
        let mut queue = IngressQueue::new(4);
        let bytes =
            UsdnMessage::CJoin(crate::usdn::wire::NsuPayload { cfg_id: 0, rank: 0, links: vec![] }).encode(1, 0);
        queue.add(ConnectorId::UsdnUdp, 9, &bytes, 0, 0).unwrap();

        let out = dispatcher.dispatch_one(&mut queue, &mut network, Instant::now()).unwrap();
        assert_eq!(out.dest, 9);
        let (_, msg) = UsdnMessage::decode(&out.bytes).unwrap();
        assert_eq!(msg, UsdnMessage::Cfg(cfg_template()));
    }

    #[test]
    fn empty_queue_yields_nothing() {
        let mut dispatcher = Dispatcher::new();
        let mut network = NetworkModel::new(8, 4);
        let mut queue = IngressQueue::new(4);
        assert!(dispatcher.dispatch_one(&mut queue, &mut network, Instant::now()).is_none());
    }

    #[test]
    fn netupdate_updates_network_even_without_response() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_connector(Box::new(UsdnUdpConnector));
        let mut network = NetworkModel::new(8, 4);
        let mut queue = IngressQueue::new(4);
        let bytes = UsdnMessage::Nsu(crate::usdn::wire::NsuPayload { cfg_id: 3, rank: 1, links: vec![] }).encode(1, 0);
        queue.add(ConnectorId::UsdnUdp, 5, &bytes, 0, 0).unwrap();

        let out = dispatcher.dispatch_one(&mut queue, &mut network, Instant::now());
        assert!(out.is_none());
        assert_eq!(network.get(5).unwrap().cfg_id, 3);
    }
}
