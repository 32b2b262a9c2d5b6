//! JOIN app (§4.7): configures unconfigured nodes and retries CFG up
//! to `MAX_CFG_RETRIES` times until the node's `cfg_id` stops reading
//! zero, mirroring the original handshake timer callback.

use super::App;
use crate::config::{CFG_HANDSHAKE_DELAY_MAX, CFG_HANDSHAKE_DELAY_MIN, MAX_CFG_RETRIES};
use crate::controller::action::{Action, Response};
use crate::controller::network::NetworkModel;
use crate::usdn::wire::CfgPayload;
use rand::Rng;
use std::time::Instant;

pub struct JoinApp {
    cfg_template: CfgPayload,
}

impl JoinApp {
    pub fn new(cfg_template: CfgPayload) -> Self {
        JoinApp { cfg_template }
    }

    fn handshake_delay() -> std::time::Duration {
        let min = CFG_HANDSHAKE_DELAY_MIN.as_millis() as u64;
        let max = CFG_HANDSHAKE_DELAY_MAX.as_millis() as u64;
        std::time::Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    fn cfg_response(&self, cfg_id: u8) -> Response {
        let mut cfg = self.cfg_template;
        cfg.cfg_id = cfg_id;
        Response::Cfg(cfg)
    }

    /// Called from the owning runtime's tick loop. Re-checks every
    /// node with a pending handshake; re-emits CFG (and re-arms) while
    /// `tries < MAX_CFG_RETRIES`, otherwise stops the timer (S4).
    pub fn poll_retries(&self, network: &mut NetworkModel, ids: &[u16], now: Instant) -> Vec<(u16, Response)> {
        let mut out = Vec::new();
        for &id in ids {
            let Some(node) = network.get_mut(id) else { continue };
            if !node.handshake.pending {
                continue;
            }
            if node.cfg_id != 0 {
                node.handshake.pending = false;
                continue;
            }
            if !node.handshake_timer.poll_expired(now) {
                continue;
            }
            if node.handshake.tries >= MAX_CFG_RETRIES {
                node.handshake.pending = false;
                continue;
            }
            node.handshake.tries += 1;
            node.handshake_timer.start(Self::handshake_delay());
            out.push((id, self.cfg_response(self.cfg_template.cfg_id)));
        }
        out
    }
}

impl App for JoinApp {
    fn run(&mut self, action: &Action, network: &mut NetworkModel, _now: Instant) -> Option<Response> {
        let Action::Join { node_addr } = action else { return None };
        let node = network.heartbeat(*node_addr, *node_addr).ok()?;
        if node.cfg_id != 0 {
            return None;
        }
        node.handshake.tries = 1;
        node.handshake.pending = true;
        node.handshake_timer.start(Self::handshake_delay());
        Some(self.cfg_response(self.cfg_template.cfg_id))
    }

    fn poll_retries(&mut self, network: &mut NetworkModel, ids: &[u16], now: Instant) -> Vec<(u16, Response)> {
        JoinApp::poll_retries(self, network, ids, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> CfgPayload {
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
    fn s1_first_join_arms_handshake_and_returns_cfg() {
        let mut app = JoinApp::new(template());
        let mut net = NetworkModel::new(8, 4);
        let resp = app.run(&Action::Join { node_addr: 9 }, &mut net, Instant::now());
        assert_eq!(resp, Some(Response::Cfg(template())));
        assert!(net.get(9).unwrap().handshake.pending);
        assert_eq!(net.get(9).unwrap().handshake.tries, 1);
    }

    #[test]
    fn already_configured_node_is_not_re_handshaken() {
        let mut app = JoinApp::new(template());
        let mut net = NetworkModel::new(8, 4);
        net.update(9, 9, 1, 0).unwrap();
        let resp = app.run(&Action::Join { node_addr: 9 }, &mut net, Instant::now());
        assert_eq!(resp, None);
    }

    #[test]
    fn s4_retry_stops_after_max_tries() {
        let mut app = JoinApp::new(template());
        let mut net = NetworkModel::new(8, 4);
        app.run(&Action::Join { node_addr: 7 }, &mut net, Instant::now());

        let far_future = Instant::now() + std::time::Duration::from_secs(3600);
        let mut total_retries = 0;
        for _ in 0..MAX_CFG_RETRIES + 2 {
            let out = app.poll_retries(&mut net, &[7], far_future);
            total_retries += out.len();
        }
        // tries starts at 1 (the initial CFG from `run`); at most
        // MAX_CFG_RETRIES - 1 further retries before the timer stops.
        assert_eq!(total_retries, (MAX_CFG_RETRIES - 1) as usize);
        assert!(!net.get(7).unwrap().handshake.pending);
    }
}
