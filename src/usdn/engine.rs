//! C5 engine: node-side state machine driving the controller handshake
//! and periodic node-state updates, plus the egress-miss query path.
//!
//! Timers are polled explicitly (`Timer::poll_expired`) from the
//! owning runtime's tick loop rather than spawned as independent
//! tokio tasks, matching the reference crate's `dial.rs` redial
//! pattern — the whole engine advances only when its owner calls
//! `poll(now)`, keeping it trivially single-threaded per §5.

use crate::config::SdnConfig;
use crate::error::{SdnError, SdnResult};
use crate::flow_table::rule::{ActionKind, ActionRule, Operator};
use crate::flow_table::{default_verdict, FlowTable, ListKind, MatchOutcome, Verdict};
use crate::logger::{self, BreadcrumbFlags};
use crate::packet_buffer::PacketBuffer;
use crate::timer::Timer;
use crate::usdn::wire::{CfgPayload, FtqPayload, FtsPayload, NsuLink, NsuPayload, UsdnMessage};
use rand::Rng;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    None,
    Connecting,
    ConnectedNew,
    Connected,
    Disconnected,
}

/// What the engine asks its owner to do after a poll or an ingest.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    Send(UsdnMessage),
    /// Install the controller's own address in the whitelist
    /// (`CONNECTED_NEW`'s one-shot setup).
    WhitelistController,
}

/// Outcome of running an outgoing datagram through the egress path.
/// FORWARD/FALLBACK/SRH/CALLBACK each carry their matched `ActionRule`
/// as distinct variants rather than one generic "forward" bucket,
/// matching the original driver's `action_handler()` switch, which
/// hands each off to genuinely different processing (neighbor-forward,
/// fallback-interface handoff, SRH insertion, destination-address
/// callback).
#[derive(Debug, Clone, PartialEq)]
pub enum EgressOutcome {
    Deliver,
    Drop,
    Forward(ActionRule),
    Fallback(ActionRule),
    Srh(ActionRule),
    Callback(ActionRule),
    /// The packet missed and has been buffered; `Send` the enclosed
    /// FTQ to the controller.
    Queried(UsdnMessage),
    NotConfigured,
}

pub struct Engine {
    node_id: u16,
    state: ControllerState,
    cfg: SdnConfig,
    flow_table: FlowTable,
    packet_buffer: PacketBuffer,
    periodic_timer: Timer,
    neighbors: Vec<NsuLink>,
    next_flow_id: u16,
}

impl Engine {
    pub fn new(node_id: u16, cfg: SdnConfig, mut flow_table: FlowTable, packet_buffer: PacketBuffer) -> Self {
        flow_table.register_action_handler(Box::new(move |action, _buf| {
            logger::breadcrumb(
                BreadcrumbFlags::FLOW_TABLE,
                format!("node:{node_id} action_handler kind={:?}", action.kind),
            );
            default_verdict(action.kind)
        }));
        Engine {
            node_id,
            state: ControllerState::None,
            cfg,
            flow_table,
            packet_buffer,
            periodic_timer: Timer::new(),
            neighbors: Vec::new(),
            next_flow_id: 0,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn config(&self) -> &SdnConfig {
        &self.cfg
    }

    pub fn flow_table(&mut self) -> &mut FlowTable {
        &mut self.flow_table
    }

    pub fn set_neighbors(&mut self, neighbors: Vec<NsuLink>) {
        self.neighbors = neighbors;
    }

    fn next_flow(&mut self) -> u16 {
        let id = self.next_flow_id;
        self.next_flow_id = self.next_flow_id.wrapping_add(1);
        id
    }

    fn nsu_or_join_payload(&self) -> NsuPayload {
        NsuPayload {
            cfg_id: self.cfg.cfg_id,
            rank: 0,
            links: self.neighbors.clone(),
        }
    }

    /// `NONE -> CONNECTING`. Returns the first CJOIN to send and arms
    /// the connecting-retry timer.
    pub fn boot(&mut self) -> UsdnMessage {
        self.state = ControllerState::Connecting;
        self.periodic_timer.start(self.connecting_retry_delay());
        let msg = UsdnMessage::CJoin(self.nsu_or_join_payload());
        logger::log_out(msg.msg_type().as_str(), self.node_id, 0, 0);
        msg
    }

    fn connecting_retry_delay(&self) -> Duration {
        Duration::from_secs(self.cfg.update_period_s as u64)
    }

    fn periodic_update_delay(&self) -> Duration {
        let jitter = if self.cfg.nsu_jitter_max.is_zero() {
            Duration::ZERO
        } else {
            let max_ms = self.cfg.nsu_jitter_max.as_millis().max(1) as u64;
            Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
        };
        Duration::from_secs(self.cfg.update_period_s as u64) + jitter
    }

    /// Drives the periodic timer; returns whatever message (CJOIN while
    /// connecting, NSU once connected) should go out on this tick.
    pub fn poll(&mut self, now: Instant) -> Vec<EngineAction> {
        let mut actions = Vec::new();
        if self.periodic_timer.poll_expired(now) {
            match self.state {
                ControllerState::Connecting => {
                    self.periodic_timer.start(self.connecting_retry_delay());
                    let msg = UsdnMessage::CJoin(self.nsu_or_join_payload());
                    logger::log_out(msg.msg_type().as_str(), self.node_id, 0, 0);
                    actions.push(EngineAction::Send(msg));
                }
                ControllerState::Connected => {
                    self.periodic_timer.start(self.periodic_update_delay());
                    let msg = UsdnMessage::Nsu(self.nsu_or_join_payload());
                    logger::log_out(msg.msg_type().as_str(), self.node_id, 0, 0);
                    actions.push(EngineAction::Send(msg));
                }
                _ => {}
            }
        }
        let _ = self.packet_buffer.poll(now);
        self.flow_table.poll(now);
        actions
    }

    /// Ingests a decoded uSDN message from the controller.
    pub fn ingest(&mut self, msg: UsdnMessage, now: Instant) -> SdnResult<Vec<EngineAction>> {
        logger::log_in(msg.msg_type().as_str(), 0, self.node_id, 0, 0);
        match msg {
            UsdnMessage::Cfg(cfg) => Ok(self.ingest_cfg(cfg)),
            UsdnMessage::Fts(fts) => self.ingest_fts(fts, now),
            UsdnMessage::CAck | UsdnMessage::CNack => Ok(Vec::new()),
            _ => Err(SdnError::Malformed("unexpected message direction".into())),
        }
    }

    fn ingest_cfg(&mut self, cfg: CfgPayload) -> Vec<EngineAction> {
        self.cfg.apply_cfg(&cfg);
        let mut actions = Vec::new();
        match self.state {
            ControllerState::Connecting | ControllerState::Disconnected | ControllerState::None => {
                self.state = ControllerState::ConnectedNew;
                actions.push(EngineAction::WhitelistController);
                self.state = ControllerState::Connected;
                self.periodic_timer.start(self.periodic_update_delay());
                logger::log_stat(format_args!("node:{} joined cfg_id:{}", self.node_id, cfg.cfg_id));
            }
            ControllerState::ConnectedNew | ControllerState::Connected => {
                // refresh: re-enter CONNECTED, re-arm the periodic timer.
                self.state = ControllerState::Connected;
                self.periodic_timer.reset(self.periodic_update_delay());
            }
        }
        actions
    }

    fn ingest_fts(&mut self, fts: FtsPayload, now: Instant) -> SdnResult<Vec<EngineAction>> {
        let lifetime = self.cfg.ft_lifetime.as_duration();
        let match_h = self.flow_table.create_match(
            fts.m.operator,
            fts.m.index,
            fts.m.needs_ext,
            &fts.m.data,
        )?;
        let action_h = self.flow_table.create_action(fts.a.kind, fts.a.index, &fts.a.data)?;
        self.flow_table
            .create_entry(ListKind::Main, match_h, action_h, lifetime, fts.is_default)?;

        if self.cfg.retry_after_query {
            if let Some((bytes, ext_len)) = self.packet_buffer.find(fts.tx_id) {
                let bytes = bytes.to_vec();
                let outcome = self.flow_table.check(ListKind::Main, &bytes, ext_len);
                self.packet_buffer.free(fts.tx_id);
                if let MatchOutcome::Action { action, .. } = outcome {
                    if action.kind == ActionKind::Forward || action.kind == ActionKind::Srh {
                        return Ok(vec![EngineAction::Send(UsdnMessage::CAck)]);
                    }
                }
            }
        }
        let _ = now;
        Ok(Vec::new())
    }

    /// Runs an outbound datagram through the default fast path and the
    /// main list; on a full miss, buffers it and emits an FTQ.
    pub fn egress(&mut self, buf: &[u8], ext_len: usize) -> SdnResult<EgressOutcome> {
        if self.state != ControllerState::Connected && self.state != ControllerState::ConnectedNew {
            return Ok(EgressOutcome::NotConfigured);
        }
        match self.flow_table.check_default(buf, ext_len) {
            MatchOutcome::Action { action, verdict } => return Ok(Self::resolve(action, verdict)),
            MatchOutcome::NoMatch => {}
        }
        match self.flow_table.check(ListKind::Main, buf, ext_len) {
            MatchOutcome::Action { action, verdict } => Ok(Self::resolve(action, verdict)),
            MatchOutcome::NoMatch => {
                let flow_id = self.next_flow();
                let slice_start = self.cfg.query_idx as usize;
                let slice_end = slice_start.saturating_add(self.cfg.query_len as usize);
                let payload = if self.cfg.query_full || slice_end > buf.len() {
                    buf.to_vec()
                } else {
                    buf[slice_start..slice_end].to_vec()
                };
                let id = self.packet_buffer.allocate(self.cfg.packetbuf_lifetime)?;
                self.packet_buffer.set(id, buf, ext_len)?;
                logger::log_buf("FTQ", self.node_id, 0, id as u16, 0);
                let msg = UsdnMessage::Ftq(FtqPayload { tx_id: id, index: self.cfg.query_idx, data: payload });
                logger::log_out(msg.msg_type().as_str(), self.node_id, 0, flow_id);
                Ok(EgressOutcome::Queried(msg))
            }
        }
    }

    /// FORWARD/FALLBACK/SRH/CALLBACK always hand off regardless of
    /// `verdict` — in the original, the handler's `goto forward` (etc.)
    /// runs unconditionally once that action kind matches, and only the
    /// purely local kinds (ACCEPT/DROP/QUERY/MODIFY) resolve through the
    /// handler's returned ACCEPT/DROP verdict.
    fn resolve(action: ActionRule, verdict: Verdict) -> EgressOutcome {
        match action.kind {
            ActionKind::Forward => return EgressOutcome::Forward(action),
            ActionKind::Fallback => return EgressOutcome::Fallback(action),
            ActionKind::Srh => return EgressOutcome::Srh(action),
            ActionKind::Callback => return EgressOutcome::Callback(action),
            _ => {}
        }
        match verdict {
            Verdict::Accept => EgressOutcome::Deliver,
            Verdict::Drop => EgressOutcome::Drop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SdnConfig;

    fn engine() -> Engine {
        let cfg = SdnConfig::default_const();
        Engine::new(9, cfg, FlowTable::new(8, 8, 8), PacketBuffer::new(8))
    }

    #[test]
    fn s1_cold_join_transitions_to_connected() {
        let mut eng = engine();
        let join = eng.boot();
        assert!(matches!(join, UsdnMessage::CJoin(_)));
        assert_eq!(eng.state(), ControllerState::Connecting);

        let cfg = CfgPayload {
            sdn_net: 1,
            cfg_id: 1,
            ft_lifetime_ticks: 300_000,
            query_full: 0,
            query_idx: 24,
            query_len: 16,
            update_period: 60,
            rpl_dio_interval: 32,
            rpl_dfrt_lifetime: 120,
        };
        let actions = eng.ingest(UsdnMessage::Cfg(cfg), Instant::now()).unwrap();
        assert_eq!(eng.state(), ControllerState::Connected);
        assert_eq!(eng.config().cfg_id, 1);
        assert!(actions.iter().any(|a| matches!(a, EngineAction::WhitelistController)));
    }

    #[test]
    fn not_configured_before_cfg_received() {
        let mut eng = engine();
        eng.boot();
        let outcome = eng.egress(&[1, 2, 3], 0).unwrap();
        assert_eq!(outcome, EgressOutcome::NotConfigured);
    }

    #[test]
    fn s2_egress_miss_buffers_and_emits_ftq() {
        let mut eng = engine();
        eng.boot();
        let cfg = CfgPayload {
            sdn_net: 1,
            cfg_id: 1,
            ft_lifetime_ticks: 300_000,
            query_full: 0,
            query_idx: 0,
            query_len: 2,
            update_period: 60,
            rpl_dio_interval: 32,
            rpl_dfrt_lifetime: 120,
        };
        eng.ingest(UsdnMessage::Cfg(cfg), Instant::now()).unwrap();

        let outcome = eng.egress(&[10, 0], 0).unwrap();
        match outcome {
            EgressOutcome::Queried(UsdnMessage::Ftq(ftq)) => {
                assert_eq!(ftq.tx_id, 0);
                assert_eq!(ftq.data, vec![10, 0]);
            }
            other => panic!("expected Queried(Ftq), got {other:?}"),
        }
    }

    #[test]
    fn s2_fts_install_and_retry() {
        let mut eng = engine();
        eng.boot();
        let cfg = CfgPayload {
            sdn_net: 1,
            cfg_id: 1,
            ft_lifetime_ticks: 300_000,
            query_full: 1,
            query_idx: 0,
            query_len: 0,
            update_period: 60,
            rpl_dio_interval: 32,
            rpl_dfrt_lifetime: 120,
        };
        eng.ingest(UsdnMessage::Cfg(cfg), Instant::now()).unwrap();

        let buf = [10u8, 0];
        let outcome = eng.egress(&buf, 0).unwrap();
        let tx_id = match outcome {
            EgressOutcome::Queried(UsdnMessage::Ftq(ftq)) => ftq.tx_id,
            other => panic!("expected Queried, got {other:?}"),
        };

        let m = crate::flow_table::rule::MatchRule::new(Operator::Eq, 0, false, &buf);
        let a = crate::flow_table::rule::ActionRule::new(ActionKind::Accept, 0, &[]);
        let fts = FtsPayload { tx_id, is_default: false, m, a };
        let actions = eng.ingest(UsdnMessage::Fts(fts), Instant::now()).unwrap();
        assert!(eng.flow_table().contains(&buf));
        assert!(actions.is_empty());
    }
}
