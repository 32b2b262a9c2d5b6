//! Southbound connector interface (§4.6). Two concrete connectors: the
//! uSDN UDP connector (decodes the wire codec in `usdn::wire`) and the
//! RPL ICMP connector (recognises DAO messages as implicit joins).
//! `src` is passed in by the runtime that owns the actual socket —
//! this crate's scope stops at decode/encode, not socket I/O (§1 out
//! of scope: "the underlying IPv6 stack, UDP sockets").

use crate::controller::action::{Action, Response};
use crate::error::{SdnError, SdnResult};
use crate::flow_table::rule::{ActionKind, ActionRule, MatchRule, Operator};
use crate::usdn::wire::{CfgPayload, FtsPayload, FtqPayload, UsdnMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorId {
    UsdnUdp,
    RplIcmp,
}

/// ICMPv6 type for an RPL DAO message (RFC 6550 §6).
const ICMPV6_RPL_DAO: u8 = 155;

pub trait SouthboundConnector: Send {
    fn id(&self) -> ConnectorId;
    fn decode(&self, bytes: &[u8], src: u16) -> SdnResult<Option<Action>>;
    fn encode(&self, action: &Action, response: &Response, tx_id: u8) -> SdnResult<Vec<u8>>;
}

pub struct UsdnUdpConnector;

impl SouthboundConnector for UsdnUdpConnector {
    fn id(&self) -> ConnectorId {
        ConnectorId::UsdnUdp
    }

    fn decode(&self, bytes: &[u8], src: u16) -> SdnResult<Option<Action>> {
        let (_header, msg) = UsdnMessage::decode(bytes)?;
        let action = match msg {
            UsdnMessage::CJoin(_) => Action::Join { node_addr: src },
            UsdnMessage::Nsu(payload) => Action::NetUpdate { src, snapshot: payload },
            UsdnMessage::Ftq(FtqPayload { tx_id, data, .. }) => {
                let dst = data
                    .len()
                    .checked_sub(2)
                    .map(|cut| u16::from_be_bytes([data[cut], data[cut + 1]]))
                    .ok_or_else(|| SdnError::Malformed("FTQ payload too short to carry a node id".into()))?;
                Action::Routing { tx_id, src, dst }
            }
            other => {
                return Err(SdnError::Malformed(format!(
                    "{:?} is not a southbound ingress message",
                    other
                )))
            }
        };
        Ok(Some(action))
    }

    fn encode(&self, action: &Action, response: &Response, tx_id: u8) -> SdnResult<Vec<u8>> {
        let net = 1;
        let flow = tx_id as u16;
        let msg = match response {
            Response::Cfg(cfg) => UsdnMessage::Cfg(*cfg),
            Response::Ack => UsdnMessage::CAck,
            Response::Nack => UsdnMessage::CNack,
            Response::Routing { tx_id, compression, ids } => {
                let Action::Routing { dst, .. } = action else {
                    return Err(SdnError::Malformed("routing response without a routing action".into()));
                };
                let m = MatchRule::new(Operator::Eq, 0, false, &dst.to_be_bytes());
                let mut data = vec![*compression, ids.len() as u8];
                for id in ids {
                    data.extend_from_slice(&id.to_be_bytes());
                }
                let a = ActionRule::new(ActionKind::Srh, 0, &data);
                UsdnMessage::Fts(FtsPayload { tx_id: *tx_id, is_default: true, m, a })
            }
        };
        Ok(msg.encode(net, flow))
    }
}

pub struct RplIcmpConnector;

impl SouthboundConnector for RplIcmpConnector {
    fn id(&self) -> ConnectorId {
        ConnectorId::RplIcmp
    }

    fn decode(&self, bytes: &[u8], src: u16) -> SdnResult<Option<Action>> {
        if bytes.first() != Some(&ICMPV6_RPL_DAO) {
            return Ok(None);
        }
        Ok(Some(Action::Join { node_addr: src }))
    }

    fn encode(&self, _action: &Action, _response: &Response, _tx_id: u8) -> SdnResult<Vec<u8>> {
        // RPL's own ack path is out of scope (§1); the controller never
        // talks back over this connector.
        Err(SdnError::NotConfigured)
    }
}

/// A `CfgPayload` placeholder used only by tests in this module.
#[cfg(test)]
fn sample_cfg() -> CfgPayload {
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
