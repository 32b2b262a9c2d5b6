//! uSDN wire codec (§6). Every message opens with a 4-byte header
//! `{ net: u8, type: u8, flow: u16 }`, big-endian on the wire. The
//! manual offset/`copy_from_slice` style below is grounded on the
//! reference crate's `flow_manager/packet_builder.rs` and
//! `flow_manager/checksum.rs`, which build and parse wire buffers the
//! same way.

use crate::error::{SdnError, SdnResult};
use crate::flow_table::rule::{ActionKind, ActionRule, MatchRule, Operator};

/// Per the open question in the original spec: the FTS match/action
/// payload is always padded to this size on the wire, even when the
/// rule's `len` is smaller. Preserved here for on-wire compatibility
/// rather than "fixed" to a tight encoding.
pub const FTS_DATA_PAD: usize = 20;

pub const HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    Cfg = 0,
    CJoin = 1,
    Nsu = 2,
    CAck = 3,
    CNack = 4,
    Ftq = 5,
    Fts = 6,
    TrackRq = 7,
    Data = 8,
}

impl MsgType {
    pub fn from_u8(value: u8) -> SdnResult<Self> {
        Ok(match value {
            0 => MsgType::Cfg,
            1 => MsgType::CJoin,
            2 => MsgType::Nsu,
            3 => MsgType::CAck,
            4 => MsgType::CNack,
            5 => MsgType::Ftq,
            6 => MsgType::Fts,
            7 => MsgType::TrackRq,
            8 => MsgType::Data,
            other => return Err(SdnError::Malformed(format!("unknown uSDN type code {other}"))),
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MsgType::Cfg => "CFG",
            MsgType::CJoin => "CJOIN",
            MsgType::Nsu => "NSU",
            MsgType::CAck => "CACK",
            MsgType::CNack => "CNACK",
            MsgType::Ftq => "FTQ",
            MsgType::Fts => "FTS",
            MsgType::TrackRq => "TRACKRQ",
            MsgType::Data => "DATA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub net: u8,
    pub typ: MsgType,
    pub flow: u16,
}

impl Header {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.net);
        out.push(self.typ as u8);
        out.extend_from_slice(&self.flow.to_be_bytes());
    }

    pub fn decode(buf: &[u8]) -> SdnResult<Self> {
        if buf.len() < HEADER_LEN {
            return Err(SdnError::Malformed("header truncated".into()));
        }
        Ok(Header {
            net: buf[0],
            typ: MsgType::from_u8(buf[1])?,
            flow: u16::from_be_bytes([buf[2], buf[3]]),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NsuLink {
    pub nbr_id: u16,
    pub rssi: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsuPayload {
    pub cfg_id: u8,
    pub rank: u8,
    pub links: Vec<NsuLink>,
}

impl NsuPayload {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.cfg_id);
        out.push(self.rank);
        out.push(self.links.len() as u8);
        for link in &self.links {
            out.extend_from_slice(&link.nbr_id.to_be_bytes());
            out.extend_from_slice(&link.rssi.to_be_bytes());
        }
    }

    pub fn decode(buf: &[u8]) -> SdnResult<Self> {
        if buf.len() < 3 {
            return Err(SdnError::Malformed("NSU payload truncated".into()));
        }
        let cfg_id = buf[0];
        let rank = buf[1];
        let num_links = buf[2] as usize;
        let mut links = Vec::with_capacity(num_links);
        let mut cursor = 3;
        for _ in 0..num_links {
            if cursor + 4 > buf.len() {
                return Err(SdnError::Malformed("NSU link truncated".into()));
            }
            let nbr_id = u16::from_be_bytes([buf[cursor], buf[cursor + 1]]);
            let rssi = i16::from_be_bytes([buf[cursor + 2], buf[cursor + 3]]);
            links.push(NsuLink { nbr_id, rssi });
            cursor += 4;
        }
        Ok(NsuPayload { cfg_id, rank, links })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgPayload {
    pub sdn_net: u8,
    pub cfg_id: u8,
    pub ft_lifetime_ticks: u32,
    pub query_full: u8,
    pub query_idx: u8,
    pub query_len: u8,
    pub update_period: u16,
    pub rpl_dio_interval: u8,
    pub rpl_dfrt_lifetime: u8,
}

impl CfgPayload {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.sdn_net);
        out.push(self.cfg_id);
        out.extend_from_slice(&self.ft_lifetime_ticks.to_be_bytes());
        out.push(self.query_full);
        out.push(self.query_idx);
        out.push(self.query_len);
        out.extend_from_slice(&self.update_period.to_be_bytes());
        out.push(self.rpl_dio_interval);
        out.push(self.rpl_dfrt_lifetime);
    }

    pub fn decode(buf: &[u8]) -> SdnResult<Self> {
        if buf.len() < 12 {
            return Err(SdnError::Malformed("CFG payload truncated".into()));
        }
        Ok(CfgPayload {
            sdn_net: buf[0],
            cfg_id: buf[1],
            ft_lifetime_ticks: u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]),
            query_full: buf[6],
            query_idx: buf[7],
            query_len: buf[8],
            update_period: u16::from_be_bytes([buf[9], buf[10]]),
            rpl_dio_interval: buf[11],
            rpl_dfrt_lifetime: *buf.get(12).ok_or(SdnError::Malformed("CFG payload truncated".into()))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtqPayload {
    pub tx_id: u8,
    pub index: u8,
    pub data: Vec<u8>,
}

impl FtqPayload {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.tx_id);
        out.push(self.index);
        out.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.data);
    }

    pub fn decode(buf: &[u8]) -> SdnResult<Self> {
        if buf.len() < 4 {
            return Err(SdnError::Malformed("FTQ payload truncated".into()));
        }
        let tx_id = buf[0];
        let index = buf[1];
        let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        let data = buf.get(4..4 + length).ok_or(SdnError::Malformed("FTQ data truncated".into()))?;
        Ok(FtqPayload { tx_id, index, data: data.to_vec() })
    }
}

fn encode_match(m: &MatchRule, out: &mut Vec<u8>) {
    out.push(m.operator.as_i8() as u8);
    out.push(m.index);
    out.push(m.len);
    out.push(m.needs_ext as u8);
    let mut padded = [0u8; FTS_DATA_PAD];
    let len = m.len as usize;
    padded[..len].copy_from_slice(&m.data[..len]);
    out.extend_from_slice(&padded);
}

fn decode_match(buf: &[u8]) -> SdnResult<(MatchRule, usize)> {
    if buf.len() < 4 + FTS_DATA_PAD {
        return Err(SdnError::Malformed("match payload truncated".into()));
    }
    let operator = Operator::from_i8(buf[0] as i8)
        .ok_or_else(|| SdnError::Malformed(format!("unknown operator code {}", buf[0] as i8)))?;
    let index = buf[1];
    let len = buf[2];
    let needs_ext = buf[3] != 0;
    let data_start = 4;
    let len_usize = len as usize;
    if len_usize > FTS_DATA_PAD {
        return Err(SdnError::Malformed("match len exceeds padded field".into()));
    }
    let data = &buf[data_start..data_start + len_usize];
    let rule = MatchRule::new(operator, index, needs_ext, data);
    Ok((rule, 4 + FTS_DATA_PAD))
}

fn encode_action(a: &ActionRule, out: &mut Vec<u8>) {
    out.push(a.kind as u8);
    out.push(a.index);
    out.push(a.len);
    let mut padded = [0u8; FTS_DATA_PAD];
    let len = a.len as usize;
    padded[..len].copy_from_slice(&a.data[..len]);
    out.extend_from_slice(&padded);
}

fn decode_action(buf: &[u8]) -> SdnResult<(ActionRule, usize)> {
    if buf.len() < 3 + FTS_DATA_PAD {
        return Err(SdnError::Malformed("action payload truncated".into()));
    }
    let kind = ActionKind::from_u8(buf[0])
        .ok_or_else(|| SdnError::Malformed(format!("unknown action code {}", buf[0])))?;
    let index = buf[1];
    let len = buf[2];
    let len_usize = len as usize;
    if len_usize > FTS_DATA_PAD {
        return Err(SdnError::Malformed("action len exceeds padded field".into()));
    }
    let data = &buf[3..3 + len_usize];
    let rule = ActionRule::new(kind, index, data);
    Ok((rule, 3 + FTS_DATA_PAD))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtsPayload {
    pub tx_id: u8,
    pub is_default: bool,
    pub m: MatchRule,
    pub a: ActionRule,
}

impl FtsPayload {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.tx_id);
        out.push(self.is_default as u8);
        encode_match(&self.m, out);
        encode_action(&self.a, out);
    }

    pub fn decode(buf: &[u8]) -> SdnResult<Self> {
        if buf.len() < 2 {
            return Err(SdnError::Malformed("FTS payload truncated".into()));
        }
        let tx_id = buf[0];
        let is_default = buf[1] != 0;
        let (m, m_len) = decode_match(&buf[2..])?;
        let (a, _a_len) = decode_action(&buf[2 + m_len..])?;
        Ok(FtsPayload { tx_id, is_default, m, a })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsdnMessage {
    Cfg(CfgPayload),
    CJoin(NsuPayload),
    Nsu(NsuPayload),
    CAck,
    CNack,
    Ftq(FtqPayload),
    Fts(FtsPayload),
}

impl UsdnMessage {
    pub fn msg_type(&self) -> MsgType {
        match self {
            UsdnMessage::Cfg(_) => MsgType::Cfg,
            UsdnMessage::CJoin(_) => MsgType::CJoin,
            UsdnMessage::Nsu(_) => MsgType::Nsu,
            UsdnMessage::CAck => MsgType::CAck,
            UsdnMessage::CNack => MsgType::CNack,
            UsdnMessage::Ftq(_) => MsgType::Ftq,
            UsdnMessage::Fts(_) => MsgType::Fts,
        }
    }

    pub fn encode(&self, net: u8, flow: u16) -> Vec<u8> {
        let mut out = Vec::new();
        Header { net, typ: self.msg_type(), flow }.encode(&mut out);
        match self {
            UsdnMessage::Cfg(p) => p.encode(&mut out),
            UsdnMessage::CJoin(p) | UsdnMessage::Nsu(p) => p.encode(&mut out),
            UsdnMessage::CAck | UsdnMessage::CNack => {}
            UsdnMessage::Ftq(p) => p.encode(&mut out),
            UsdnMessage::Fts(p) => p.encode(&mut out),
        }
        out
    }

    pub fn decode(buf: &[u8]) -> SdnResult<(Header, Self)> {
        let header = Header::decode(buf)?;
        let payload = &buf[HEADER_LEN..];
        let msg = match header.typ {
            MsgType::Cfg => UsdnMessage::Cfg(CfgPayload::decode(payload)?),
            MsgType::CJoin => UsdnMessage::CJoin(NsuPayload::decode(payload)?),
            MsgType::Nsu => UsdnMessage::Nsu(NsuPayload::decode(payload)?),
            MsgType::CAck => UsdnMessage::CAck,
            MsgType::CNack => UsdnMessage::CNack,
            MsgType::Ftq => UsdnMessage::Ftq(FtqPayload::decode(payload)?),
            MsgType::Fts => UsdnMessage::Fts(FtsPayload::decode(payload)?),
            MsgType::TrackRq | MsgType::Data => {
                return Err(SdnError::Malformed(format!("{} not supported by this codec", header.typ.as_str())))
            }
        };
        Ok((header, msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let h = Header { net: 1, typ: MsgType::CJoin, flow: 42 };
        let mut out = Vec::new();
        h.encode(&mut out);
        assert_eq!(Header::decode(&out).unwrap(), h);
    }

    #[test]
    fn cjoin_round_trip_s1() {
        let msg = UsdnMessage::CJoin(NsuPayload { cfg_id: 0, rank: 0, links: vec![] });
        let encoded = msg.encode(1, 0);
        let (header, decoded) = UsdnMessage::decode(&encoded).unwrap();
        assert_eq!(header, Header { net: 1, typ: MsgType::CJoin, flow: 0 });
        assert_eq!(decoded, msg);
    }

    #[test]
    fn cfg_round_trip_s1() {
        let msg = UsdnMessage::Cfg(CfgPayload {
            sdn_net: 1,
            cfg_id: 1,
            ft_lifetime_ticks: 300_000,
            query_full: 0,
            query_idx: 24,
            query_len: 16,
            update_period: 60,
            rpl_dio_interval: 32,
            rpl_dfrt_lifetime: 120,
        });
        let encoded = msg.encode(1, 0);
        let (_, decoded) = UsdnMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn nsu_with_links_round_trips() {
        let msg = UsdnMessage::Nsu(NsuPayload {
            cfg_id: 1,
            rank: 2,
            links: vec![NsuLink { nbr_id: 9, rssi: -42 }, NsuLink { nbr_id: 10, rssi: -10 }],
        });
        let encoded = msg.encode(1, 5);
        let (_, decoded) = UsdnMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn ftq_round_trip_s2() {
        let msg = UsdnMessage::Ftq(FtqPayload { tx_id: 7, index: 0, data: vec![0; 16] });
        let encoded = msg.encode(1, 7);
        let (header, decoded) = UsdnMessage::decode(&encoded).unwrap();
        assert_eq!(header.flow, 7);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn fts_round_trip_preserves_padding() {
        let m = MatchRule::new(Operator::Eq, 24, false, &[1, 2, 3]);
        let a = ActionRule::new(ActionKind::Srh, 0, &[15, 3]);
        let msg = UsdnMessage::Fts(FtsPayload { tx_id: 7, is_default: true, m: m.clone(), a: a.clone() });
        let encoded = msg.encode(1, 7);
        // header(4) + tx_id(1) + is_default(1) + match(4+20) + action(3+20)
        assert_eq!(encoded.len(), 4 + 2 + 24 + 23);
        let (_, decoded) = UsdnMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn cack_cnack_are_header_only() {
        let ack = UsdnMessage::CAck.encode(1, 1);
        assert_eq!(ack.len(), HEADER_LEN);
        let (_, decoded) = UsdnMessage::decode(&ack).unwrap();
        assert_eq!(decoded, UsdnMessage::CAck);
    }

    #[test]
    fn unknown_type_code_is_malformed() {
        let buf = [1u8, 99, 0, 0];
        assert!(UsdnMessage::decode(&buf).is_err());
    }

    #[test]
    fn truncated_header_is_malformed() {
        assert!(UsdnMessage::decode(&[1, 2]).is_err());
    }
}
