//! C4: source-route emitter. Writes an IPv6 Routing Header + SDN source
//! routing header extension in front of an outgoing datagram, given an
//! ordered list of hop addresses.
//!
//! The original `sdn_ext_insert_srh` index arithmetic (pointer/offset
//! math over a raw `uip_buf`) traced out ambiguously by hand against a
//! few example routes — see DESIGN.md for the specific case that didn't
//! resolve cleanly. Rather than guess at a reconstruction, this emitter
//! is built directly from the closed-form in the specification (the
//! `ext_len` formula and the S5 worked example), which is unambiguous
//! and has a reference answer to test against; the manual byte-buffer
//! construction style below (explicit offsets, `copy_from_slice`) is
//! grounded on the reference crate's `flow_manager/packet_builder.rs`.

use crate::error::{SdnError, SdnResult};
use crate::logger::{self, BreadcrumbFlags};
use std::net::Ipv6Addr;

/// Fixed-size portion of a generic IPv6 Routing Header: next-header,
/// hdr-ext-len, routing-type, segments-left, plus 4 reserved bytes.
const RH_FIXED: usize = 8;
/// Fixed-size portion of the SDN source-routing extension: compression
/// byte, padding byte, 2 reserved bytes.
const SRH_FIXED: usize = 4;
/// `routing_type` value identifying an SDN source route.
pub const SDN_SRH_ROUTING_TYPE: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrhRoute {
    /// Number of leading bytes shared with the original destination,
    /// in `0..=16`. Each encoded hop carries only its trailing
    /// `16 - compression` bytes.
    pub compression: u8,
    pub hops: Vec<Ipv6Addr>,
}

impl SrhRoute {
    pub fn new(compression: u8, hops: Vec<Ipv6Addr>) -> Self {
        SrhRoute { compression, hops }
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    fn suffix_len(&self) -> usize {
        16 - self.compression as usize
    }

    /// Unrounded extension length per §4.4: `RH_FIXED + SRH_FIXED +
    /// (n-1)*(16-c) + (16-c)`, i.e. `RH_FIXED + SRH_FIXED + n*(16-c)`.
    fn raw_ext_len(&self) -> usize {
        RH_FIXED + SRH_FIXED + self.len() * self.suffix_len()
    }

    fn padded_ext_len(&self) -> (usize, usize) {
        let raw = self.raw_ext_len();
        let padded = (raw + 7) / 8 * 8;
        (padded, padded - raw)
    }
}

/// Rewrites `packet` (a full IPv6 datagram: 40-byte fixed header,
/// optional extension headers, payload) to carry the source route.
/// `next_header` is the proto value currently in the IPv6 fixed header
/// (what the new Routing Header's `next` field should point at).
pub fn emit(packet: &mut Vec<u8>, next_header: u8, route: &SrhRoute) -> SdnResult<()> {
    const IPV6_FIXED_HEADER: usize = 40;
    if route.hops.is_empty() {
        return Err(SdnError::Malformed("source route has no hops".into()));
    }
    if packet.len() < IPV6_FIXED_HEADER {
        return Err(SdnError::Malformed("packet shorter than IPv6 fixed header".into()));
    }

    let (ext_len, padding) = route.padded_ext_len();
    let suffix_len = route.suffix_len();

    // 1. Shift existing extension headers + payload right by ext_len.
    let insert_at = IPV6_FIXED_HEADER;
    packet.resize(packet.len() + ext_len, 0);
    let end = packet.len() - ext_len;
    packet.copy_within(insert_at..end, insert_at + ext_len);
    let ext = &mut packet[insert_at..insert_at + ext_len];
    ext.fill(0);

    // 2. Routing Header fixed fields.
    ext[0] = next_header;
    ext[1] = ((ext_len - 8) / 8) as u8;
    ext[2] = SDN_SRH_ROUTING_TYPE;
    ext[3] = route.len() as u8;
    // ext[4..8] reserved, already zeroed.

    // 3. SDN source-routing header.
    let c = route.compression;
    ext[8] = (c << 4) | c;
    ext[9] = padding as u8;
    // ext[10..12] reserved, already zeroed.

    // 4. Address list, last hop written first: encode hops[1..] in
    // reverse order, trailing suffix_len bytes of each.
    let mut cursor = RH_FIXED + SRH_FIXED;
    for hop in route.hops[1..].iter().rev() {
        let bytes = hop.octets();
        let suffix = &bytes[16 - suffix_len..];
        ext[cursor..cursor + suffix_len].copy_from_slice(suffix);
        cursor += suffix_len;
    }

    // 5. New destination is the first hop.
    let first_hop = route.hops[0].octets();
    packet[24..40].copy_from_slice(&first_hop);

    // Increment IPv6 payload length (bytes 4..6 of the fixed header).
    let old_len = u16::from_be_bytes([packet[4], packet[5]]);
    let new_len = old_len.wrapping_add(ext_len as u16);
    packet[4..6].copy_from_slice(&new_len.to_be_bytes());

    logger::breadcrumb(
        BreadcrumbFlags::SRH,
        format!("emit hops={} ext_len={ext_len} padding={padding}", route.len()),
    );
    Ok(())
}
