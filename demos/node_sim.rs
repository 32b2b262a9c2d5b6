//! Single-process walkthrough of the cold-join, egress-miss, and
//! source-routed forwarding scenarios, wiring a uSDN node engine
//! directly to an embedded controller without any real socket I/O
//! (decode/encode only, per the crate's scope).
//!
//! Node ids map onto link-local test addresses as `2001:db8::<id>`; a
//! real deployment would derive this from the node's actual RPL/6LoWPAN
//! prefix, which is out of scope here.

use anyhow::{anyhow, Context};
use std::net::Ipv6Addr;
use std::time::Instant;
use usdn_core::config::SdnConfig;
use usdn_core::controller::connector::ConnectorId;
use usdn_core::controller::Controller;
use usdn_core::flow_table::FlowTable;
use usdn_core::packet_buffer::PacketBuffer;
use usdn_core::srh::SrhRoute;
use usdn_core::usdn::{CfgPayload, EgressOutcome, Engine, UsdnMessage};

fn node_addr(id: u16) -> Ipv6Addr {
    Ipv6Addr::new(0x2001, 0x0db8, 0, 0, 0, 0, 0, id)
}

fn cfg_template() -> CfgPayload {
    CfgPayload {
        sdn_net: 1,
        cfg_id: 1,
        ft_lifetime_ticks: 300_000,
        query_full: 0,
        query_idx: 0,
        query_len: 2,
        update_period: 60,
        rpl_dio_interval: 32,
        rpl_dfrt_lifetime: 120,
    }
}

fn main() -> anyhow::Result<()> {
    let node_id: u16 = 9;
    let dst_id: u16 = 5;
    let mut node = Engine::new(node_id, SdnConfig::default_const(), FlowTable::new(8, 8, 8), PacketBuffer::new(8));
    let mut controller = Controller::new(8, 16, 8, cfg_template());

    // Seed a tiny topology (9 - 1 - 2 - 5) so the routing app has a
    // path from the querying node to hand back once it asks for one.
    // Links are directional in the network model, so each hop is
    // recorded both ways.
    for (a, b) in [(node_id, 1), (1, 2), (2, dst_id)] {
        controller.network_mut().link_update(a, b, -60).context("seeding topology")?;
        controller.network_mut().link_update(b, a, -60).context("seeding topology")?;
    }

    // --- S1: cold join ---
    let cjoin = node.boot();
    println!("node {node_id} -> controller: {cjoin:?}");
    let bytes = cjoin.encode(1, 0);
    controller.ingest(ConnectorId::UsdnUdp, node_id, &bytes, 0, 0).context("ingesting CJOIN")?;
    let outgoing = controller.poll(Instant::now());
    let (_, cfg_msg) = UsdnMessage::decode(&outgoing[0].bytes).context("decoding CFG response")?;
    println!("controller -> node {node_id}: {cfg_msg:?}");
    node.ingest(cfg_msg, Instant::now()).context("applying CFG")?;
    println!("node {node_id} state: {:?}", node.state());

    // --- S2/S3: egress miss, controller hands back a source route ---
    let mut packet = vec![0u8; 2];
    packet[0..2].copy_from_slice(&dst_id.to_be_bytes());
    let outcome = node.egress(&packet, 0).context("first egress attempt")?;
    let ftq = match outcome {
        EgressOutcome::Queried(msg @ UsdnMessage::Ftq(_)) => msg,
        other => return Err(anyhow!("expected a query, got {other:?}")),
    };
    println!("node {node_id} -> controller: {ftq:?}");
    let bytes = ftq.encode(1, 1);
    controller.ingest(ConnectorId::UsdnUdp, node_id, &bytes, 0, 1).context("ingesting FTQ")?;

    let outgoing = controller.poll(Instant::now());
    if outgoing.is_empty() {
        return Err(anyhow!("controller produced no routing response"));
    }
    let (_, fts_msg) = UsdnMessage::decode(&outgoing[0].bytes).context("decoding FTS response")?;
    println!("controller -> node {node_id}: {fts_msg:?}");
    node.ingest(fts_msg, Instant::now()).context("installing FTS")?;

    let outcome = node.egress(&packet, 0).context("second egress attempt")?;
    let forward = match outcome {
        EgressOutcome::Srh(action) => action,
        other => return Err(anyhow!("expected an Srh forward, got {other:?}")),
    };

    // Node-side address expansion: the controller only ever hands back
    // short ids (see controller::action's module doc); turning those
    // into real hop addresses for `srh::emit` is this runtime's job.
    let compression = forward.data[0];
    let path_len = forward.data[1] as usize;
    let mut path = Vec::with_capacity(path_len);
    for chunk in forward.data[2..2 + path_len * 2].chunks_exact(2) {
        path.push(u16::from_be_bytes([chunk[0], chunk[1]]));
    }
    // The path includes this node itself as its first element; the
    // source route only needs the hops beyond it.
    let hops: Vec<Ipv6Addr> = path[1..].iter().copied().map(node_addr).collect();
    let route = SrhRoute::new(compression, hops);
    println!("resolved source route: {route:?}");

    let mut datagram = vec![0u8; 40 + packet.len()];
    datagram[0] = 0x60;
    datagram[4..6].copy_from_slice(&(packet.len() as u16).to_be_bytes());
    datagram[6] = 17;
    datagram[24..40].copy_from_slice(&node_addr(dst_id).octets());
    datagram.extend_from_slice(&packet);
    usdn_core::srh::emit(&mut datagram, 17, &route).context("emitting source route")?;
    println!("emitted {} byte source-routed datagram", datagram.len());

    // The controller still has a pending JOIN handshake sweep to run
    // on its own tick; demonstrate that it's reachable for completeness.
    let _ = controller.poll(Instant::now());
    Ok(())
}
