//! Embedded SDN runtime core: the in-node flow-table data plane
//! (uSDN) and the embedded SDN controller (Atom). See `DESIGN.md` for
//! how each module grounds in the reference crate this was adapted
//! from.
//!
//! The runtime model is strictly single-threaded and cooperative
//! (timers, not spawned tasks, drive every deadline): `NodeRuntime`
//! and `ControllerRuntime` below are thin tokio wrappers around that
//! model, adapted from the reference crate's `BridgeEngine::
//! start_poll_loop` (`tokio::select!` over an interval and a shutdown
//! `Notify`), generalized from a packet-poll loop to a generic
//! `engine.poll(now)` tick.

pub mod config;
pub mod controller;
pub mod error;
pub mod flow_table;
pub mod logger;
pub mod packet_buffer;
pub mod srh;
pub mod timer;
pub mod usdn;

use controller::Controller;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use usdn::{Engine, EngineAction, UsdnMessage};

/// Wraps a node's uSDN engine in a tokio task that ticks it on a fixed
/// interval. Every tick just calls `Engine::poll`; the engine itself
/// owns all actual timer state (§5 "no two callbacks ever execute
/// simultaneously" — enforced here by there being exactly one task).
pub struct NodeRuntime {
    engine: Arc<Mutex<Engine>>,
    tick_interval: Duration,
}

impl NodeRuntime {
    pub fn new(engine: Engine, tick_interval: Duration) -> Self {
        NodeRuntime { engine: Arc::new(Mutex::new(engine)), tick_interval }
    }

    pub fn engine(&self) -> &Arc<Mutex<Engine>> {
        &self.engine
    }

    /// Spawns the poll loop on `handle`. `on_send` receives every
    /// outbound uSDN message (CJOIN/NSU/FTQ) produced by a tick; the
    /// caller owns the actual socket write (§1 out of scope: "the
    /// underlying IPv6 stack, UDP sockets"). Returns the task handle
    /// and a `Notify` the caller can fire once to stop it.
    pub fn spawn(
        &self,
        handle: &tokio::runtime::Handle,
        mut on_send: impl FnMut(UsdnMessage) + Send + 'static,
    ) -> (JoinHandle<()>, Arc<Notify>) {
        let engine = Arc::clone(&self.engine);
        let tick = self.tick_interval;
        let stop = Arc::new(Notify::new());
        let stop_rx = Arc::clone(&stop);
        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.notified() => break,
                }
                let actions = engine.lock().poll(Instant::now());
                for action in actions {
                    if let EngineAction::Send(msg) = action {
                        on_send(msg);
                    }
                }
            }
        });
        (task, stop)
    }
}

/// Wraps a `Controller` in the same tick-driven tokio task shape as
/// `NodeRuntime`.
pub struct ControllerRuntime {
    controller: Arc<Mutex<Controller>>,
    tick_interval: Duration,
}

impl ControllerRuntime {
    pub fn new(controller: Controller, tick_interval: Duration) -> Self {
        ControllerRuntime { controller: Arc::new(Mutex::new(controller)), tick_interval }
    }

    pub fn controller(&self) -> &Arc<Mutex<Controller>> {
        &self.controller
    }

    pub fn spawn(
        &self,
        handle: &tokio::runtime::Handle,
        mut on_send: impl FnMut(controller::dispatcher::Outgoing) + Send + 'static,
    ) -> (JoinHandle<()>, Arc<Notify>) {
        let controller = Arc::clone(&self.controller);
        let tick = self.tick_interval;
        let stop = Arc::new(Notify::new());
        let stop_rx = Arc::clone(&stop);
        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.notified() => break,
                }
                for outgoing in controller.lock().poll(Instant::now()) {
                    on_send(outgoing);
                }
            }
        });
        (task, stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SdnConfig;
    use crate::usdn::wire::CfgPayload;

    fn cfg_template() -> CfgPayload {
        CfgPayload {
            sdn_net: 1,
            cfg_id: 1,
            ft_lifetime_ticks: 300_000,
            query_full: 0,
            query_idx: 24,
            query_len: 16,
            update_period: 1,
            rpl_dio_interval: 32,
            rpl_dfrt_lifetime: 120,
        }
    }

    #[tokio::test]
    async fn node_runtime_ticks_engine_and_emits_periodic_cjoin() {
        let mut cfg = SdnConfig::default_const();
        cfg.update_period_s = 1;
        let engine = Engine::new(9, cfg, flow_table::FlowTable::new(8, 8, 8), packet_buffer::PacketBuffer::new(8));
        let runtime = NodeRuntime::new(engine, Duration::from_millis(10));
        runtime.engine().lock().boot();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let (task, stop) = runtime.spawn(&tokio::runtime::Handle::current(), move |msg| {
            let _ = tx.send(msg);
        });

        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        stop.notify_one();
        let _ = task.await;
        assert!(matches!(received, Ok(Some(UsdnMessage::CJoin(_)))));
    }

    #[tokio::test]
    async fn controller_runtime_responds_to_queued_join() {
        use crate::controller::connector::ConnectorId;
        use crate::usdn::wire::{NsuPayload, UsdnMessage as Msg};

        let controller = Controller::new(3, 8, 4, cfg_template());
        let runtime = ControllerRuntime::new(controller, Duration::from_millis(10));
        let cjoin = Msg::CJoin(NsuPayload { cfg_id: 0, rank: 0, links: vec![] }).encode(1, 0);
        runtime.controller().lock().ingest(ConnectorId::UsdnUdp, 9, &cjoin, 0, 0).unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let (task, stop) = runtime.spawn(&tokio::runtime::Handle::current(), move |out| {
            let _ = tx.send(out);
        });

        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        stop.notify_one();
        let _ = task.await;
        let outgoing = received.unwrap().unwrap();
        assert_eq!(outgoing.dest, 9);
    }
}
