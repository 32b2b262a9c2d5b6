//! C7 applications: pluggable handlers invoked by the dispatcher for a
//! matching `ActionKind`, tried in configuration order until one
//! returns a response (§4.6 step 4).

pub mod join;
pub mod routing;
pub mod rpl_routing;

use crate::controller::action::{Action, Response};
use crate::controller::network::NetworkModel;
use std::time::Instant;

pub trait App: Send {
    fn run(&mut self, action: &Action, network: &mut NetworkModel, now: Instant) -> Option<Response>;

    /// Time-driven retry sweep, used only by apps that own a
    /// handshake timer (currently `JoinApp`). No-op by default.
    fn poll_retries(&mut self, _network: &mut NetworkModel, _ids: &[u16], _now: Instant) -> Vec<(u16, Response)> {
        Vec::new()
    }
}

pub use join::JoinApp;
pub use routing::DfsRoutingApp;
pub use rpl_routing::{RplNodeStore, RplRoutingApp};
