//! C5: the uSDN protocol codec and node-side engine.

pub mod engine;
pub mod wire;

pub use engine::{ControllerState, EgressOutcome, Engine, EngineAction};
pub use wire::{CfgPayload, FtqPayload, FtsPayload, Header, MsgType, NsuLink, NsuPayload, UsdnMessage};
