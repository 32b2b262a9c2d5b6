//! C1: process-wide SDN configuration store.
//!
//! Design note 9 of the original specification calls out that a
//! systems-language rewrite should prefer an explicit context struct
//! over a true global, even though the source this was distilled from
//! keeps it as a process-wide singleton. `SdnConfig` is therefore an
//! ordinary value owned by value inside whichever runtime constructs
//! it — `usdn::Engine` on the node side, `controller::Controller` on
//! the controller side — with no shared-ownership wrapper at all;
//! writes only ever happen from CFG ingestion on the single
//! cooperative task, so there's no concurrent writer to guard against.

use std::time::Duration;

/// Sentinel used by the wire and in-memory model for "never expires".
pub const INFINITE_LIFETIME_TICKS: u32 = 0xFFFF;

pub const MAX_CFG_RETRIES: u8 = 5;
pub const CFG_HANDSHAKE_DELAY_MIN: Duration = Duration::from_secs(10);
pub const CFG_HANDSHAKE_DELAY_MAX: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtLifetime {
    /// `None` means the infinite sentinel: the entry's timer is never armed.
    secs: Option<u32>,
}

impl FtLifetime {
    pub const fn infinite() -> Self {
        FtLifetime { secs: None }
    }

    pub const fn from_secs(secs: u32) -> Self {
        FtLifetime { secs: Some(secs) }
    }

    pub fn is_infinite(&self) -> bool {
        self.secs.is_none()
    }

    pub fn as_duration(&self) -> Option<Duration> {
        self.secs.map(|s| Duration::from_secs(s as u64))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SdnConfig {
    pub sdn_net: u8,
    pub cfg_id: u8,
    pub ft_lifetime: FtLifetime,
    pub query_full: bool,
    pub query_idx: u8,
    pub query_len: u8,
    pub update_period_s: u16,
    pub rpl_dio_interval: u8,
    pub rpl_dfrt_lifetime: u8,

    pub buffer_max: usize,
    pub max_nodes: usize,
    pub max_links_per_node: usize,
    pub max_flow_entries: usize,
    pub max_matches: usize,
    pub max_actions: usize,
    pub arena_bytes: usize,
    pub packetbuf_lifetime: Duration,
    pub nsu_jitter_max: Duration,
    pub refresh_lifetime_on_hit: bool,
    pub retry_after_query: bool,
    pub default_ft_entry: bool,
    pub ingress_queue_len: usize,
}

impl SdnConfig {
    pub const fn default_const() -> Self {
        SdnConfig {
            sdn_net: 1,
            cfg_id: 0,
            ft_lifetime: FtLifetime::from_secs(300),
            query_full: false,
            query_idx: 24,
            query_len: 16,
            update_period_s: 60,
            rpl_dio_interval: 32,
            rpl_dfrt_lifetime: 120,

            buffer_max: 16,
            max_nodes: 64,
            max_links_per_node: 8,
            max_flow_entries: 10,
            max_matches: 10,
            max_actions: 10,
            arena_bytes: 1024,
            packetbuf_lifetime: Duration::from_secs(10),
            nsu_jitter_max: Duration::from_millis(500),
            refresh_lifetime_on_hit: false,
            retry_after_query: true,
            default_ft_entry: true,
            ingress_queue_len: 3,
        }
    }

    /// Applies a CFG message's fields. Called exclusively by
    /// `usdn::engine` ingestion.
    pub fn apply_cfg(&mut self, cfg: &crate::usdn::wire::CfgPayload) {
        self.sdn_net = cfg.sdn_net;
        self.cfg_id = cfg.cfg_id;
        self.ft_lifetime = if cfg.ft_lifetime_ticks == 0 {
            FtLifetime::infinite()
        } else {
            FtLifetime::from_secs(cfg.ft_lifetime_ticks / 1000)
        };
        self.query_full = cfg.query_full != 0;
        self.query_idx = cfg.query_idx;
        self.query_len = cfg.query_len;
        self.update_period_s = cfg.update_period;
        self.rpl_dio_interval = cfg.rpl_dio_interval;
        self.rpl_dfrt_lifetime = cfg.rpl_dfrt_lifetime;
    }
}

impl Default for SdnConfig {
    fn default() -> Self {
        Self::default_const()
    }
}

/// Narrowed pool capacities for exercising `PoolFull` deterministically
/// in tests, the same role the reference crate's `ios-memory-profile`
/// feature plays for its socket pools.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    pub max_flow_entries: usize,
    pub max_matches: usize,
    pub max_actions: usize,
    pub buffer_max: usize,
    pub max_nodes: usize,
}

impl RuntimeConfig {
    pub fn apply(&self, cfg: &mut SdnConfig) {
        cfg.max_flow_entries = self.max_flow_entries;
        cfg.max_matches = self.max_matches;
        cfg.max_actions = self.max_actions;
        cfg.buffer_max = self.buffer_max;
        cfg.max_nodes = self.max_nodes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_lifetime_has_no_duration() {
        let lt = FtLifetime::infinite();
        assert!(lt.is_infinite());
        assert_eq!(lt.as_duration(), None);
    }

    #[test]
    fn finite_lifetime_converts() {
        let lt = FtLifetime::from_secs(300);
        assert!(!lt.is_infinite());
        assert_eq!(lt.as_duration(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn apply_cfg_updates_fields() {
        let mut cfg = SdnConfig::default_const();
        let msg = crate::usdn::wire::CfgPayload {
            sdn_net: 1,
            cfg_id: 9,
            ft_lifetime_ticks: 300_000,
            query_full: 0,
            query_idx: 24,
            query_len: 16,
            update_period: 60,
            rpl_dio_interval: 32,
            rpl_dfrt_lifetime: 120,
        };
        cfg.apply_cfg(&msg);
        assert_eq!(cfg.cfg_id, 9);
        assert_eq!(cfg.ft_lifetime, FtLifetime::from_secs(300));
    }

    #[test]
    fn runtime_config_overlay_narrows_pools() {
        let mut cfg = SdnConfig::default_const();
        let tight = RuntimeConfig {
            max_flow_entries: 2,
            max_matches: 2,
            max_actions: 2,
            buffer_max: 2,
            max_nodes: 2,
        };
        tight.apply(&mut cfg);
        assert_eq!(cfg.max_flow_entries, 2);
        assert_eq!(cfg.buffer_max, 2);
    }
}
