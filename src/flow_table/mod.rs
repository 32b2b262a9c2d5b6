//! C2: the per-node flow table. Two ordered lists (whitelist, main) plus
//! one optional default fast-path entry, all drawing match/action rules
//! and entry slots from bounded pools — grounded on the reference
//! crate's `RwLock<Vec<HostRule>>` ordered-rule-list idiom (`policy/
//! mod.rs`), but scanned in *insertion* order (forward), not the
//! reference's most-recently-installed-wins reverse scan: the original
//! `sdn_ft_check_list` walks its list head-to-tail, and the spec
//! (§4.2 "Insertion order is authoritative") is unambiguous about it.

mod pool;
pub mod rule;

use crate::error::{SdnError, SdnResult};
use crate::logger::{self, BreadcrumbFlags};
use crate::timer::Timer;
use pool::{Pool, PoolHandle};
use rule::{ActionKind, ActionRule, MatchRule, Operator};
use std::time::{Duration, Instant};

/// Outward identity of a flow-table entry: a monotonically increasing
/// `u8`, wrapping modulo 255 (the original's `generate_id`).
pub type EntryId = u8;

const ID_MAX: u16 = 255;

/// Which ordered list an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Whitelist,
    Main,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryStats {
    pub hit_count: u32,
}

struct Entry {
    id: EntryId,
    match_h: PoolHandle,
    action_h: PoolHandle,
    stats: EntryStats,
    lifetimer: Timer,
    infinite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Action { action: ActionRule, verdict: Verdict },
    NoMatch,
}

/// Callback invoked once a match rule's action fires, mirroring the
/// original's single global `sdn_ft_register_action_handler` hook:
/// FORWARD/FALLBACK/SRH/CALLBACK are left for the handler (and its
/// caller) to carry out rather than folded into one generic verdict.
pub type ActionHandler = Box<dyn FnMut(&ActionRule, &[u8]) -> Verdict + Send>;

/// Fallback verdict used when no handler is registered, mirroring the
/// original `action_handler()`'s default switch: ACCEPT/MODIFY/CALLBACK
/// resolve locally, while DROP/QUERY/FORWARD/FALLBACK/SRH hand off to
/// processing this crate doesn't implement and so drop from the local
/// delivery path.
pub fn default_verdict(kind: ActionKind) -> Verdict {
    match kind {
        ActionKind::Accept | ActionKind::Modify | ActionKind::Callback => Verdict::Accept,
        ActionKind::Drop
        | ActionKind::Query
        | ActionKind::Forward
        | ActionKind::Fallback
        | ActionKind::Srh => Verdict::Drop,
    }
}

pub struct FlowTable {
    matches: Pool<MatchRule>,
    actions: Pool<ActionRule>,
    entries: Pool<Entry>,
    whitelist: Vec<PoolHandle>,
    main: Vec<PoolHandle>,
    default: Option<PoolHandle>,
    next_id: u16,
    refresh_lifetime_on_hit: bool,
    action_handler: Option<ActionHandler>,
}

impl FlowTable {
    pub fn new(max_entries: usize, max_matches: usize, max_actions: usize) -> Self {
        FlowTable {
            matches: Pool::new("flow_table.matches", max_matches),
            actions: Pool::new("flow_table.actions", max_actions),
            entries: Pool::new("flow_table.entries", max_entries),
            whitelist: Vec::new(),
            main: Vec::new(),
            default: None,
            next_id: 0,
            refresh_lifetime_on_hit: false,
            action_handler: None,
        }
    }

    /// Installs the action handler consulted by every `check*` call from
    /// here on. A later call replaces the previous handler, matching the
    /// original's single-callback registration.
    pub fn register_action_handler(&mut self, handler: ActionHandler) {
        self.action_handler = Some(handler);
    }

    pub fn set_refresh_lifetime_on_hit(&mut self, enabled: bool) {
        self.refresh_lifetime_on_hit = enabled;
    }

    fn generate_id(&mut self) -> EntryId {
        self.next_id = (self.next_id + 1) % ID_MAX;
        self.next_id as EntryId
    }

    pub fn create_match(
        &mut self,
        op: Operator,
        index: u8,
        needs_ext: bool,
        bytes: &[u8],
    ) -> SdnResult<PoolHandle> {
        self.matches.alloc(MatchRule::new(op, index, needs_ext, bytes))
    }

    pub fn create_action(&mut self, kind: ActionKind, index: u8, bytes: &[u8]) -> SdnResult<PoolHandle> {
        self.actions.alloc(ActionRule::new(kind, index, bytes))
    }

    /// `lifetime = None` is the infinite sentinel: the timer is never armed.
    pub fn create_entry(
        &mut self,
        list: ListKind,
        match_h: PoolHandle,
        action_h: PoolHandle,
        lifetime: Option<Duration>,
        is_default: bool,
    ) -> SdnResult<EntryId> {
        if self.entries.len() >= self.entries.capacity() {
            return Err(SdnError::PoolFull { pool: "flow_table.entries" });
        }
        let id = self.generate_id();
        let mut lifetimer = Timer::new();
        let infinite = lifetime.is_none();
        if let Some(delay) = lifetime {
            lifetimer.start(delay);
        }
        let entry = Entry {
            id,
            match_h,
            action_h,
            stats: EntryStats::default(),
            lifetimer,
            infinite,
        };
        let handle = self.entries.alloc(entry)?;
        match list {
            ListKind::Whitelist => self.whitelist.push(handle),
            ListKind::Main => self.main.push(handle),
        }
        if is_default {
            self.default = Some(handle);
        }
        logger::breadcrumb(
            BreadcrumbFlags::FLOW_TABLE,
            format!("create_entry id={id} list={list:?} default={is_default}"),
        );
        Ok(id)
    }

    fn check_list(&mut self, handles: &[PoolHandle], buf: &[u8], ext_len: usize) -> MatchOutcome {
        for &handle in handles {
            let Some(entry) = self.entries.get(handle) else {
                continue;
            };
            let Some(match_rule) = self.matches.get(entry.match_h) else {
                continue;
            };
            if match_rule.matches(buf, ext_len) {
                let action = self.actions.get(entry.action_h).cloned();
                if self.refresh_lifetime_on_hit {
                    if let Some(entry) = self.entries.get_mut(handle) {
                        if !entry.infinite {
                            entry.lifetimer.reset(Duration::from_secs(0));
                        }
                    }
                }
                if let Some(entry) = self.entries.get_mut(handle) {
                    entry.stats.hit_count += 1;
                }
                if let Some(action) = action {
                    let verdict = match self.action_handler.as_mut() {
                        Some(handler) => handler(&action, buf),
                        None => default_verdict(action.kind),
                    };
                    return MatchOutcome::Action { action, verdict };
                }
            }
        }
        MatchOutcome::NoMatch
    }

    /// Scans in insertion order: the first entry whose match succeeds
    /// yields its action.
    pub fn check(&mut self, list: ListKind, buf: &[u8], ext_len: usize) -> MatchOutcome {
        match list {
            ListKind::Whitelist => {
                let handles = self.whitelist.clone();
                self.check_list(&handles, buf, ext_len)
            }
            ListKind::Main => {
                let handles = self.main.clone();
                self.check_list(&handles, buf, ext_len)
            }
        }
    }

    /// Consults both lists, whitelist first, matching the ingress
    /// ordering rule in §4.2.
    pub fn check_ingress(&mut self, buf: &[u8], ext_len: usize) -> MatchOutcome {
        match self.check(ListKind::Whitelist, buf, ext_len) {
            MatchOutcome::NoMatch => self.check(ListKind::Main, buf, ext_len),
            hit => hit,
        }
    }

    /// Single-entry fast path, consulted before list scans in egress
    /// processing.
    pub fn check_default(&mut self, buf: &[u8], ext_len: usize) -> MatchOutcome {
        let Some(handle) = self.default else {
            return MatchOutcome::NoMatch;
        };
        self.check_list(&[handle], buf, ext_len)
    }

    /// Convenience scan: does any match rule's raw bytes equal `bytes`?
    pub fn contains(&self, bytes: &[u8]) -> bool {
        self.whitelist
            .iter()
            .chain(self.main.iter())
            .filter_map(|&h| self.entries.get(h))
            .filter_map(|entry| self.matches.get(entry.match_h))
            .any(|m| m.data.as_slice() == bytes)
    }

    fn list_of(&self, handle: PoolHandle) -> Option<ListKind> {
        if self.whitelist.contains(&handle) {
            Some(ListKind::Whitelist)
        } else if self.main.contains(&handle) {
            Some(ListKind::Main)
        } else {
            None
        }
    }

    fn remove_handle(&mut self, handle: PoolHandle) {
        if let Some(list) = self.list_of(handle) {
            let list = match list {
                ListKind::Whitelist => &mut self.whitelist,
                ListKind::Main => &mut self.main,
            };
            list.retain(|&h| h != handle);
        }
        if self.default == Some(handle) {
            self.default = None;
        }
        if let Some(entry) = self.entries.free_handle(handle) {
            self.matches.free_handle(entry.match_h);
            self.actions.free_handle(entry.action_h);
        }
    }

    pub fn remove(&mut self, id: EntryId) -> bool {
        let handle = self
            .whitelist
            .iter()
            .chain(self.main.iter())
            .find(|&&h| self.entries.get(h).map(|e| e.id) == Some(id))
            .copied();
        match handle {
            Some(handle) => {
                self.remove_handle(handle);
                logger::breadcrumb(BreadcrumbFlags::FLOW_TABLE, format!("remove id={id}"));
                true
            }
            None => false,
        }
    }

    /// Lifetimer sweep: called from the owning runtime's poll tick.
    /// Expired entries are removed; destroying the default clears the
    /// default pointer.
    pub fn poll(&mut self, now: Instant) {
        let expired: Vec<PoolHandle> = self
            .whitelist
            .iter()
            .chain(self.main.iter())
            .copied()
            .filter(|&h| {
                self.entries
                    .get_mut(h)
                    .map(|e| !e.infinite && e.lifetimer.poll_expired(now))
                    .unwrap_or(false)
            })
            .collect();
        for handle in expired {
            if let Some(entry) = self.entries.get(handle) {
                logger::breadcrumb(
                    BreadcrumbFlags::FLOW_TABLE,
                    format!("entry id={} timed out", entry.id),
                );
            }
            self.remove_handle(handle);
        }
    }

    pub fn whitelist_len(&self) -> usize {
        self.whitelist.len()
    }

    pub fn main_len(&self) -> usize {
        self.main.len()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}
