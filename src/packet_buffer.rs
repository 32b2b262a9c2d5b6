//! C3: bounded packet buffer. Holds copies of outbound packets awaiting
//! a controller reply (flow-table query round trip). Grounded on the
//! reference crate's bounded `VecDeque`-with-eviction idiom
//! (`flow_manager/state.rs::buffer_payload`), but deliberately never
//! evicts: a dropped buffered packet here is a lost FTQ round trip, so
//! exhaustion is a hard `PoolFull` rather than a best-effort drop of the
//! oldest payload.

use crate::error::{SdnError, SdnResult};
use crate::logger::{self, BreadcrumbFlags};
use crate::timer::Timer;
use std::time::{Duration, Instant};

pub type BufferId = u8;

const ID_MAX: u16 = 255;

struct Slot {
    id: BufferId,
    bytes: Vec<u8>,
    ext_len: usize,
    lifetimer: Timer,
}

pub struct PacketBuffer {
    capacity: usize,
    slots: Vec<Slot>,
    next_id: u16,
}

impl PacketBuffer {
    pub fn new(capacity: usize) -> Self {
        PacketBuffer {
            capacity,
            slots: Vec::new(),
            next_id: 0,
        }
    }

    fn generate_id(&mut self) -> BufferId {
        self.next_id = (self.next_id + 1) % ID_MAX;
        self.next_id as BufferId
    }

    /// Allocates a slot with a fresh transaction id and arms its
    /// lifetimer. The slot starts empty; call `set` to copy payload in.
    pub fn allocate(&mut self, lifetime: Duration) -> SdnResult<BufferId> {
        if self.slots.len() >= self.capacity {
            return Err(SdnError::PoolFull { pool: "packet_buffer" });
        }
        let id = self.generate_id();
        let mut lifetimer = Timer::new();
        lifetimer.start(lifetime);
        self.slots.push(Slot {
            id,
            bytes: Vec::new(),
            ext_len: 0,
            lifetimer,
        });
        logger::breadcrumb(BreadcrumbFlags::PACKET_BUFFER, format!("allocate id={id}"));
        Ok(id)
    }

    pub fn set(&mut self, id: BufferId, buf: &[u8], ext_len: usize) -> SdnResult<()> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.id == id)
            .ok_or(SdnError::Unknown)?;
        slot.bytes = buf.to_vec();
        slot.ext_len = ext_len;
        Ok(())
    }

    pub fn find(&self, id: BufferId) -> Option<(&[u8], usize)> {
        self.slots
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| (slot.bytes.as_slice(), slot.ext_len))
    }

    /// Whole-packet equality, or equality over `[start, start+span)` when
    /// `range` is given.
    pub fn contains(&self, bytes: &[u8], range: Option<(usize, usize)>) -> bool {
        self.slots.iter().any(|slot| match range {
            Some((start, span)) => {
                let end = start.saturating_add(span);
                end <= slot.bytes.len() && slot.bytes[start..end] == *bytes
            }
            None => slot.bytes == bytes,
        })
    }

    pub fn free(&mut self, id: BufferId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|slot| slot.id != id);
        let removed = self.slots.len() != before;
        if removed {
            logger::breadcrumb(BreadcrumbFlags::PACKET_BUFFER, format!("free id={id}"));
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Lifetimer sweep: frees any slot whose deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Vec<BufferId> {
        let mut expired = Vec::new();
        self.slots.retain_mut(|slot| {
            if slot.lifetimer.poll_expired(now) {
                expired.push(slot.id);
                false
            } else {
                true
            }
        });
        for id in &expired {
            logger::breadcrumb(BreadcrumbFlags::PACKET_BUFFER, format!("slot id={id} timed out"));
        }
        expired
    }
}
