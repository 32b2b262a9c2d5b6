//! C6: bounded ingress queue of copies of inbound southbound packets.
//! Grounded on the reference crate's bounded `VecDeque` idiom
//! (`flow_manager/state.rs`); a `crossbeam_channel` MPSC was considered
//! but dropped since the dispatch loop needs `head()` (peek without
//! removing) ahead of `remove()`, which a channel's `try_recv` does
//! not offer without an extra lookahead slot — see DESIGN.md.

use crate::controller::connector::ConnectorId;
use crate::error::{SdnError, SdnResult};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedPacket {
    pub bytes: Vec<u8>,
    pub ext_len: usize,
    pub hop_count: u8,
    pub src: u16,
    pub connector: ConnectorId,
}

pub struct IngressQueue {
    capacity: usize,
    slots: VecDeque<QueuedPacket>,
}

impl IngressQueue {
    pub fn new(capacity: usize) -> Self {
        IngressQueue { capacity, slots: VecDeque::new() }
    }

    pub fn add(&mut self, connector: ConnectorId, src: u16, bytes: &[u8], ext_len: usize, hop_count: u8) -> SdnResult<()> {
        if self.slots.len() >= self.capacity {
            return Err(SdnError::PoolFull { pool: "controller.ingress_queue" });
        }
        self.slots.push_back(QueuedPacket { bytes: bytes.to_vec(), ext_len, hop_count, src, connector });
        Ok(())
    }

    pub fn head(&self) -> Option<&QueuedPacket> {
        self.slots.front()
    }

    pub fn remove(&mut self) -> Option<QueuedPacket> {
        self.slots.pop_front()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_matches_arrival_order() {
        let mut q = IngressQueue::new(4);
        q.add(ConnectorId::UsdnUdp, 1, &[1], 0, 0).unwrap();
        q.add(ConnectorId::UsdnUdp, 1, &[2], 0, 0).unwrap();
        assert_eq!(q.head().unwrap().bytes, vec![1]);
        assert_eq!(q.remove().unwrap().bytes, vec![1]);
        assert_eq!(q.remove().unwrap().bytes, vec![2]);
        assert!(q.remove().is_none());
    }

    #[test]
    fn full_queue_reports_pool_full() {
        let mut q = IngressQueue::new(1);
        q.add(ConnectorId::UsdnUdp, 1, &[1], 0, 0).unwrap();
        assert_eq!(
            q.add(ConnectorId::UsdnUdp, 1, &[2], 0, 0),
            Err(SdnError::PoolFull { pool: "controller.ingress_queue" })
        );
    }
}
