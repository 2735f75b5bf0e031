// net_queue.rs — thread-safe packet queue decoupling socket I/O from the
// consumer thread (game loop, SR transport). Unchanged in shape from the
// engine's net_queue.rs: a bounded crossbeam channel, a non-blocking
// producer that drops on backpressure, and a consumer side that never
// blocks the caller longer than it asks for.

use crate::net_addr::NetAddr;
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};

/// A datagram received off the wire, tagged with its source and arrival time.
#[derive(Clone, Debug)]
pub struct QueuedPacket {
    pub from: NetAddr,
    pub data: Vec<u8>,
    pub timestamp_ms: u64,
}

impl QueuedPacket {
    pub fn new(from: NetAddr, data: Vec<u8>, timestamp_ms: u64) -> Self {
        Self {
            from,
            data,
            timestamp_ms,
        }
    }
}

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const MAX_QUEUE_CAPACITY: usize = 4096;

pub struct PacketQueue {
    sender: Sender<QueuedPacket>,
    receiver: Receiver<QueuedPacket>,
}

impl PacketQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    pub fn sender(&self) -> PacketQueueSender {
        PacketQueueSender {
            sender: self.sender.clone(),
        }
    }

    pub fn receiver(&self) -> &Receiver<QueuedPacket> {
        &self.receiver
    }

    pub fn try_recv(&self) -> Option<QueuedPacket> {
        self.receiver.try_recv().ok()
    }

    pub fn recv(&self) -> Option<QueuedPacket> {
        self.receiver.recv().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }
}

/// Sender handle for the packet queue (held by the I/O thread).
#[derive(Clone)]
pub struct PacketQueueSender {
    sender: Sender<QueuedPacket>,
}

impl PacketQueueSender {
    /// Enqueue without blocking. Returns `false` (packet dropped) if the
    /// queue is full or the consumer has gone away — common under heavy
    /// load and never fatal to the I/O thread.
    pub fn try_send(&self, packet: QueuedPacket) -> bool {
        match self.sender.try_send(packet) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_packet(id: u8) -> QueuedPacket {
        QueuedPacket::new(NetAddr::new([127, 0, 0, 1], 9001), vec![id], 1000)
    }

    #[test]
    fn basic_send_recv() {
        let queue = PacketQueue::new(10);
        let sender = queue.sender();

        assert!(queue.is_empty());
        assert!(sender.try_send(make_test_packet(1)));
        assert_eq!(queue.len(), 1);

        let packet = queue.try_recv().unwrap();
        assert_eq!(packet.data, vec![1]);
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_drops_packets() {
        let queue = PacketQueue::new(2);
        let sender = queue.sender();

        assert!(sender.try_send(make_test_packet(1)));
        assert!(sender.try_send(make_test_packet(2)));
        assert!(!sender.try_send(make_test_packet(3)));

        assert_eq!(queue.try_recv().unwrap().data, vec![1]);
        assert_eq!(queue.try_recv().unwrap().data, vec![2]);
    }

    #[test]
    fn sender_clones_share_the_queue() {
        let queue = PacketQueue::new(10);
        let s1 = queue.sender();
        let s2 = queue.sender();

        assert!(s1.try_send(make_test_packet(1)));
        assert!(s2.try_send(make_test_packet(2)));
        assert_eq!(queue.len(), 2);
    }
}
