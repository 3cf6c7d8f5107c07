//! Wire envelope shared by the operation and response paths.

use crate::task::PartitionId;

/// Header bit marking a packet as carrying an operation.
pub const FLAG_OP: u16 = 1;
/// Header bit marking a packet as a response to an earlier invocation.
pub const FLAG_RESPONSE: u16 = 1 << 1;
/// Header bit marking a packet as urgent.
pub const FLAG_URGENT: u16 = 1 << 2;

/// Envelope produced by the network layer.
///
/// The scheduler only inspects the header flags and the partition id; the
/// payload bytes pass through untouched to whichever handler consumes the
/// packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    flags: u16,
    partition_id: PartitionId,
    payload: Vec<u8>,
}

impl Packet {
    pub fn new(flags: u16, partition_id: PartitionId, payload: Vec<u8>) -> Packet {
        Packet {
            flags,
            partition_id,
            payload,
        }
    }

    /// An operation packet bound for the operation workers.
    pub fn operation(partition_id: PartitionId, payload: Vec<u8>) -> Packet {
        Packet::new(FLAG_OP, partition_id, payload)
    }

    /// A response packet bound for the response worker.
    pub fn response(partition_id: PartitionId, payload: Vec<u8>) -> Packet {
        Packet::new(FLAG_OP | FLAG_RESPONSE, partition_id, payload)
    }

    /// Flag the packet as urgent so it travels through the priority queues.
    pub fn urgent(mut self) -> Packet {
        self.flags |= FLAG_URGENT;
        self
    }

    pub fn is_flag_set(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    pub fn is_operation(&self) -> bool {
        self.is_flag_set(FLAG_OP)
    }

    pub fn is_response(&self) -> bool {
        self.is_flag_set(FLAG_RESPONSE)
    }

    pub fn is_urgent(&self) -> bool {
        self.is_flag_set(FLAG_URGENT)
    }

    pub fn partition_id(&self) -> PartitionId {
        self.partition_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_the_expected_flags() {
        let op = Packet::operation(4, vec![1]);
        assert!(op.is_operation());
        assert!(!op.is_response());
        assert!(!op.is_urgent());

        let response = Packet::response(4, vec![2]);
        assert!(response.is_operation());
        assert!(response.is_response());
    }

    #[test]
    fn urgency_is_a_separate_bit() {
        let packet = Packet::operation(-1, vec![]).urgent();
        assert!(packet.is_urgent());
        assert!(packet.is_operation());
        assert_eq!(packet.partition_id(), -1);
    }

    #[test]
    fn raw_flags_round_trip() {
        let packet = Packet::new(FLAG_OP | FLAG_URGENT, 9, vec![3, 4]);
        assert!(packet.is_flag_set(FLAG_OP));
        assert!(packet.is_flag_set(FLAG_URGENT));
        assert!(!packet.is_flag_set(FLAG_RESPONSE));
        assert_eq!(packet.payload(), &[3, 4]);
    }
}
