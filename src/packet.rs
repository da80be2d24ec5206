//! Messages and packets, and the checksum that both endpoints use to detect corruption.
//!
//! Packets have a fixed-width wire representation, all numbers in network byte order (BE):
//!
//! ```ascii
//!  0: sequence number (i32) - -1 for pure ACK packets
//!  4: acknowledgement number (i32) - -1 for pure data packets
//!  8: checksum (i32)
//! 12: payload (20 bytes)
//! ```

use std::fmt::{Debug, Formatter};
use anyhow::bail;
use bytes::{Buf, BufMut, BytesMut};
use crate::seq_space::SeqNum;

/// Length of every message and every packet's payload
pub const PAYLOAD_LEN: usize = 20;

/// Wire value of a sequence or acknowledgement number that is not present in a packet
pub const NOT_IN_USE: i32 = -1;

/// Payload of pure ACK packets
const ACK_FILLER: [u8; PAYLOAD_LEN] = [b'0'; PAYLOAD_LEN];

/// An application level message - the unit of data that is handed to the sender and delivered
///  by the receiver
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Message {
    data: [u8; PAYLOAD_LEN],
}

impl Debug for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Message({:?})", String::from_utf8_lossy(&self.data))
    }
}

impl Message {
    pub fn new(data: [u8; PAYLOAD_LEN]) -> Message {
        Message { data }
    }

    pub fn as_bytes(&self) -> &[u8; PAYLOAD_LEN] {
        &self.data
    }
}

impl TryFrom<&[u8]> for Message {
    type Error = anyhow::Error;

    fn try_from(value: &[u8]) -> anyhow::Result<Self> {
        let data: [u8; PAYLOAD_LEN] = match value.try_into() {
            Ok(data) => data,
            Err(_) => bail!("message must have exactly {} bytes, was {}", PAYLOAD_LEN, value.len()),
        };
        Ok(Message { data })
    }
}

/// A packet as it travels through the channel. Data packets carry a sequence number, ACK packets
///  carry an acknowledgement number.
///
/// NB: Fields are public so that a driver can tamper with packets in transit; the checksum is
///      *not* updated automatically
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Packet {
    pub seqnum: Option<SeqNum>,
    pub acknum: Option<SeqNum>,
    pub checksum: i32,
    pub payload: [u8; PAYLOAD_LEN],
}

impl Packet {
    pub const SERIALIZED_LEN: usize = 3 * size_of::<i32>() + PAYLOAD_LEN;

    pub fn data(seqnum: SeqNum, message: &Message) -> Packet {
        Self::with_checksum(Some(seqnum), None, message.data)
    }

    pub fn ack(acknum: SeqNum) -> Packet {
        Self::with_checksum(None, Some(acknum), ACK_FILLER)
    }

    fn with_checksum(seqnum: Option<SeqNum>, acknum: Option<SeqNum>, payload: [u8; PAYLOAD_LEN]) -> Packet {
        let mut packet = Packet {
            seqnum,
            acknum,
            checksum: 0,
            payload,
        };
        packet.checksum = compute_checksum(&packet);
        packet
    }

    pub fn message(&self) -> Message {
        Message::new(self.payload)
    }

    pub fn compute_checksum(&self) -> i32 {
        compute_checksum(self)
    }

    pub fn is_corrupted(&self) -> bool {
        is_corrupted(self)
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_i32(to_wire(self.seqnum));
        buf.put_i32(to_wire(self.acknum));
        buf.put_i32(self.checksum);
        buf.put_slice(&self.payload);
    }

    /// NB: This does not verify the checksum - corrupted packets are decoded, and it is up to the
    ///      endpoint to detect and discard them
    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<Packet> {
        if buf.remaining() < Self::SERIALIZED_LEN {
            bail!("packet needs {} bytes, only {} remaining", Self::SERIALIZED_LEN, buf.remaining());
        }

        let seqnum = from_wire(buf.get_i32())?;
        let acknum = from_wire(buf.get_i32())?;
        let checksum = buf.get_i32();
        let mut payload = [0u8; PAYLOAD_LEN];
        buf.copy_to_slice(&mut payload);

        Ok(Packet {
            seqnum,
            acknum,
            checksum,
            payload,
        })
    }
}

fn to_wire(number: Option<SeqNum>) -> i32 {
    match number {
        Some(seq) => seq.to_raw() as i32,
        None => NOT_IN_USE,
    }
}

fn from_wire(raw: i32) -> anyhow::Result<Option<SeqNum>> {
    match raw {
        NOT_IN_USE => Ok(None),
        n if n >= 0 => Ok(Some(SeqNum::from_raw(n as u32))),
        n => bail!("invalid sequence number {} on the wire", n),
    }
}

/// The checksum is the sum of sequence number, acknowledgement number and all payload bytes, using
///  the wire representation of absent numbers.
pub fn compute_checksum(packet: &Packet) -> i32 {
    packet.payload.iter()
        .fold(
            to_wire(packet.seqnum).wrapping_add(to_wire(packet.acknum)),
            |sum, &b| sum.wrapping_add(b as i32),
        )
}

pub fn is_corrupted(packet: &Packet) -> bool {
    packet.checksum != compute_checksum(packet)
}
