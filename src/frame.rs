//! Frame layout and encoding.

use arrayvec::ArrayVec;

use crate::types::{Address, MAX_PAYLOAD_LEN};
use crate::{checksum, START_COMMAND, START_REPLY};

/// Start byte, addr/len byte and checksum byte.
pub const FRAME_OVERHEAD: usize = 3;
/// Length of the largest frame on the wire.
pub const MAX_FRAME_LEN: usize = MAX_PAYLOAD_LEN + FRAME_OVERHEAD;

/// A complete frame, ready to be written to the bus.
pub type FrameBytes = ArrayVec<u8, MAX_FRAME_LEN>;

/// The first byte of every frame, which also tells who sent it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StartByte {
    /// `'E'`, a command sent by the host.
    Command,
    /// `'e'`, a reply sent by a node.
    Reply,
}

impl StartByte {
    /// Returns `None` for anything that can't start a frame.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            START_COMMAND => Some(Self::Command),
            START_REPLY => Some(Self::Reply),
            _ => None,
        }
    }

    /// The on-wire value.
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Command => START_COMMAND,
            Self::Reply => START_REPLY,
        }
    }
}

/// Encode a frame. `payload` must not be longer than [`MAX_PAYLOAD_LEN`];
/// the range-checked [`Payload`](crate::Payload) type guarantees that.
pub(crate) fn encode(start: StartByte, address: Address, payload: &[u8]) -> FrameBytes {
    debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);
    let mut data = FrameBytes::new();
    data.push(start.as_byte());
    data.push(address.header(payload.len() as u8));
    data.try_extend_from_slice(payload)
        .expect("BUG: Frame buffer too small.");
    data.push(checksum(&data));
    data
}
