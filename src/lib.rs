#![cfg_attr(not(feature = "std"), no_std)]

//! Driver for the half-duplex, multi-drop command bus shared by the host and
//! its peripheral nodes over a single RS-485 line.
//!
//! The host sends a command frame to one node, which answers with the
//! response it has buffered. Every frame looks like
//!
//! | Offset | Field    | Encoding                                          |
//! |--------|----------|---------------------------------------------------|
//! | 0      | Start    | `'E'` from the host, `'e'` from a node            |
//! | 1      | Addr/Len | bits 7-4 node address, bits 3-0 payload length N  |
//! | 2..    | Payload  | N raw bytes, N <= 15                              |
//! | 2+N    | Checksum | low byte of the sum of all preceding bytes        |
//!
//! [`CommBus`] is the node side. It is driven by calling
//! [`update()`](CommBus::update) from the main loop, and never blocks.
//! The host side lives in [`host`], as a sans-io state machine plus a blocking
//! wrapper for `std::io` streams.
//!
//! ```
//! # use commbus::hal::{Clock, Serial};
//! # struct Uart; impl Serial for Uart {
//! #     fn read_byte(&mut self) -> Option<u8> { None }
//! #     fn write_byte(&mut self, _: u8) {}
//! # }
//! # struct Micros; impl Clock for Micros { fn now_us(&self) -> u32 { 0 } }
//! # let pin = embedded_hal_mock::eh1::digital::Mock::new(&[
//! #     embedded_hal_mock::eh1::digital::Transaction::set(embedded_hal_mock::eh1::digital::State::Low),
//! # ]);
//! use commbus::{addr, CommBus};
//!
//! let mut switches = [0u8; 2];
//! let mut bus = CommBus::new(addr(7), Uart, pin, Micros, |cmd: &[u8]| {
//!     // Runs from within update() for every command sent to node 7.
//!     let _ = cmd;
//! });
//!
//! loop {
//!     bus.update();
//!     switches[0] ^= 1;
//!     bus.set_response(&switches).unwrap();
//!     # break;
//! }
//! # let (_, mut pin, _) = bus.free();
//! # pin.done();
//! ```

mod buffer;
pub mod frame;
pub mod hal;
pub mod host;
mod nom_parser;
pub mod node;
mod parser;
mod response;
mod scheduler;
pub mod timing;
pub mod types;

pub use frame::StartByte;
pub use node::CommBus;
pub use timing::Timing;
pub use types::{addr, Address, Error, IntoAddress, Payload, MAX_PAYLOAD_LEN};

/// Frame start byte used by the host for commands.
pub(crate) const START_COMMAND: u8 = b'E';
/// Frame start byte used by nodes for replies.
pub(crate) const START_REPLY: u8 = b'e';

/// Additive frame checksum: the sum of all bytes, modulo 256.
///
/// It detects single byte corruption and most bursts, but not reordered bytes.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

#[cfg(test)]
mod tests {
    use super::checksum;

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(b"E\x31\x02\x03"), 0x7b);
        assert_eq!(checksum(&[0xff, 0x01]), 0x00);
        assert_eq!(checksum(&[0xff; 18]), (0xffu16 * 18 & 0xff) as u8);
    }

    #[test]
    fn test_checksum_order_insensitive() {
        let data = [0x45, 0x31, 0x02, 0x03, 0xfe, 0x80];
        let mut reversed = data;
        reversed.reverse();
        assert_eq!(checksum(&data), checksum(&reversed));
        let mut rotated = data;
        rotated.rotate_left(2);
        assert_eq!(checksum(&data), checksum(&rotated));
    }

    #[test]
    fn test_checksum_detects_single_byte_change() {
        let data = [0x45, 0x31, 0x02, 0x03];
        let reference = checksum(&data);
        for i in 0..data.len() {
            for delta in 1..=255u8 {
                let mut corrupt = data;
                corrupt[i] = corrupt[i].wrapping_add(delta);
                assert_ne!(checksum(&corrupt), reference);
            }
        }
    }
}
