//! Incremental receive side of the node driver.
//!
//! Bytes are pulled from the UART one at a time; the parser keeps its progress
//! in [`RxState`] and returns as soon as the UART runs dry, so a frame may be
//! assembled over any number of calls.

use arrayvec::ArrayVec;
use log::{debug, trace};

use crate::checksum;
use crate::frame::{StartByte, MAX_FRAME_LEN};
use crate::hal::Serial;
use crate::timing::Timing;
use crate::types::Address;

/// Offset of the first payload byte in a frame.
const PAYLOAD_START: usize = 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum RxState {
    /// Framing was lost. Discarding input until the bus has been quiet for a while.
    Dirty,
    /// Waiting for a start byte.
    Ready,
    /// Waiting for the addr/len byte.
    Addr,
    /// Receiving payload bytes.
    Data,
    /// Waiting for the checksum byte.
    Checksum,
}

/// Header of a frame that passed the checksum test. The payload is available
/// from [`FrameParser::payload`] until the next call to [`FrameParser::poll`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Received {
    pub(crate) start: StartByte,
    pub(crate) address: Address,
}

#[derive(Debug)]
pub(crate) struct FrameParser {
    pub(crate) state: RxState,
    frame: ArrayVec<u8, MAX_FRAME_LEN>,
    start: StartByte,
    address: Address,
    data_len: usize,
    frame_start: u32,
    last_byte: u32,
}

impl FrameParser {
    /// A new parser starts out resynchronizing, since it can't know whether it
    /// was powered up in the middle of a frame.
    pub(crate) fn new(now: u32) -> Self {
        Self {
            state: RxState::Dirty,
            frame: ArrayVec::new(),
            start: StartByte::Command,
            address: Address::from_header(0),
            data_len: 0,
            frame_start: now,
            last_byte: now,
        }
    }

    /// Consume the bytes currently waiting in `serial`.
    ///
    /// Returns the header of a frame when its checksum byte arrives. Any bytes
    /// following it stay in the UART until the next call.
    pub(crate) fn poll<S: Serial>(
        &mut self,
        serial: &mut S,
        now: u32,
        timing: &Timing,
    ) -> Option<Received> {
        loop {
            if self.in_frame() && now.wrapping_sub(self.frame_start) > timing.frame_timeout_us {
                debug!(
                    "Frame timeout in state {:?} after {} of {} bytes",
                    self.state,
                    self.frame.len(),
                    self.data_len + PAYLOAD_START + 1
                );
                self.framing_error();
                return None;
            }

            match self.state {
                RxState::Dirty => {
                    let mut drained = 0usize;
                    while serial.read_byte().is_some() {
                        drained += 1;
                    }
                    if drained > 0 {
                        trace!("Discarded {} bytes while resynchronizing", drained);
                        self.last_byte = now;
                    } else if now.wrapping_sub(self.last_byte) > timing.resync_quiet_us {
                        trace!("Bus quiet, ready for the next frame");
                        self.state = RxState::Ready;
                    }
                    return None;
                }

                RxState::Ready => {
                    let byte = self.next_byte(serial, now)?;
                    match StartByte::from_byte(byte) {
                        Some(start) => {
                            self.frame.clear();
                            self.frame.push(byte);
                            self.start = start;
                            self.frame_start = now;
                            self.state = RxState::Addr;
                        }
                        None => {
                            debug!("Invalid start byte {:#04x}", byte);
                            self.framing_error();
                            return None;
                        }
                    }
                }

                RxState::Addr => {
                    let byte = self.next_byte(serial, now)?;
                    self.frame.push(byte);
                    self.address = Address::from_header(byte);
                    self.data_len = usize::from(byte & 0x0f);
                    self.state = RxState::Data;
                }

                RxState::Data => {
                    if self.frame.len() >= PAYLOAD_START + self.data_len {
                        self.state = RxState::Checksum;
                        continue;
                    }
                    let byte = self.next_byte(serial, now)?;
                    self.frame.push(byte);
                }

                RxState::Checksum => {
                    let received = self.next_byte(serial, now)?;
                    let expected = checksum(&self.frame);
                    if received != expected {
                        debug!(
                            "Checksum mismatch for node {}: expected {:#04x}, received {:#04x}",
                            self.address, expected, received
                        );
                        self.framing_error();
                        return None;
                    }
                    self.state = RxState::Ready;
                    return Some(Received {
                        start: self.start,
                        address: self.address,
                    });
                }
            }
        }
    }

    /// Payload of the most recently completed frame.
    pub(crate) fn payload(&self) -> &[u8] {
        self.frame.get(PAYLOAD_START..).unwrap_or(&[])
    }

    /// The start byte and target of the frame being received, once its addr/len
    /// byte has arrived.
    pub(crate) fn receiving(&self) -> Option<(StartByte, Address)> {
        match self.state {
            RxState::Data | RxState::Checksum => Some((self.start, self.address)),
            _ => None,
        }
    }

    fn in_frame(&self) -> bool {
        matches!(self.state, RxState::Addr | RxState::Data | RxState::Checksum)
    }

    fn next_byte<S: Serial>(&mut self, serial: &mut S, now: u32) -> Option<u8> {
        let byte = serial.read_byte()?;
        self.last_byte = now;
        Some(byte)
    }

    fn framing_error(&mut self) {
        self.frame.clear();
        self.state = RxState::Dirty;
    }
}
