//! Bus host (controller) part of the protocol.
//!
//! Every exchange on the bus is one command from the host followed by one reply
//! from the addressed node. A transaction starts with [`SendCommand`], which
//! holds the encoded command frame. Once the frame has been written to the bus,
//! [`SendCommand::data_sent`] turns it into a [`ReceiveReply`], which is fed
//! with the bytes read back from the bus until it reports a result.
//!
//! The bus is half-duplex, so the host reads back its own command before the
//! reply. The echo is recognized by its start byte and skipped.
//!
//! Reply timeouts are left to the caller. [`io::Host`] wraps all of this
//! around a `std::io` stream, including timing.
//!
//! # Example
//!
//! ```
//! use commbus::host::{ReceiverResult, SendCommand};
//!
//! let command = SendCommand::new(3, &[0x02, 0x03]).unwrap();
//! assert_eq!(command.get_data(), b"E\x32\x02\x03\x7c");
//!
//! let receiver = command.data_sent();
//! // The echo of the command, then the reply of node 3
//! match receiver.receive_data(b"E\x32\x02\x03\x7ce\x32\x01\x02\x9a") {
//!     ReceiverResult::Done(reply) => assert_eq!(reply.unwrap().as_slice(), &[1, 2]),
//!     ReceiverResult::NeedData(_) => unreachable!(),
//! }
//! ```

#[cfg(feature = "std")]
pub mod io;

use log::{trace, warn};
use snafu::Snafu;

use crate::buffer::Buffer;
use crate::frame::{encode, FrameBytes, StartByte};
use crate::nom_parser::{parse_frame, FrameToken};
use crate::types::{self, Address, Error as TypeError, IntoAddress, Payload};

/// Reasons a reply can't be accepted.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReplyError {
    /// The data on the bus doesn't start with a start byte.
    #[snafu(display("Invalid start byte {:#04x}", byte))]
    InvalidStartByte {
        /// The offending byte.
        byte: u8,
    },
    /// A frame arrived with a checksum that doesn't match its content.
    #[snafu(display(
        "Checksum mismatch in frame for node {}: expected {:#04x}, received {:#04x}",
        address,
        expected,
        received
    ))]
    ChecksumMismatch {
        /// Address field of the damaged frame.
        address: Address,
        /// Checksum computed over the received frame.
        expected: u8,
        /// Checksum byte that was received.
        received: u8,
    },
    /// A valid reply arrived, but from another node than the one addressed.
    #[snafu(display("Reply from node {}, expected node {}", received, expected))]
    WrongAddress {
        /// The node the command was sent to.
        expected: Address,
        /// The node that answered.
        received: Address,
    },
}

/// Struct with methods for the "transmit command on bus" state.
///
/// Call [`get_data()`](Self::get_data()) to get the frame to be transmitted,
/// and then call [`data_sent()`](Self::data_sent()) when it has been written.
#[derive(Debug, Clone)]
pub struct SendCommand {
    address: Address,
    data: FrameBytes,
}

impl SendCommand {
    /// Encode a command with `payload` for the node at `address`.
    /// # Errors
    /// Returns an error if the address is out of range, or the payload is
    /// longer than 15 bytes.
    pub fn new(address: impl IntoAddress, payload: &[u8]) -> Result<Self, TypeError> {
        let address = address.into_address()?;
        let payload = types::payload(payload)?;
        Ok(Self {
            address,
            data: encode(StartByte::Command, address, &payload),
        })
    }

    /// The node this command is for.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Returns the data to be sent on the bus.
    pub fn get_data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Signals that the command was sent, and it's time to wait for the reply.
    pub fn data_sent(self) -> ReceiveReply {
        ReceiveReply {
            address: self.address,
            buffer: Buffer::new(),
        }
    }
}

/// Outcome of feeding data to a [`ReceiveReply`].
#[derive(Debug)]
pub enum ReceiverResult {
    /// The reply isn't complete yet.
    NeedData(ReceiveReply),
    /// The transaction is finished, with the payload of the node's reply or the
    /// reason it couldn't be accepted.
    Done(Result<Payload, ReplyError>),
}

/// Struct with methods for the "receive reply from bus" state.
#[derive(Debug)]
pub struct ReceiveReply {
    address: Address,
    buffer: Buffer,
}

impl ReceiveReply {
    /// The node the reply is expected from.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Feed data into the internal buffer, and try to parse the buffer afterwards.
    pub fn receive_data(mut self, data: &[u8]) -> ReceiverResult {
        let stored = self.buffer.write(data);
        if stored < data.len() {
            trace!("Receive buffer full, dropped {} bytes", data.len() - stored);
        }

        loop {
            let (consumed, token) = parse_frame(self.buffer.as_ref());
            let result: Result<Payload, ReplyError> = match token {
                FrameToken::NeedData => return ReceiverResult::NeedData(self),
                FrameToken::Frame {
                    start: StartByte::Command,
                    address,
                    ..
                } => {
                    trace!("Skipping echo of command to node {}", address);
                    self.buffer.consume(consumed);
                    continue;
                }
                FrameToken::Frame {
                    start: StartByte::Reply,
                    address,
                    payload,
                } => {
                    if address == self.address {
                        Ok(payload.iter().copied().collect())
                    } else {
                        Err(ReplyError::WrongAddress {
                            expected: self.address,
                            received: address,
                        })
                    }
                }
                FrameToken::ChecksumMismatch {
                    address,
                    expected,
                    received,
                } => Err(ReplyError::ChecksumMismatch {
                    address,
                    expected,
                    received,
                }),
                FrameToken::InvalidStart(byte) => Err(ReplyError::InvalidStartByte { byte }),
            };
            if let Err(e) = &result {
                warn!("Transaction with node {} failed: {}", self.address, e);
            }
            return ReceiverResult::Done(result);
        }
    }
}
