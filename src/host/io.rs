//! Blocking bus host on top of a `std::io` stream, such as a serial port.

use std::convert::Infallible;
use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::digital::{ErrorType, OutputPin};
use log::{debug, warn};
use snafu::{ResultExt, Snafu};

use super::{ReceiverResult, ReplyError, SendCommand};
use crate::timing::Timing;
use crate::types::{Address, Error as TypeError, IntoAddress, Payload};

/// Error type for the blocking host.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The address or payload can't be sent.
    #[snafu(display("Invalid command: {}", source))]
    InvalidCommand {
        /// The underlying error.
        source: TypeError,
    },
    /// Reading from or writing to the bus failed.
    #[snafu(display("Bus I/O error: {}", source))]
    Io {
        /// The underlying error.
        source: std::io::Error,
    },
    /// The node didn't reply in time.
    #[snafu(display("No response from node {}", address))]
    NoResponse {
        /// The node the command was sent to.
        address: Address,
    },
    /// Data was received, but it isn't a valid reply.
    #[snafu(display("Invalid reply from node {}: {}", address, source))]
    InvalidReply {
        /// The node the command was sent to.
        address: Address,
        /// What was wrong with the reply.
        source: ReplyError,
    },
}

/// Timing of the host side of the bus.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HostTiming {
    /// Minimum time between the end of one transaction and the next command.
    pub frame_gap: Duration,
    /// How long to wait for a reply after the command has been sent.
    pub reply_timeout: Duration,
    /// Line timing, used to hold the line driver while the command shifts out.
    pub line: Timing,
}

impl Default for HostTiming {
    fn default() -> Self {
        Self {
            frame_gap: Duration::from_millis(10),
            reply_timeout: Duration::from_millis(10),
            line: Timing::default(),
        }
    }
}

/// Line enable for transceivers that switch direction by themselves, such as
/// most USB RS-485 adapters.
#[derive(Debug, Default, Copy, Clone)]
pub struct AutoDirection;

impl ErrorType for AutoDirection {
    type Error = Infallible;
}

impl OutputPin for AutoDirection {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Bus host performing one transaction at a time over `io`.
///
/// `io` must return reasonably soon from `read` when no data is available,
/// with `Ok(0)` or a `TimedOut`/`WouldBlock` error, so the reply timeout can be
/// enforced. Serial ports opened with a short timeout do that.
///
/// ```no_run
/// # fn open_serial_port() -> std::io::Cursor<Vec<u8>> { unimplemented!() }
/// use commbus::host::io::{AutoDirection, Host};
///
/// let mut host = Host::new(open_serial_port(), AutoDirection);
/// let reply = host.node_io(4, &[100, 20])?;
/// println!("Node 4 says {:?}", reply);
/// # Ok::<(), commbus::host::io::Error>(())
/// ```
#[derive(Debug)]
pub struct Host<IO, P> {
    io: IO,
    tx_enable: P,
    timing: HostTiming,
    last_transaction: Option<Instant>,
}

impl<IO, P> Host<IO, P>
where
    IO: Read + Write,
    P: OutputPin,
{
    /// Create a new host with default timing.
    pub fn new(io: IO, tx_enable: P) -> Self {
        Self::with_timing(io, tx_enable, HostTiming::default())
    }

    /// Create a new host with the given timing.
    pub fn with_timing(io: IO, tx_enable: P, timing: HostTiming) -> Self {
        let mut host = Self {
            io,
            tx_enable,
            timing,
            last_transaction: None,
        };
        host.set_line_enable(false);
        host
    }

    /// Send `payload` to the node at `address`, and return the payload of its reply.
    ///
    /// Blocks for at most the frame gap plus the reply timeout, roughly.
    /// # Errors
    /// See [`Error`]. The bus is left ready for the next transaction in all cases.
    pub fn node_io(&mut self, address: impl IntoAddress, payload: &[u8]) -> Result<Payload, Error> {
        let command = SendCommand::new(address, payload).context(InvalidCommandSnafu)?;
        let address = command.address();

        if let Some(last) = self.last_transaction {
            let elapsed = last.elapsed();
            if elapsed < self.timing.frame_gap {
                thread::sleep(self.timing.frame_gap - elapsed);
            }
        }

        self.discard_input()?;
        self.send(command.get_data())?;
        let sent = Instant::now();
        self.last_transaction = Some(sent);

        let mut receiver = command.data_sent();
        let mut buf = [0; 32];
        loop {
            if sent.elapsed() > self.timing.reply_timeout {
                debug!("No response from node {}", address);
                return NoResponseSnafu { address }.fail();
            }
            let len = match self.io.read(&mut buf) {
                Ok(len) => len,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    0
                }
                Err(e) => return Err(e).context(IoSnafu),
            };
            if len == 0 {
                continue;
            }
            receiver = match receiver.receive_data(&buf[..len]) {
                ReceiverResult::NeedData(receiver) => receiver,
                ReceiverResult::Done(result) => {
                    return result.context(InvalidReplySnafu { address });
                }
            };
        }
    }

    /// Give back the stream and the line enable pin.
    pub fn into_inner(self) -> (IO, P) {
        (self.io, self.tx_enable)
    }

    /// Drop whatever is waiting on the input, such as a reply that arrived
    /// after an earlier transaction timed out.
    fn discard_input(&mut self) -> Result<(), Error> {
        let mut buf = [0; 32];
        let mut discarded = 0usize;
        loop {
            match self.io.read(&mut buf) {
                Ok(0) => break,
                Ok(len) => discarded += len,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    break
                }
                Err(e) => return Err(e).context(IoSnafu),
            }
        }
        if discarded > 0 {
            debug!("Discarded {} stale bytes before sending", discarded);
        }
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        self.set_line_enable(true);
        let result = self.io.write_all(data);
        if result.is_ok() {
            // Flushing a serial port can take tens of milliseconds, hold the
            // line for the computed shift-out time instead.
            let hold = self.timing.line.hold_time_us(data.len());
            thread::sleep(Duration::from_micros(hold.into()));
        }
        self.set_line_enable(false);
        result.context(IoSnafu)
    }

    fn set_line_enable(&mut self, enable: bool) {
        let result = if enable {
            self.tx_enable.set_high()
        } else {
            self.tx_enable.set_low()
        };
        if let Err(e) = result {
            warn!("Failed to set line enable {}: {:?}", enable, e);
        }
    }
}
