//! See [`CommBus`] for more details.

use embedded_hal::digital::OutputPin;
use log::{trace, warn};

use crate::frame::{FrameBytes, StartByte};
use crate::hal::{Clock, Serial};
use crate::parser::FrameParser;
use crate::response::ResponseBuffer;
use crate::scheduler::{TransmitScheduler, TxAction};
use crate::timing::Timing;
use crate::types::{Address, Error as TypeError};

/// Bus node (listener) part of the protocol.
///
/// The driver owns the UART, the transceiver's driver-enable pin and a clock.
/// Call [`update()`](Self::update) at least once per millisecond, and as
/// often as possible while [`is_busy()`](Self::is_busy) returns true. Each call
/// finishes a pending transmission step or reads whatever bytes the UART has,
/// and returns without waiting.
///
/// When a command frame addressed to this node arrives, `on_receive` is called
/// with its payload from within `update()`, and the payload last given to
/// [`set_response()`](Self::set_response) is sent back after the guard delay.
/// The response is buffered, so the application can refresh it whenever its
/// state changes, independent of bus activity.
///
/// # Example
///
/// ```
/// # use commbus::hal::{Clock, Serial};
/// # use std::cell::Cell;
/// # struct Uart(Vec<u8>); impl Serial for Uart {
/// #     fn read_byte(&mut self) -> Option<u8> { self.0.pop() }
/// #     fn write_byte(&mut self, _: u8) {}
/// # }
/// # struct Micros(Cell<u32>);
/// # impl Clock for Micros { fn now_us(&self) -> u32 { self.0.get() } }
/// # use embedded_hal_mock::eh1::digital::{Mock, State, Transaction};
/// # let pin = Mock::new(&[Transaction::set(State::Low)]);
/// use commbus::{addr, CommBus, Timing};
///
/// let mut last_command = Vec::new();
/// let mut bus = CommBus::with_timing(
///     addr(3),
///     Uart(Vec::new()),
///     pin,
///     Micros(Cell::new(0)),
///     Timing::for_baud_rate(57_600).unwrap(),
///     |cmd: &[u8]| last_command = cmd.to_vec(),
/// );
/// bus.set_response(&[0x01, 0x02])?;
/// bus.update();
/// assert!(!bus.is_busy());
/// # let (_, mut pin, _) = bus.free();
/// # pin.done();
/// # Ok::<(), commbus::Error>(())
/// ```
#[derive(Debug)]
pub struct CommBus<S, P, C, F> {
    address: Address,
    serial: S,
    tx_enable: P,
    clock: C,
    on_receive: F,
    timing: Timing,
    parser: FrameParser,
    scheduler: TransmitScheduler,
    response: ResponseBuffer,
    outbound: FrameBytes,
}

impl<S, P, C, F> CommBus<S, P, C, F>
where
    S: Serial,
    P: OutputPin,
    C: Clock,
    F: FnMut(&[u8]),
{
    /// Create a new node driver answering to `address`, with default timing.
    ///
    /// The line driver is disabled immediately. The driver starts out
    /// resynchronizing, so commands are accepted once the bus has been quiet
    /// for [`Timing::resync_quiet_us`].
    pub fn new(address: Address, serial: S, tx_enable: P, clock: C, on_receive: F) -> Self {
        Self::with_timing(
            address,
            serial,
            tx_enable,
            clock,
            Timing::default(),
            on_receive,
        )
    }

    /// Create a new node driver with the given timing parameters.
    pub fn with_timing(
        address: Address,
        serial: S,
        tx_enable: P,
        clock: C,
        timing: Timing,
        on_receive: F,
    ) -> Self {
        let now = clock.now_us();
        let mut bus = Self {
            address,
            serial,
            tx_enable,
            clock,
            on_receive,
            timing,
            parser: FrameParser::new(now),
            scheduler: TransmitScheduler::new(),
            response: ResponseBuffer::new(),
            outbound: FrameBytes::new(),
        };
        bus.set_line_enable(false);
        bus.response.build_if_dirty(address, &mut bus.outbound);
        bus
    }

    /// Advance the driver. Never blocks.
    pub fn update(&mut self) {
        let now = self.clock.now_us();

        match self.scheduler.poll(now, &self.timing) {
            TxAction::Hold => return,
            TxAction::Prepare => {
                self.response.build_if_dirty(self.address, &mut self.outbound);
                return;
            }
            TxAction::Transmit => {
                self.response.build_if_dirty(self.address, &mut self.outbound);
                self.transmit(now);
                return;
            }
            TxAction::Release => {
                self.set_line_enable(false);
                trace!("Line released");
            }
            TxAction::Receive => {}
        }

        if let Some(frame) = self.parser.poll(&mut self.serial, now, &self.timing) {
            if frame.start == StartByte::Command && frame.address == self.address {
                trace!("Command for us: {:02x?}", self.parser.payload());
                self.scheduler.arm(now);
                (self.on_receive)(self.parser.payload());
            } else {
                trace!("Ignoring {:?} frame for node {}", frame.start, frame.address);
            }
        }
    }

    /// Replace the payload sent with the next reply.
    ///
    /// The payload is copied, and only materialized into a frame right before
    /// it's needed, so calling this often is cheap.
    /// # Errors
    /// Returns [`TypeError::PayloadTooLong`] for more than 15 bytes, and keeps the
    /// previous payload.
    pub fn set_response(&mut self, payload: &[u8]) -> Result<(), TypeError> {
        self.response.set(payload)
    }

    /// True while a command for this node is being received, or a reply is
    /// waiting to be sent or being sent. Poll fast while this is set.
    pub fn is_busy(&self) -> bool {
        self.scheduler.is_active()
            || self.parser.receiving() == Some((StartByte::Command, self.address))
    }

    /// The address this node answers to.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The timing parameters in use.
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Give back the UART, the line enable pin and the clock.
    pub fn free(self) -> (S, P, C) {
        (self.serial, self.tx_enable, self.clock)
    }

    fn transmit(&mut self, now: u32) {
        self.set_line_enable(true);
        for byte in self.outbound.iter() {
            self.serial.write_byte(*byte);
        }
        // Flushing the UART takes longer than a bus slot, hold the line for the
        // computed shift-out time instead.
        self.scheduler.started(now, self.outbound.len(), &self.timing);
        trace!(
            "Sent {:02x?}, holding line for {} us",
            self.outbound.as_slice(),
            self.timing.hold_time_us(self.outbound.len())
        );
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
