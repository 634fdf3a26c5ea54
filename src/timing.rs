//! Bus timing configuration.
//!
//! All values are in microseconds. The defaults are for 115 200 baud, 8N1,
//! which is what the bus runs at. Use [`Timing::for_baud_rate`] for other
//! line speeds, and the `with_*` methods to tune individual values.

/// Baud rate the default timing values are derived from.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Start bit, eight data bits and one stop bit.
const BITS_PER_BYTE: u32 = 10;

/// Time to shift out one byte at [`DEFAULT_BAUD_RATE`].
pub const BYTE_TIME_US: u32 = 87;
/// Extra time the line driver stays enabled after the last byte has been shifted out.
pub const TX_PAD_US: u32 = 100;
/// Delay between accepting a command and driving the line, which gives the
/// host time to turn its own line driver off.
pub const GUARD_DELAY_US: u32 = 750;
/// Quiet time needed to consider the bus idle after a framing error.
pub const RESYNC_QUIET_US: u32 = 5_000;
/// Longest time a frame may take from start byte to checksum.
pub const FRAME_TIMEOUT_US: u32 = 8_000;

/// Timing parameters of the node driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Timing {
    /// Time to transmit a single byte.
    pub byte_time_us: u32,
    /// Padding added to the line driver hold time.
    pub tx_pad_us: u32,
    /// Minimum delay from frame acceptance to transmission of the response.
    pub guard_delay_us: u32,
    /// Quiet interval that ends resynchronization.
    pub resync_quiet_us: u32,
    /// Maximum duration of one inbound frame, measured from its start byte.
    pub frame_timeout_us: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            byte_time_us: BYTE_TIME_US,
            tx_pad_us: TX_PAD_US,
            guard_delay_us: GUARD_DELAY_US,
            resync_quiet_us: RESYNC_QUIET_US,
            frame_timeout_us: FRAME_TIMEOUT_US,
        }
    }
}

impl Timing {
    /// Default timing with the byte time computed for `baud`, rounded up.
    ///
    /// Returns `None` for a zero baud rate.
    pub const fn for_baud_rate(baud: u32) -> Option<Self> {
        if baud == 0 {
            return None;
        }
        let bit_time_total = BITS_PER_BYTE as u64 * 1_000_000;
        let byte_time = (bit_time_total + baud as u64 - 1) / baud as u64;
        Some(Self {
            byte_time_us: byte_time as u32,
            tx_pad_us: TX_PAD_US,
            guard_delay_us: GUARD_DELAY_US,
            resync_quiet_us: RESYNC_QUIET_US,
            frame_timeout_us: FRAME_TIMEOUT_US,
        })
    }

    /// Set the padding added to the transmit hold time.
    pub const fn with_tx_pad_us(mut self, tx_pad_us: u32) -> Self {
        self.tx_pad_us = tx_pad_us;
        self
    }

    /// Set the delay between frame acceptance and transmission.
    pub const fn with_guard_delay_us(mut self, guard_delay_us: u32) -> Self {
        self.guard_delay_us = guard_delay_us;
        self
    }

    /// Set the quiet interval used for resynchronization.
    pub const fn with_resync_quiet_us(mut self, resync_quiet_us: u32) -> Self {
        self.resync_quiet_us = resync_quiet_us;
        self
    }

    /// Set the maximum duration of an inbound frame.
    pub const fn with_frame_timeout_us(mut self, frame_timeout_us: u32) -> Self {
        self.frame_timeout_us = frame_timeout_us;
        self
    }

    /// How long the line driver must stay enabled after writing `frame_len`
    /// bytes to the UART.
    pub const fn hold_time_us(&self, frame_len: usize) -> u32 {
        let frame_len = if frame_len > u32::MAX as usize {
            u32::MAX
        } else {
            frame_len as u32
        };
        frame_len
            .saturating_mul(self.byte_time_us)
            .saturating_add(self.tx_pad_us)
    }
}
