//! Hardware collaborators of the node driver.
//!
//! The line driver enable is any [`embedded_hal::digital::OutputPin`]; the
//! UART and the time base are represented by the [`Serial`] and [`Clock`] traits
//! below, which are small enough to implement on top of any HAL.

/// Byte oriented, non-blocking access to the UART connected to the bus transceiver.
pub trait Serial {
    /// Return the next received byte, or `None` if nothing is waiting.
    /// Must never block.
    fn read_byte(&mut self) -> Option<u8>;

    /// Queue one byte for transmission. The UART is expected to buffer outgoing
    /// bytes and shift them out on its own; the driver doesn't wait for it.
    fn write_byte(&mut self, byte: u8);
}

/// Monotonic microsecond counter, allowed to wrap around like `micros()` on
/// most microcontroller cores.
pub trait Clock {
    /// Current time in microseconds.
    fn now_us(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_us(&self) -> u32 {
        (**self).now_us()
    }
}

impl<S: Serial + ?Sized> Serial for &mut S {
    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn write_byte(&mut self, byte: u8) {
        (**self).write_byte(byte)
    }
}

#[cfg(feature = "std")]
pub use self::std_clock::StdClock;

#[cfg(feature = "std")]
mod std_clock {
    use std::time::Instant;

    /// [`Clock`](super::Clock) backed by [`Instant`], counting from its creation.
    #[derive(Debug, Copy, Clone)]
    pub struct StdClock {
        start: Instant,
    }

    impl StdClock {
        /// Start a new clock at zero.
        pub fn new() -> Self {
            Self {
                start: Instant::now(),
            }
        }
    }

    impl Default for StdClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl super::Clock for StdClock {
        fn now_us(&self) -> u32 {
            // truncation gives the same wrap-around as a hardware counter
            self.start.elapsed().as_micros() as u32
        }
    }
}
