//! Decides when the node may drive the shared line, and for how long.

use crate::timing::Timing;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum TxState {
    /// Nothing to send, the line is released.
    Idle,
    /// A reply is owed, waiting out the guard delay.
    Pending { since: u32 },
    /// The reply has been handed to the UART and the line driver is enabled.
    Sending { since: u32, hold_us: u32 },
}

/// What the driver has to do on this update.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum TxAction {
    /// The line is free, go ahead and receive.
    Receive,
    /// A reply is pending, but the guard delay hasn't passed yet.
    Prepare,
    /// Enable the line driver and transmit the reply now.
    Transmit,
    /// The transmission is still shifting out.
    Hold,
    /// The transmission is done, disable the line driver.
    Release,
}

#[derive(Debug)]
pub(crate) struct TransmitScheduler {
    pub(crate) state: TxState,
}

impl TransmitScheduler {
    pub(crate) const fn new() -> Self {
        Self {
            state: TxState::Idle,
        }
    }

    /// A command for us was accepted at `now`; a reply is owed.
    pub(crate) fn arm(&mut self, now: u32) {
        self.state = TxState::Pending { since: now };
    }

    /// The reply of `frame_len` bytes was written to the UART at `now`.
    pub(crate) fn started(&mut self, now: u32, frame_len: usize, timing: &Timing) {
        self.state = TxState::Sending {
            since: now,
            hold_us: timing.hold_time_us(frame_len),
        };
    }

    pub(crate) fn poll(&mut self, now: u32, timing: &Timing) -> TxAction {
        match self.state {
            TxState::Idle => TxAction::Receive,
            TxState::Pending { since } => {
                if now.wrapping_sub(since) < timing.guard_delay_us {
                    TxAction::Prepare
                } else {
                    TxAction::Transmit
                }
            }
            TxState::Sending { since, hold_us } => {
                if now.wrapping_sub(since) < hold_us {
                    TxAction::Hold
                } else {
                    self.state = TxState::Idle;
                    TxAction::Release
                }
            }
        }
    }

    /// True while a reply is owed or on its way out.
    pub(crate) fn is_active(&self) -> bool {
        self.state != TxState::Idle
    }
}
