use crate::frame::{encode, FrameBytes, StartByte};
use crate::types::{self, Address, Error as TypeError, Payload};

/// The payload the application wants sent with the next reply.
#[derive(Debug)]
pub(crate) struct ResponseBuffer {
    payload: Payload,
    dirty: bool,
}

impl ResponseBuffer {
    /// Starts out empty, but dirty, so the first reply is built from it.
    pub(crate) fn new() -> Self {
        Self {
            payload: Payload::new(),
            dirty: true,
        }
    }

    /// Replace the payload. Leaves the buffer untouched if `data` doesn't fit.
    pub(crate) fn set(&mut self, data: &[u8]) -> Result<(), TypeError> {
        self.payload = types::payload(data)?;
        self.dirty = true;
        Ok(())
    }

    /// Rebuild the outbound frame if the payload changed since the last build.
    /// Returns true if `frame` was rebuilt.
    pub(crate) fn build_if_dirty(&mut self, address: Address, frame: &mut FrameBytes) -> bool {
        if !self.dirty {
            return false;
        }
        *frame = encode(StartByte::Reply, address, &self.payload);
        self.dirty = false;
        true
    }
}
