use arrayvec::ArrayVec;

// Room for the echo of a maximum size command followed by a maximum size reply,
// with some slack for line noise.
const BUFFER_LEN: usize = 64;

#[derive(Debug, Default)]
pub(crate) struct Buffer {
    data: ArrayVec<u8, BUFFER_LEN>,
    read_pos: usize,
}

impl Buffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len() - self.read_pos
    }

    pub(crate) fn consume(&mut self, len: usize) {
        assert!(len <= self.len());
        self.read_pos += len;
    }

    /// Append `bytes`, discarding consumed data first. Bytes that don't fit are
    /// dropped and the number of bytes actually stored is returned.
    pub(crate) fn write(&mut self, bytes: &[u8]) -> usize {
        if self.read_pos > 0 {
            self.data.drain(..self.read_pos);
            self.read_pos = 0;
        }
        let len = bytes.len().min(self.data.remaining_capacity());
        // can't fail, len is bounded by the remaining capacity
        let _ = self.data.try_extend_from_slice(&bytes[..len]);
        len
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.data[self.read_pos..]
    }
}
