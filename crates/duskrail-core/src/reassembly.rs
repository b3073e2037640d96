//! Fixed-capacity, write-by-offset, read-whole reassembly buffer.
//!
//! Grounded on the reference implementation's `buffer.Buffer`, with one
//! deliberate fix: writes that would exceed capacity are clamped instead
//! of panicking or corrupting adjacent memory (the reference implementation
//! does not clamp — see DESIGN.md).

/// Collects fragments of a single message by byte offset.
pub struct ReassemblyBuffer {
    buf: Vec<u8>,
    /// High-water mark: max(offset + len) seen so far.
    current: usize,
    /// Declared total length / buffer capacity.
    max: usize,
}

impl ReassemblyBuffer {
    /// Create a buffer sized to `capacity` bytes, zero-filled.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
            current: 0,
            max: capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.max
    }

    /// Current fill level: `min(current, max)`.
    pub fn size(&self) -> usize {
        self.current.min(self.max)
    }

    /// Write `chunk` at `offset`, updating the high-water mark first.
    /// Bytes that would land past `max` are dropped (clamped), not written.
    pub fn write(&mut self, chunk: &[u8], offset: usize) {
        let end = offset.saturating_add(chunk.len());
        self.current = self.current.max(end);

        if offset >= self.max {
            return;
        }
        let writable = chunk.len().min(self.max - offset);
        self.buf[offset..offset + writable].copy_from_slice(&chunk[..writable]);
    }

    /// Whether the declared total length has been fully received.
    pub fn is_complete(&self, total_length: usize) -> bool {
        self.size() == total_length
    }

    /// The buffer's bytes, valid once `is_complete` holds for the
    /// declared total length.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.size()]
    }
}
