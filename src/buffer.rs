//! Fixed-capacity byte buffer with contiguous read/write spans (spec §4.A).
//!
//! The buffer never grows and never panics on a full or empty condition; it
//! simply reports zero-length spans. Callers drive `commit_read`/
//! `commit_write` after consuming/producing bytes through the spans handed
//! back by `read_slice`/`write_slice`.

pub struct Buffer {
    data: Vec<u8>,
    read: usize,
    write: usize,
}

impl Buffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            read: 0,
            write: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn can_read(&self) -> bool {
        self.read < self.write
    }

    pub fn can_write(&self) -> bool {
        self.write < self.data.len()
    }

    /// Readable contiguous span.
    pub fn read_slice(&self) -> &[u8] {
        &self.data[self.read..self.write]
    }

    pub fn commit_read(&mut self, n: usize) {
        self.read = (self.read + n).min(self.write);
        if self.read == self.write {
            self.reset();
        }
    }

    /// Writable contiguous span. May compact first to maximize the span.
    pub fn write_slice(&mut self) -> &mut [u8] {
        self.compact_if_useful();
        &mut self.data[self.write..]
    }

    pub fn commit_write(&mut self, n: usize) {
        self.write = (self.write + n).min(self.data.len());
    }

    /// Drop the buffer back to empty; safe any time nothing is pending.
    pub fn reset(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    /// Appends as many bytes as fit, returns how many were copied in.
    pub fn fill_from(&mut self, bytes: &[u8]) -> usize {
        self.compact_if_useful();
        let dst = &mut self.data[self.write..];
        let n = bytes.len().min(dst.len());
        dst[..n].copy_from_slice(&bytes[..n]);
        self.write += n;
        n
    }

    fn compact_if_useful(&mut self) {
        if self.read == 0 {
            return;
        }
        if self.read == self.write {
            self.reset();
            return;
        }
        self.data.copy_within(self.read..self.write, 0);
        self.write -= self.read;
        self.read = 0;
    }
}
