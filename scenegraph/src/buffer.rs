use std::fmt;

/// Error raised when a buffer access falls outside the allocated range.
#[derive(Debug, PartialEq, Eq)]
pub enum BufferError {
    OutOfRange {
        offset: usize,
        len: usize,
        size: usize,
    },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::OutOfRange { offset, len, size } => write!(
                f,
                "buffer access of {len} bytes at offset {offset} exceeds size {size}"
            ),
        }
    }
}

impl std::error::Error for BufferError {}

/// A linear memory resource with offset-addressed read/write access.
///
/// Geometry and material sources reach the renderer exclusively through this
/// contract. `as_slice`/`as_mut_slice` give scoped direct access; the borrow
/// is the lock.
pub trait LinearBuffer {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, dst: &mut [u8], src_offset: usize) -> Result<(), BufferError>;
    fn write(&mut self, src: &[u8], dst_offset: usize) -> Result<(), BufferError>;

    fn as_slice(&self) -> &[u8];
    fn as_mut_slice(&mut self) -> &mut [u8];
}

/// Heap-backed implementation of [`LinearBuffer`].
pub struct HeapBuffer {
    data: Vec<u8>,
}

impl HeapBuffer {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
        }
    }
}

fn check_range(offset: usize, len: usize, size: usize) -> Result<(), BufferError> {
    if offset.checked_add(len).is_some_and(|end| end <= size) {
        Ok(())
    } else {
        Err(BufferError::OutOfRange { offset, len, size })
    }
}

impl LinearBuffer for HeapBuffer {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn read(&self, dst: &mut [u8], src_offset: usize) -> Result<(), BufferError> {
        check_range(src_offset, dst.len(), self.data.len())?;
        dst.copy_from_slice(&self.data[src_offset..src_offset + dst.len()]);
        Ok(())
    }

    fn write(&mut self, src: &[u8], dst_offset: usize) -> Result<(), BufferError> {
        check_range(dst_offset, src.len(), self.data.len())?;
        self.data[dst_offset..dst_offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
