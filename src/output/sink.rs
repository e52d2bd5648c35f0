use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use crate::errors::Result;

/// Receives finished strings in output order.
pub trait OutputSink: Send {
    fn write_chunk(&mut self, chunk: &str) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

impl<W: Write + Send> OutputSink for W {
    fn write_chunk(&mut self, chunk: &str) -> Result<()> {
        self.write_all(chunk.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Write::flush(self)?;
        Ok(())
    }
}

/// In-memory sink whose clones all append to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        SharedBuffer::default()
    }

    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
