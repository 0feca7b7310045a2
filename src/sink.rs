//! Append-only byte sinks.
//!
//! The creator never seeks: everything it produces is appended in order, so
//! any destination that can take a block of bytes and a flush can receive a
//! PDF. Implementations report failure through [`Error`]; the creator treats
//! every failure as fatal.

use crate::error::{Error, Result};
use std::io::Write;

/// Destination for the bytes of a PDF file.
pub trait ByteSink {
    /// Append a block of bytes.
    fn append_bytes(&mut self, data: &[u8]) -> Result<()>;

    /// Flush buffered bytes to the final destination.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Append a single byte.
    fn append_byte(&mut self, byte: u8) -> Result<()> {
        self.append_bytes(&[byte])
    }

    /// Append the decimal text form of an unsigned integer.
    fn append_decimal(&mut self, value: u64) -> Result<()> {
        self.append_bytes(value.to_string().as_bytes())
    }
}

impl ByteSink for Vec<u8> {
    fn append_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn append_bytes(&mut self, data: &[u8]) -> Result<()> {
        (**self).append_bytes(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<S: ByteSink + ?Sized> ByteSink for Box<S> {
    fn append_bytes(&mut self, data: &[u8]) -> Result<()> {
        (**self).append_bytes(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Adapter turning any [`std::io::Write`] into a [`ByteSink`].
///
/// ```no_run
/// use pdf_creator::sink::WriteSink;
/// use std::io::BufWriter;
///
/// let file = std::fs::File::create("out.pdf")?;
/// let sink = WriteSink::new(BufWriter::new(file));
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct WriteSink<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> WriteSink<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Number of bytes accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Get the wrapped writer back.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteSink for WriteSink<W> {
    fn append_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(Error::from)
    }
}
