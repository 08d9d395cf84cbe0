use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use dwmtlv_transport::{Connection, TransportError};
use tracing::debug;

use crate::codec::{encode_frame, Frame, HEADER_SIZE, MAX_VALUE_LEN};
use crate::error::{FrameError, Result};
use crate::tag::tag_name;

/// Writes complete TLV frames to any `Write` stream.
#[derive(Debug)]
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(HEADER_SIZE + MAX_VALUE_LEN),
        }
    }

    /// Write a complete frame (blocking) without touching pending input.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        encode_frame(frame.tlv_type, frame.value.as_ref(), &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => {
                    return Err(FrameError::WriteFailed(std::io::Error::from(
                        ErrorKind::WriteZero,
                    )))
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::WriteFailed(err)),
            }
        }

        self.flush()?;
        debug!(
            tlv_type = format_args!("{:#04x}", frame.tlv_type),
            tag = tag_name(frame.tlv_type),
            length = frame.len(),
            "sent frame"
        );
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::WriteFailed(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Connection> FrameWriter<T> {
    /// Send a request: discard whatever the device already sent, then write the frame.
    ///
    /// Stale bytes from an earlier, possibly malformed, exchange would
    /// otherwise be read as the reply to this request.
    pub fn send(&mut self, frame: &Frame) -> Result<()> {
        self.discard_input()?;
        self.write_frame(frame)
    }

    /// Drop all input received but not yet read.
    pub fn discard_input(&mut self) -> Result<()> {
        self.inner.discard_input().map_err(transport_to_frame_error)
    }
}

fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) => FrameError::Io(io),
        TransportError::Open { source, .. } | TransportError::Configure { source, .. } => {
            FrameError::Io(source)
        }
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
