use std::io::{ErrorKind, Read};
use std::time::Instant;

use bytes::Bytes;
#[cfg(unix)]
use dwmtlv_transport::SerialPort;
use tracing::{debug, trace};

use crate::cancel::CancelToken;
use crate::codec::{Frame, FrameConfig};
use crate::error::{is_disconnect, FrameError, Result};
use crate::tag::{is_filler, tag_name};

/// Reads complete TLV frames from any `Read` stream.
///
/// Filler bytes ahead of a frame are absorbed, so callers always get real
/// frames. Nothing is buffered beyond the current frame, so discarding the
/// device's input queue between requests leaves no stale state here.
#[derive(Debug)]
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
    cancel: Option<CancelToken>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            config,
            cancel: None,
        }
    }

    /// Observe `token` while reading frames.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Replace the cancellation token observed by subsequent reads.
    pub fn set_cancel_token(&mut self, token: Option<CancelToken>) {
        self.cancel = token;
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::Disconnected)` when the stream ends between
    /// frames and `Err(FrameError::ShortRead { .. })` when it ends inside one.
    /// Cancellation and the deadline are checked before every read slice.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let deadline = self.config.frame_timeout.map(|t| Instant::now() + t);

        let mut fillers = 0usize;
        let tlv_type = loop {
            let byte = self.read_type_byte(deadline)?;
            if !is_filler(byte) {
                break byte;
            }
            fillers += 1;
        };
        if fillers > 0 {
            trace!(fillers, "skipped filler bytes");
        }

        let mut len = [0u8; 1];
        self.fill(&mut len, deadline)?;
        let mut value = vec![0u8; len[0] as usize];
        self.fill(&mut value, deadline)?;

        debug!(
            tlv_type = format_args!("{tlv_type:#04x}"),
            tag = tag_name(tlv_type),
            length = value.len(),
            "received frame"
        );

        Ok(Frame {
            tlv_type,
            value: Bytes::from(value),
        })
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Read one byte at a frame boundary.
    fn read_type_byte(&mut self, deadline: Option<Instant>) -> Result<u8> {
        let mut byte = [0u8; 1];
        loop {
            if self.cancelled() {
                return Err(FrameError::Cancelled { partial: false });
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(FrameError::TimedOut { partial: false });
            }

            match self.inner.read(&mut byte) {
                Ok(0) => return Err(FrameError::Disconnected),
                Ok(_) => return Ok(byte[0]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::TimedOut => continue,
                Err(err) if is_disconnect(&err) => return Err(FrameError::Disconnected),
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Fill `buf` completely from inside a frame.
    fn fill(&mut self, buf: &mut [u8], deadline: Option<Instant>) -> Result<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            if self.cancelled() {
                return Err(FrameError::Cancelled { partial: true });
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(FrameError::TimedOut { partial: true });
            }

            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(FrameError::ShortRead {
                        expected: buf.len(),
                        received: filled,
                    })
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::TimedOut => continue,
                Err(err) if is_disconnect(&err) => {
                    return Err(FrameError::ShortRead {
                        expected: buf.len(),
                        received: filled,
                    })
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(unix)]
impl FrameReader<SerialPort> {
    /// Create a frame reader for a serial port, slicing blocking reads by the
    /// configured poll interval so cancellation and deadlines are observed.
    pub fn with_config_serial(mut inner: SerialPort, config: FrameConfig) -> Self {
        inner.set_read_timeout(Some(config.poll_interval));
        Self::with_config(inner, config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use super::*;
    use crate::tag::{TLV_TYPE_POS_XYZ, TLV_TYPE_RET_VAL, TLV_TYPE_RNG_AN_DIST};

    #[test]
    fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x40, 0x01, 0x00]));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.tlv_type, TLV_TYPE_RET_VAL);
        assert_eq!(frame.value.as_ref(), &[0x00]);
    }

    #[test]
    fn read_multiple_frames() {
        let wire = vec![0x40, 0x01, 0x00, 0x41, 0x02, 0xAA, 0xBB, 0x48, 0x00];
        let mut reader = FrameReader::new(Cursor::new(wire));

        let f1 = reader.read_frame().unwrap();
        let f2 = reader.read_frame().unwrap();
        let f3 = reader.read_frame().unwrap();

        assert_eq!((f1.tlv_type, f1.value.as_ref()), (0x40, [0x00].as_ref()));
        assert_eq!((f2.tlv_type, f2.value.as_ref()), (0x41, [0xAA, 0xBB].as_ref()));
        assert_eq!((f3.tlv_type, f3.value.len()), (TLV_TYPE_RNG_AN_DIST, 0));
    }

    #[test]
    fn filler_never_surfaces_for_any_run_length() {
        for k in 0..64usize {
            let mut wire = vec![0x00; k];
            wire.extend_from_slice(&[TLV_TYPE_POS_XYZ, 0x01, 0x5A]);

            let mut reader = FrameReader::new(Cursor::new(wire));
            let frame = reader.read_frame().unwrap();
            assert_eq!(frame.tlv_type, TLV_TYPE_POS_XYZ, "k = {k}");
            assert_eq!(frame.value.as_ref(), &[0x5A], "k = {k}");

            let err = reader.read_frame().unwrap_err();
            assert!(matches!(err, FrameError::Disconnected), "k = {k}");
        }
    }

    #[test]
    fn filler_inside_value_is_data() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x40, 0x01, 0x00, 0x48, 0x00]));
        let status = reader.read_frame().unwrap();
        assert_eq!(status.value.as_ref(), &[0x00]);
        let next = reader.read_frame().unwrap();
        assert_eq!(next.tlv_type, 0x48);
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: vec![0x00, 0x41, 0x03, 1, 2, 3],
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.tlv_type, 0x41);
        assert_eq!(frame.value.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Disconnected));
        assert!(!err.desynchronizes());
    }

    #[test]
    fn connection_closed_after_filler() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x00, 0x00]));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Disconnected));
    }

    #[test]
    fn connection_closed_before_length() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x41]));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::ShortRead {
                expected: 1,
                received: 0
            }
        ));
        assert!(err.desynchronizes());
    }

    #[test]
    fn connection_closed_mid_value() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x41, 0x0D, 1, 2, 3, 4, 5]));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::ShortRead {
                expected: 13,
                received: 5
            }
        ));
    }

    #[test]
    fn cancelled_before_frame_consumes_nothing() {
        let token = CancelToken::new();
        token.cancel();
        let mut reader =
            FrameReader::new(Cursor::new(vec![0x40, 0x01, 0x00])).with_cancel_token(token);

        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Cancelled { partial: false }));
        assert!(!err.desynchronizes());
        assert_eq!(reader.get_ref().position(), 0);
    }

    #[test]
    fn cancel_while_device_stalls_mid_frame() {
        let token = CancelToken::new();
        let mut reader = FrameReader::new(AlwaysTimedOut {
            prefix: vec![TLV_TYPE_POS_XYZ],
        })
        .with_cancel_token(token.clone());

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            token.cancel();
        });

        let started = Instant::now();
        let err = reader.read_frame().unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(err, FrameError::Cancelled { partial: true }));
        assert!(err.desynchronizes());
        assert!(err.is_connection_lost());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn cancel_after_type_byte_is_partial() {
        let token = CancelToken::new();
        let source = CancelAfterFirstByte {
            inner: Cursor::new(vec![0x41, 0x02, 0xAA, 0xBB]),
            token: token.clone(),
        };
        let mut reader = FrameReader::new(source).with_cancel_token(token);

        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Cancelled { partial: true }));
    }

    #[test]
    fn deadline_elapses_while_waiting_for_frame() {
        let cfg = FrameConfig {
            frame_timeout: Some(Duration::from_millis(30)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(AlwaysTimedOut { prefix: vec![] }, cfg);

        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::TimedOut { partial: false }));
        assert!(!err.desynchronizes());
    }

    #[test]
    fn deadline_elapses_mid_frame() {
        let cfg = FrameConfig {
            frame_timeout: Some(Duration::from_millis(30)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(
            AlwaysTimedOut {
                prefix: vec![0x41, 0x0D],
            },
            cfg,
        );

        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::TimedOut { partial: true }));
        assert!(err.desynchronizes());
    }

    #[test]
    fn read_would_block_propagates_io_error() {
        let reader = WouldBlockThenData {
            state: 0,
            bytes: vec![0x40, 0x01, 0x00],
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            state: 0,
            bytes: vec![0x40, 0x01, 0x00],
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let frame = framed.read_frame().unwrap();

        assert_eq!(frame.tlv_type, TLV_TYPE_RET_VAL);
        assert_eq!(frame.value.as_ref(), &[0x00]);
    }

    #[test]
    fn broken_pipe_between_frames_is_disconnect() {
        let mut reader = FrameReader::new(FailingReader(ErrorKind::BrokenPipe));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Disconnected));
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = FrameReader::new(cursor);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        assert!(reader.config().frame_timeout.is_none());
        let _inner = reader.into_inner();
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct CancelAfterFirstByte {
        inner: Cursor<Vec<u8>>,
        token: CancelToken,
    }

    impl Read for CancelAfterFirstByte {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.token.cancel();
            Ok(n)
        }
    }

    /// Yields `prefix` one byte at a time, then reports read timeouts forever.
    struct AlwaysTimedOut {
        prefix: Vec<u8>,
    }

    impl Read for AlwaysTimedOut {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.prefix.is_empty() && !buf.is_empty() {
                buf[0] = self.prefix.remove(0);
                return Ok(1);
            }
            std::thread::sleep(Duration::from_millis(5));
            Err(std::io::Error::from(ErrorKind::TimedOut))
        }
    }

    struct FailingReader(ErrorKind);

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(self.0))
        }
    }

    struct WouldBlockThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for WouldBlockThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
