use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Connection;
use crate::DEFAULT_BAUD_RATE;

/// Configuration for opening a serial device.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Line speed. Default: 115200.
    pub baud_rate: u32,
    /// Maximum time a single `read` call blocks. `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: None,
        }
    }
}

/// A serial device in raw mode (8N1, no flow control, no echo).
pub struct SerialPort {
    file: File,
    path: PathBuf,
    baud_rate: u32,
    read_timeout: Option<Duration>,
}

impl SerialPort {
    /// Open and configure a serial device.
    pub fn open(path: impl AsRef<Path>, config: &SerialConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let speed = baud_to_speed(config.baud_rate)?;

        // O_NONBLOCK keeps open() from waiting on carrier detect; it is cleared
        // again once CLOCAL is set.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&path)
            .map_err(|e| TransportError::Open {
                path: path.clone(),
                source: e,
            })?;

        configure_raw(&file, speed).map_err(|e| TransportError::Configure {
            path: path.clone(),
            source: e,
        })?;

        info!(?path, baud_rate = config.baud_rate, "opened serial port");

        Ok(Self {
            file,
            path,
            baud_rate: config.baud_rate,
            read_timeout: config.read_timeout,
        })
    }

    /// Set the maximum time a single read blocks.
    ///
    /// A read that times out fails with `ErrorKind::TimedOut` and consumes nothing.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    /// Current read timeout.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Try to clone this port (duplicates the file descriptor).
    ///
    /// Both handles share the device's input queue, so discarding input
    /// through one is visible through the other.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            file: self.file.try_clone()?,
            path: self.path.clone(),
            baud_rate: self.baud_rate,
            read_timeout: self.read_timeout,
        })
    }

    /// The device path this port was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured line speed.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "serial"
    }

    fn wait_readable(&self, timeout: Duration) -> io::Result<()> {
        let mut pfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        // SAFETY: `pfd` is a valid pollfd for the duration of the call and
        // the count of 1 matches.
        let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        if rc == 0 {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "serial read timed out",
            ));
        }
        if pfd.revents & libc::POLLIN == 0
            && pfd.revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0
        {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "serial device hung up",
            ));
        }
        Ok(())
    }
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(timeout) = self.read_timeout {
            self.wait_readable(timeout)?;
        }
        self.file.read(buf)
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        // SAFETY: the descriptor is owned by `self.file` and stays open for the call.
        let rc = unsafe { libc::tcdrain(self.file.as_raw_fd()) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Connection for SerialPort {
    fn discard_input(&mut self) -> Result<()> {
        // SAFETY: the descriptor is owned by `self.file` and stays open for the call.
        let rc = unsafe { libc::tcflush(self.file.as_raw_fd(), libc::TCIFLUSH) };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }
        debug!(path = ?self.path, "discarded pending input");
        Ok(())
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

fn baud_to_speed(baud_rate: u32) -> Result<libc::speed_t> {
    let speed = match baud_rate {
        9_600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        #[cfg(target_os = "linux")]
        460_800 => libc::B460800,
        #[cfg(target_os = "linux")]
        921_600 => libc::B921600,
        other => return Err(TransportError::UnsupportedBaudRate(other)),
    };
    Ok(speed)
}

fn configure_raw(file: &File, speed: libc::speed_t) -> io::Result<()> {
    let fd = file.as_raw_fd();

    // SAFETY: termios is a plain C struct; all-zero is a valid bit pattern and
    // it is fully overwritten by tcgetattr before use.
    let mut tty: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: `fd` is open for the lifetime of `file` and `tty` is a valid
    // writable termios.
    if unsafe { libc::tcgetattr(fd, &mut tty) } < 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: `tty` is a valid termios obtained from tcgetattr above.
    unsafe {
        libc::cfmakeraw(&mut tty);
        if libc::cfsetispeed(&mut tty, speed) < 0 || libc::cfsetospeed(&mut tty, speed) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    tty.c_cflag |= libc::CLOCAL | libc::CREAD;
    tty.c_cflag &= !(libc::CSTOPB | libc::PARENB);
    tty.c_cc[libc::VMIN] = 1;
    tty.c_cc[libc::VTIME] = 0;

    // SAFETY: `fd` is open and `tty` is a fully initialised termios.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tty) } < 0 {
        return Err(io::Error::last_os_error());
    }

    // Back to blocking reads now that the line ignores modem control.
    // SAFETY: fcntl on an open descriptor with integer flag arguments.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device() {
        let path = format!("/tmp/dwmtlv-missing-{}/ttyACM9", std::process::id());
        let result = SerialPort::open(&path, &SerialConfig::default());
        assert!(matches!(result, Err(TransportError::Open { .. })));
    }

    #[test]
    fn test_unsupported_baud_rate() {
        let config = SerialConfig {
            baud_rate: 12_345,
            ..SerialConfig::default()
        };
        let result = SerialPort::open("/dev/null", &config);
        assert!(matches!(
            result,
            Err(TransportError::UnsupportedBaudRate(12_345))
        ));
    }

    #[test]
    fn test_open_non_tty_fails_configure() {
        let result = SerialPort::open("/dev/null", &SerialConfig::default());
        assert!(matches!(result, Err(TransportError::Configure { .. })));
    }

    #[cfg(target_os = "linux")]
    mod pty {
        use super::*;
        use crate::testing;

        fn open_pty() -> (File, PathBuf) {
            testing::open_pty().unwrap()
        }

        #[test]
        fn test_read_write_through_pty() {
            let (mut master, slave_path) = open_pty();
            let mut port = SerialPort::open(&slave_path, &SerialConfig::default()).unwrap();
            assert_eq!(port.path(), slave_path.as_path());
            assert_eq!(port.baud_rate(), DEFAULT_BAUD_RATE);

            master.write_all(&[0x40, 0x01, 0x00]).unwrap();
            let mut buf = [0u8; 3];
            port.read_exact(&mut buf).unwrap();
            assert_eq!(buf, [0x40, 0x01, 0x00]);

            port.write_all(&[0x0C, 0x00]).unwrap();
            let mut request = [0u8; 2];
            master.read_exact(&mut request).unwrap();
            assert_eq!(request, [0x0C, 0x00]);
        }

        #[test]
        fn test_read_timeout_when_idle() {
            let (_master, slave_path) = open_pty();
            let config = SerialConfig {
                read_timeout: Some(Duration::from_millis(20)),
                ..SerialConfig::default()
            };
            let mut port = SerialPort::open(&slave_path, &config).unwrap();

            let mut buf = [0u8; 1];
            let err = port.read(&mut buf).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        }

        #[test]
        fn test_discard_input_drops_stale_bytes() {
            let (mut master, slave_path) = open_pty();
            let mut port = SerialPort::open(&slave_path, &SerialConfig::default()).unwrap();

            master.write_all(b"stale").unwrap();
            std::thread::sleep(Duration::from_millis(50));
            port.discard_input().unwrap();

            port.set_read_timeout(Some(Duration::from_millis(20)));
            let mut buf = [0u8; 1];
            let err = port.read(&mut buf).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::TimedOut);

            master.write_all(b"x").unwrap();
            port.set_read_timeout(Some(Duration::from_secs(1)));
            port.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"x");
        }

        #[test]
        fn test_cloned_handles_share_input() {
            let (mut master, slave_path) = open_pty();
            let port = SerialPort::open(&slave_path, &SerialConfig::default()).unwrap();
            let mut reader = port.try_clone().unwrap();

            master.write_all(b"ok").unwrap();
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"ok");
        }
    }
}
