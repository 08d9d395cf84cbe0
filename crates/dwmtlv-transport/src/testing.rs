//! Pseudo-terminal helpers for exercising serial code without a module attached.

use std::ffi::CStr;
use std::fs::File;
use std::io;
use std::os::fd::{FromRawFd, OwnedFd};
use std::path::PathBuf;

/// Allocates a pseudo-terminal and returns the master side plus the slave
/// device path. The slave path opens like any other serial port.
pub fn open_pty() -> io::Result<(File, PathBuf)> {
    // SAFETY: posix_openpt returns a fresh descriptor or -1.
    let raw = unsafe { libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY) };
    if raw < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `raw` is a valid descriptor owned by nobody else.
    let master = unsafe { OwnedFd::from_raw_fd(raw) };

    // SAFETY: `raw` stays open for the duration of these calls; the name
    // buffer is sized and NUL-terminated by ptsname_r.
    let path = unsafe {
        if libc::grantpt(raw) != 0 || libc::unlockpt(raw) != 0 {
            return Err(io::Error::last_os_error());
        }
        let mut name = [0 as libc::c_char; 128];
        let rc = libc::ptsname_r(raw, name.as_mut_ptr(), name.len());
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        CStr::from_ptr(name.as_ptr()).to_string_lossy().into_owned()
    };

    Ok((File::from(master), PathBuf::from(path)))
}
