use std::io::{Read, Write};

use crate::error::Result;

/// A connected byte stream to the module.
///
/// On top of plain I/O the protocol needs one more capability: throwing away
/// whatever the device has already sent, so a new request never consumes
/// stale bytes from a previous exchange.
pub trait Connection: Read + Write {
    /// Drop every byte received but not yet read.
    fn discard_input(&mut self) -> Result<()>;
}

impl<C: Connection + ?Sized> Connection for &mut C {
    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }
}
