use std::path::Path;

use dwmtlv_frame::{FrameReader, FrameWriter};
use dwmtlv_transport::{SerialConfig, SerialPort};
use tracing::debug;

use crate::error::Result;
use crate::locator::{Locator, LocatorConfig};

/// Open the module's serial port with default settings.
pub fn open(path: impl AsRef<Path>) -> Result<Locator<SerialPort>> {
    open_with_config(path, &SerialConfig::default(), LocatorConfig::default())
}

/// Open the module's serial port with explicit configuration.
///
/// The port is opened once and cloned: the reader slices its blocking reads
/// by the frame poll interval, the writer flushes stale input before each
/// request.
pub fn open_with_config(
    path: impl AsRef<Path>,
    serial: &SerialConfig,
    config: LocatorConfig,
) -> Result<Locator<SerialPort>> {
    let port = SerialPort::open(path, serial)?;
    let reader_port = port.try_clone()?;

    debug!(
        transport = port.transport_name(),
        path = %port.path().display(),
        baud_rate = port.baud_rate(),
        "device connected"
    );

    let reader = FrameReader::with_config_serial(reader_port, config.frame.clone());
    let writer = FrameWriter::new(port);
    Ok(Locator::from_parts(reader, writer, config))
}
