// Byte transport for the thruster bus
//
// The core only needs write / bounded read / flush. `SerialTransport` is the
// production implementation on top of `serialport`.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{DataBits, Parity, SerialPort, StopBits};
use tracing::info;

use super::error::Result;

/// Full-duplex byte channel to the bus
pub trait Transport: Send {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read up to `max_bytes`. Returns fewer (possibly zero) bytes when the
    /// read timeout expires; never blocks past it.
    fn read(&mut self, max_bytes: usize) -> io::Result<Vec<u8>>;

    fn flush(&mut self) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn read(&mut self, max_bytes: usize) -> io::Result<Vec<u8>> {
        (**self).read(max_bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Serial port configured for the thruster drivers (8 data bits, no parity,
/// 2 stop bits)
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open_with(port_name: &str, baudrate: u32, timeout: Duration) -> Result<Self> {
        info!(
            "Opening thruster bus on {} ({} baud, {:?} timeout)",
            port_name, baudrate, timeout
        );
        let port = serialport::new(port_name, baudrate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::Two)
            .timeout(timeout)
            .open()?;

        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.port, bytes)
    }

    // Keeps reading while bytes keep arriving within the port timeout
    fn read(&mut self, max_bytes: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; max_bytes];
        let mut filled = 0;
        while filled < max_bytes {
            match Read::read(&mut self.port, &mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut self.port)
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port", &self.port.name())
            .finish()
    }
}
