//! Byte pump between the engine and the physical link.
use embedded_io::{Read, ReadReady, Write};

use crate::config::DeviceDescriptor;

/// Logical channel of a link that multiplexes commands and data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogicalChannel {
    Command,
    Data,
}

/// Link to one device.
///
/// Framing is done by the engine, the transport only moves bytes.
/// `receive` must not block: it returns whatever is buffered, possibly
/// nothing.
pub trait Transport {
    type Error: core::fmt::Debug;

    fn open(&mut self, descriptor: &DeviceDescriptor) -> Result<(), Self::Error>;

    fn close(&mut self) -> Result<(), Self::Error>;

    /// Drops buffered bytes and any partial state of the link.
    fn reset(&mut self) -> Result<(), Self::Error>;

    fn send(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Routes the link to `channel`. Links without data mode support
    /// can ignore this.
    fn select(&mut self, _channel: LogicalChannel) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// [`Transport`] over a single blocking UART.
pub struct Serial<RW> {
    inner: RW,
}

impl<RW> Serial<RW>
where
    RW: Read + ReadReady + Write,
{
    pub fn new(inner: RW) -> Self {
        Self { inner }
    }

    pub fn release(self) -> RW {
        self.inner
    }
}

impl<RW> Transport for Serial<RW>
where
    RW: Read + ReadReady + Write,
{
    type Error = RW::Error;

    fn open(&mut self, _descriptor: &DeviceDescriptor) -> Result<(), Self::Error> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.inner.flush()
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        let mut scratch = [0u8; 32];
        while self.inner.read_ready()? {
            if self.inner.read(&mut scratch)? == 0 {
                break;
            }
        }
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.inner.write_all(bytes)?;
        self.inner.flush()
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() || !self.inner.read_ready()? {
            return Ok(0);
        }
        self.inner.read(buf)
    }
}
