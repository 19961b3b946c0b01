// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::io;
use std::time::Duration;
use serialport::{SerialPort as SerialPortTrait, DataBits, Parity, StopBits};
use tracing::trace;
use crate::receiver::ControlSink;

// ============================================================================
// SerialPort Trait
// ============================================================================

/// Byte transport the XMODEM receiver runs over
pub trait SerialPort: Send {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Read whatever is available, waiting at most `timeout`. Nothing
    /// arriving is reported as `ErrorKind::TimedOut`.
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

// ============================================================================
// Real Serial Port Implementation
// ============================================================================

/// Real serial port implementation that wraps the serialport crate
pub struct RealSerialPort {
    port: Box<dyn SerialPortTrait>,
}

impl RealSerialPort {
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        data_bits: DataBits,
        parity: Parity,
        stop_bits: StopBits,
    ) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .timeout(Duration::from_millis(10))
            .open()?;

        // Drop anything left over from an earlier session
        port.clear(serialport::ClearBuffer::Input)?;

        Ok(RealSerialPort { port })
    }
}

impl SerialPort for RealSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.port.write_all(buf)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if self.port.timeout() != timeout {
            self.port.set_timeout(timeout).map_err(io::Error::other)?;
        }
        self.port.read(buf)
    }
}

// ============================================================================
// Serial Link (receiver output)
// ============================================================================

/// Owns the port and lets the receiver write control bytes to it.
///
/// The receiver cannot see I/O errors, so the first failed write is latched
/// here and later writes are dropped until the driver collects it.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    error: Option<io::Error>,
}

impl SerialLink {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        SerialLink { port, error: None }
    }

    pub fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.port.read_timeout(buf, timeout)
    }

    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }
}

impl ControlSink for SerialLink {
    fn emit(&mut self, byte: u8) {
        if self.error.is_some() {
            return;
        }
        match self.port.write_all(&[byte]) {
            Ok(()) => trace!("Sent: 0x{:02X}", byte),
            Err(e) => self.error = Some(e),
        }
    }
}

// ============================================================================
// Mock Serial Port for Testing
// ============================================================================

#[cfg(test)]
pub struct MockSerialPort {
    // Data to return on reads (None = timeout)
    read_buffer: Vec<Option<u8>>,
    read_pos: usize,
    // Track what was written
    write_log: Vec<u8>,
    // Expected writes for verification
    expected_writes: Vec<u8>,
    // Fail every write with this kind once set
    fail_writes: Option<io::ErrorKind>,
}

#[cfg(test)]
impl MockSerialPort {
    pub fn new(responses: Vec<Option<u8>>, expected_writes: Vec<u8>) -> Self {
        MockSerialPort {
            read_buffer: responses,
            read_pos: 0,
            write_log: Vec::new(),
            expected_writes,
            fail_writes: None,
        }
    }

    /// Wire bytes arriving back to back, with no read timeouts in between.
    pub fn with_bytes(bytes: &[u8], expected_writes: Vec<u8>) -> Self {
        Self::new(bytes.iter().copied().map(Some).collect(), expected_writes)
    }

    pub fn failing_writes(mut self, kind: io::ErrorKind) -> Self {
        self.fail_writes = Some(kind);
        self
    }
}

#[cfg(test)]
impl SerialPort for MockSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if let Some(kind) = self.fail_writes {
            return Err(io::Error::new(kind, "Mock write failure"));
        }
        self.write_log.extend_from_slice(buf);
        Ok(())
    }

    fn read_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
        // Out of responses = timeout
        if self.read_pos >= self.read_buffer.len() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "Mock timeout"
            ));
        }

        // If current response is None = timeout
        if self.read_buffer[self.read_pos].is_none() {
            self.read_pos += 1;
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "Mock timeout"
            ));
        }

        let mut bytes_read = 0;
        while bytes_read < buf.len() && self.read_pos < self.read_buffer.len() {
            match self.read_buffer[self.read_pos] {
                Some(byte) => {
                    buf[bytes_read] = byte;
                    bytes_read += 1;
                    self.read_pos += 1;
                }
                None => break,  // Stop at timeout marker
            }
        }

        Ok(bytes_read)
    }
}

#[cfg(test)]
impl Drop for MockSerialPort {
    fn drop(&mut self) {
        assert_eq!(
            self.read_pos,
            self.read_buffer.len(),
            "MockSerialPort dropped with {} unconsumed responses (read {} of {} bytes)",
            self.read_buffer.len() - self.read_pos,
            self.read_pos,
            self.read_buffer.len()
        );

        assert_eq!(
            &self.write_log,
            &self.expected_writes,
            "MockSerialPort write log mismatch!\nExpected {} bytes:\n{:02X?}\nGot {} bytes:\n{:02X?}",
            self.expected_writes.len(),
            self.expected_writes,
            self.write_log.len(),
            self.write_log
        );
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ACK, CRC_HANDSHAKE, NAK};

    #[test]
    fn test_link_forwards_control_bytes() {
        let mock = MockSerialPort::new(Vec::new(), vec![CRC_HANDSHAKE, ACK, NAK]);
        let mut link = SerialLink::new(Box::new(mock));
        link.emit(CRC_HANDSHAKE);
        link.emit(ACK);
        link.emit(NAK);
        assert!(link.take_error().is_none());
    }

    #[test]
    fn test_link_latches_write_error() {
        let mock = MockSerialPort::new(Vec::new(), Vec::new())
            .failing_writes(io::ErrorKind::BrokenPipe);
        let mut link = SerialLink::new(Box::new(mock));
        link.emit(ACK);
        link.emit(ACK);

        let err = link.take_error().expect("write error latched");
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(link.take_error().is_none());
    }

    #[test]
    fn test_link_reads_through_timeouts() {
        let mock = MockSerialPort::new(vec![Some(1), Some(2), None, Some(3)], Vec::new());
        let mut link = SerialLink::new(Box::new(mock));
        let mut buf = [0u8; 8];

        assert_eq!(link.read_timeout(&mut buf, Duration::from_millis(1)).unwrap(), 2);
        assert_eq!(&buf[..2], &[1, 2]);
        let err = link.read_timeout(&mut buf, Duration::from_millis(1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert_eq!(link.read_timeout(&mut buf, Duration::from_millis(1)).unwrap(), 1);
    }
}
