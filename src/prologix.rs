//! [`GpibBus`] over a Prologix-style GPIB-USB controller.
//!
//! The controller shows up as a serial port. Lines starting with `++` are
//! commands for the controller itself; everything else is forwarded to the
//! addressed instrument.

use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

use crate::gpib_bus::{check_address, BusError, GpibBus};

const ESCAPE: u8 = 0x1b;
const CONTROLLER_PREFIX: &str = "++";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrologixConfig {
    pub baud_rate: u32,
    /// How long [`GpibBus::read`] waits for a complete line.
    pub read_timeout: Duration,
}

impl Default for PrologixConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            read_timeout: Duration::from_millis(500),
        }
    }
}

pub struct PrologixBus {
    serial: Box<dyn SerialPort>,
    read_timeout: Duration,
    address: Option<u8>,
}

impl std::fmt::Debug for PrologixBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrologixBus")
            .field("port", &self.serial.name())
            .field("read_timeout", &self.read_timeout)
            .field("address", &self.address)
            .finish()
    }
}

impl PrologixBus {
    pub fn open(port: &str) -> Result<Self, BusError> {
        Self::open_with(port, PrologixConfig::default())
    }

    pub fn open_with(port: &str, config: PrologixConfig) -> Result<Self, BusError> {
        log::debug!("Opening Prologix controller on {}", port);
        let serial = serialport::new(port, config.baud_rate)
            .timeout(Duration::from_millis(10))
            .open()?;
        Self::from_port(serial, config)
    }

    /// Take over an already opened port and switch the controller into
    /// controller mode with manual read-after-write.
    pub fn from_port(serial: Box<dyn SerialPort>, config: PrologixConfig) -> Result<Self, BusError> {
        let mut bus = Self {
            serial,
            read_timeout: config.read_timeout,
            address: None,
        };

        bus.flush()?;
        bus.send_line("++mode 1")?;
        bus.send_line("++auto 0")?;

        let ver = bus.query("++ver")?;
        log::debug!("Prologix version: {}", ver);

        Ok(bus)
    }

    fn flush(&mut self) -> Result<(), BusError> {
        self.serial.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }

    fn send_line(&mut self, line: &str) -> Result<(), BusError> {
        let mut bytes = if line.starts_with(CONTROLLER_PREFIX) {
            line.as_bytes().to_vec()
        } else {
            escape_payload(line.as_bytes())
        };
        bytes.push(b'\n');
        self.serial.write_all(&bytes)?;
        self.serial.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, BusError> {
        let mut response = Vec::new();
        let start = Instant::now();

        loop {
            let mut byte = [0u8; 1];
            match self.serial.read_exact(&mut byte) {
                Ok(()) if byte[0] == b'\n' => break,
                Ok(()) => response.push(byte[0]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    if start.elapsed() >= self.read_timeout {
                        log::debug!(
                            "Read timed out after {:?} with {} bytes",
                            self.read_timeout,
                            response.len()
                        );
                        break;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        let line = String::from_utf8(response)?;
        Ok(line.trim_end_matches('\r').to_string())
    }
}

impl GpibBus for PrologixBus {
    fn write(&mut self, command: &str) -> Result<(), BusError> {
        log::trace!("GPIB <- {:?}", command);
        self.send_line(command)
    }

    fn read(&mut self) -> Result<String, BusError> {
        let line = self.read_line()?;
        log::trace!("GPIB -> {:?}", line);
        Ok(line)
    }

    fn request_status_poll(&mut self) -> Result<(), BusError> {
        self.send_line("++spoll")
    }

    fn switch_address(&mut self, address: u8) -> Result<(), BusError> {
        let address = check_address(address)?;
        self.send_line(&format!("++addr {}", address))?;
        self.address = Some(address);
        Ok(())
    }

    fn current_address(&self) -> Option<u8> {
        self.address
    }

    fn reset_bus(&mut self) -> Result<(), BusError> {
        self.send_line("++clr")
    }

    fn release_to_local(&mut self) -> Result<(), BusError> {
        self.send_line("++loc")
    }
}

/// Prefix CR, LF, ESC and `+` with ESC so the controller passes them through
/// to the instrument instead of interpreting them.
fn escape_payload(payload: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(payload.len());
    for &byte in payload {
        if matches!(byte, b'\r' | b'\n' | ESCAPE | b'+') {
            escaped.push(ESCAPE);
        }
        escaped.push(byte);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_payload() {
        assert_eq!(escape_payload(b"B0,"), b"B0,");
        assert_eq!(escape_payload(b"L+05.0,"), b"L\x1b+05.0,");
        assert_eq!(escape_payload(b"a\r\n\x1b"), b"a\x1b\r\x1b\n\x1b\x1b");
    }

    #[test]
    fn test_default_config() {
        let config = PrologixConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.read_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_open_missing_port_fails() {
        let result = PrologixBus::open("/dev/this-port-does-not-exist");
        assert!(matches!(
            result,
            Err(BusError::SerialPort(_)) | Err(BusError::Io(_))
        ));
    }
}
