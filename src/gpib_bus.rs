//! Transport abstraction over a shared GPIB bus.
//!
//! A [`GpibBus`] talks to one device at a time: whichever address it was
//! last switched to. Instrument drivers own the command grammar; the bus
//! only moves lines of ASCII and performs the controller-level operations
//! (serial poll, device clear, go-to-local).

use std::cell::RefCell;
use std::rc::Rc;

/// Highest valid GPIB primary address.
pub const MAX_ADDRESS: u8 = 30;

/// Controller command that issues a group execute trigger to the addressed device.
pub const TRIGGER_COMMAND: &str = "++trg";

/// Controller command that reads from the addressed device until EOI.
pub const READ_EOI_COMMAND: &str = "++read eoi";

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("GPIB address {0} is out of range (0-30)")]
    InvalidAddress(u8),

    #[error("Bus is not connected")]
    Disconnected,
}

/// Blocking, line-oriented access to a GPIB bus.
///
/// Only one exchange may be in flight at a time. Callers sharing a bus
/// between several instruments must finish an exchange, including any
/// status polling, before starting the next one.
pub trait GpibBus {
    /// Send one line of ASCII to the addressed device. No response is read.
    fn write(&mut self, command: &str) -> Result<(), BusError>;

    /// Read one pending response line. An empty string means nothing arrived.
    fn read(&mut self) -> Result<String, BusError>;

    fn query(&mut self, command: &str) -> Result<String, BusError> {
        self.write(command)?;
        self.read()
    }

    /// Ask the addressed device for its status byte; it is returned by the next [`read`](Self::read).
    fn request_status_poll(&mut self) -> Result<(), BusError>;

    /// Point the bus at `address`.
    fn switch_address(&mut self, address: u8) -> Result<(), BusError>;

    /// Address the bus currently points at, `None` if it was never switched.
    fn current_address(&self) -> Option<u8>;

    /// Selected device clear.
    fn reset_bus(&mut self) -> Result<(), BusError>;

    /// Return the addressed device to front panel control.
    fn release_to_local(&mut self) -> Result<(), BusError>;
}

impl<T: GpibBus + ?Sized> GpibBus for &mut T {
    fn write(&mut self, command: &str) -> Result<(), BusError> {
        (**self).write(command)
    }

    fn read(&mut self) -> Result<String, BusError> {
        (**self).read()
    }

    fn query(&mut self, command: &str) -> Result<String, BusError> {
        (**self).query(command)
    }

    fn request_status_poll(&mut self) -> Result<(), BusError> {
        (**self).request_status_poll()
    }

    fn switch_address(&mut self, address: u8) -> Result<(), BusError> {
        (**self).switch_address(address)
    }

    fn current_address(&self) -> Option<u8> {
        (**self).current_address()
    }

    fn reset_bus(&mut self) -> Result<(), BusError> {
        (**self).reset_bus()
    }

    fn release_to_local(&mut self) -> Result<(), BusError> {
        (**self).release_to_local()
    }
}

/// Several instrument handles can share one bus on the same thread.
impl<T: GpibBus + ?Sized> GpibBus for Rc<RefCell<T>> {
    fn write(&mut self, command: &str) -> Result<(), BusError> {
        self.borrow_mut().write(command)
    }

    fn read(&mut self) -> Result<String, BusError> {
        self.borrow_mut().read()
    }

    fn query(&mut self, command: &str) -> Result<String, BusError> {
        self.borrow_mut().query(command)
    }

    fn request_status_poll(&mut self) -> Result<(), BusError> {
        self.borrow_mut().request_status_poll()
    }

    fn switch_address(&mut self, address: u8) -> Result<(), BusError> {
        self.borrow_mut().switch_address(address)
    }

    fn current_address(&self) -> Option<u8> {
        self.borrow().current_address()
    }

    fn reset_bus(&mut self) -> Result<(), BusError> {
        self.borrow_mut().reset_bus()
    }

    fn release_to_local(&mut self) -> Result<(), BusError> {
        self.borrow_mut().release_to_local()
    }
}

pub(crate) fn check_address(address: u8) -> Result<u8, BusError> {
    if address > MAX_ADDRESS {
        return Err(BusError::InvalidAddress(address));
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_bus::{BusEvent, MockBus};

    #[test]
    fn test_check_address() {
        assert_eq!(check_address(0).unwrap(), 0);
        assert_eq!(check_address(30).unwrap(), 30);
        assert!(matches!(check_address(31), Err(BusError::InvalidAddress(31))));
    }

    #[test]
    fn test_default_query_writes_then_reads() {
        struct LineBus {
            written: Vec<String>,
        }

        impl GpibBus for LineBus {
            fn write(&mut self, command: &str) -> Result<(), BusError> {
                self.written.push(command.to_string());
                Ok(())
            }
            fn read(&mut self) -> Result<String, BusError> {
                Ok(format!("echo {}", self.written.len()))
            }
            fn request_status_poll(&mut self) -> Result<(), BusError> {
                Ok(())
            }
            fn switch_address(&mut self, _address: u8) -> Result<(), BusError> {
                Ok(())
            }
            fn current_address(&self) -> Option<u8> {
                None
            }
            fn reset_bus(&mut self) -> Result<(), BusError> {
                Ok(())
            }
            fn release_to_local(&mut self) -> Result<(), BusError> {
                Ok(())
            }
        }

        let mut bus = LineBus { written: vec![] };
        assert_eq!(bus.query(READ_EOI_COMMAND).unwrap(), "echo 1");
        assert_eq!(bus.written, [READ_EOI_COMMAND]);
    }

    #[test]
    fn test_shared_bus_forwards_to_inner() {
        let shared = Rc::new(RefCell::new(MockBus::new()));
        let mut handle_a = Rc::clone(&shared);
        let mut handle_b = Rc::clone(&shared);

        handle_a.switch_address(4).unwrap();
        assert_eq!(handle_b.current_address(), Some(4));
        handle_b.write("B0,").unwrap();

        assert_eq!(
            shared.borrow().events(),
            [BusEvent::SwitchAddress(4), BusEvent::Write("B0,".to_string())]
        );
    }

    #[test]
    fn test_borrowed_bus_forwards_to_inner() {
        fn clear_and_release<B: GpibBus>(mut bus: B) -> Result<(), BusError> {
            bus.reset_bus()?;
            bus.release_to_local()
        }

        let mut bus = MockBus::new();
        clear_and_release(&mut bus).unwrap();
        assert_eq!(bus.events(), [BusEvent::ResetBus, BusEvent::ReleaseToLocal]);
    }
}
