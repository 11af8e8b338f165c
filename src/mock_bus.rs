//! Scripted [`GpibBus`] for testing instrument drivers without hardware.
//!
//! [`MockBus`] records every operation as a [`BusEvent`] and answers reads
//! from two queues: status lines (consumed by the read that follows a
//! status poll) and ordinary responses (consumed by every other read and
//! by queries).
//!
//! ```
//! use spm15_rs::gpib_bus::GpibBus;
//! use spm15_rs::mock_bus::{BusEvent, MockBus};
//!
//! let mut bus = MockBus::new();
//! bus.push_status("16");
//! bus.push_response("-12.5");
//!
//! bus.request_status_poll().unwrap();
//! assert_eq!(bus.read().unwrap(), "16");
//! assert_eq!(bus.query("++read eoi").unwrap(), "-12.5");
//! assert_eq!(bus.events()[0], BusEvent::StatusPoll);
//! ```

use std::collections::VecDeque;

use crate::gpib_bus::{check_address, BusError, GpibBus};

/// Status line returned when the status queue runs dry: not busy.
const IDLE_STATUS: &str = "0";

/// One operation observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Write(String),
    Read,
    Query(String),
    StatusPoll,
    SwitchAddress(u8),
    ResetBus,
    ReleaseToLocal,
}

#[derive(Debug)]
pub struct MockBus {
    /// Every operation in call order.
    events: Vec<BusEvent>,
    /// Lines returned by reads following a status poll.
    statuses: VecDeque<String>,
    /// Lines returned by every other read and by queries.
    responses: VecDeque<String>,
    status_pending: bool,
    address: Option<u8>,
    connected: bool,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            statuses: VecDeque::new(),
            responses: VecDeque::new(),
            status_pending: false,
            address: None,
            connected: true,
        }
    }

    /// Queue a status line. Once the queue is empty polls report `"0"`.
    pub fn push_status(&mut self, status: &str) {
        self.statuses.push_back(status.to_string());
    }

    pub fn push_statuses<'a>(&mut self, statuses: impl IntoIterator<Item = &'a str>) {
        for status in statuses {
            self.push_status(status);
        }
    }

    /// Queue a response line. Once the queue is empty reads return `""`.
    pub fn push_response(&mut self, response: &str) {
        self.responses.push_back(response.to_string());
    }

    pub fn events(&self) -> &[BusEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Payloads of all `write` calls, in order.
    pub fn writes(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                BusEvent::Write(command) => Some(command.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn address_switches(&self) -> usize {
        self.count(|event| matches!(event, BusEvent::SwitchAddress(_)))
    }

    pub fn status_polls(&self) -> usize {
        self.count(|event| matches!(event, BusEvent::StatusPoll))
    }

    /// Simulate another controller or driver pointing the bus elsewhere.
    /// Not recorded as an event.
    pub fn point_at(&mut self, address: u8) {
        self.address = Some(address);
    }

    /// When disconnected every operation fails with [`BusError::Disconnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    fn count(&self, predicate: impl Fn(&BusEvent) -> bool) -> usize {
        self.events.iter().filter(|event| predicate(event)).count()
    }

    fn record(&mut self, event: BusEvent) -> Result<(), BusError> {
        if !self.connected {
            return Err(BusError::Disconnected);
        }
        self.events.push(event);
        Ok(())
    }

    fn next_line(&mut self) -> String {
        if std::mem::take(&mut self.status_pending) {
            self.statuses
                .pop_front()
                .unwrap_or_else(|| IDLE_STATUS.to_string())
        } else {
            self.responses.pop_front().unwrap_or_default()
        }
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl GpibBus for MockBus {
    fn write(&mut self, command: &str) -> Result<(), BusError> {
        self.record(BusEvent::Write(command.to_string()))
    }

    fn read(&mut self) -> Result<String, BusError> {
        self.record(BusEvent::Read)?;
        Ok(self.next_line())
    }

    fn query(&mut self, command: &str) -> Result<String, BusError> {
        self.record(BusEvent::Query(command.to_string()))?;
        Ok(self.next_line())
    }

    fn request_status_poll(&mut self) -> Result<(), BusError> {
        self.record(BusEvent::StatusPoll)?;
        self.status_pending = true;
        Ok(())
    }

    fn switch_address(&mut self, address: u8) -> Result<(), BusError> {
        check_address(address)?;
        self.record(BusEvent::SwitchAddress(address))?;
        self.address = Some(address);
        Ok(())
    }

    fn current_address(&self) -> Option<u8> {
        self.address
    }

    fn reset_bus(&mut self) -> Result<(), BusError> {
        self.record(BusEvent::ResetBus)
    }

    fn release_to_local(&mut self) -> Result<(), BusError> {
        self.record(BusEvent::ReleaseToLocal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_response_queues_are_separate() {
        let mut bus = MockBus::new();
        bus.push_statuses(["16", ""]);
        bus.push_response("F00001000,-3.2");

        assert_eq!(bus.read().unwrap(), "F00001000,-3.2");
        bus.request_status_poll().unwrap();
        assert_eq!(bus.read().unwrap(), "16");
        bus.request_status_poll().unwrap();
        assert_eq!(bus.read().unwrap(), "");
        bus.request_status_poll().unwrap();
        assert_eq!(bus.read().unwrap(), IDLE_STATUS);
        assert_eq!(bus.read().unwrap(), "");
        assert_eq!(bus.status_polls(), 3);
    }

    #[test]
    fn test_writes_filter() {
        let mut bus = MockBus::new();
        bus.write("B0,").unwrap();
        bus.query("++read eoi").unwrap();
        bus.write("T1,").unwrap();
        assert_eq!(bus.writes(), ["B0,", "T1,"]);

        bus.clear_events();
        assert!(bus.events().is_empty());
    }

    #[test]
    fn test_point_at_is_not_an_event() {
        let mut bus = MockBus::new();
        bus.switch_address(5).unwrap();
        bus.point_at(9);
        assert_eq!(bus.current_address(), Some(9));
        assert_eq!(bus.address_switches(), 1);
        assert!(matches!(
            bus.switch_address(31),
            Err(BusError::InvalidAddress(31))
        ));
    }

    #[test]
    fn test_disconnected_bus_fails() {
        let mut bus = MockBus::new();
        bus.set_connected(false);
        assert!(matches!(bus.write("B0,"), Err(BusError::Disconnected)));
        assert!(matches!(bus.read(), Err(BusError::Disconnected)));
        assert!(bus.events().is_empty());
    }
}
