//! # SPM15 RS
//!
//! A Rust driver for the Wandel & Goltermann SPM-15 selective level meter,
//! controlled over a shared GPIB bus.
//!
//! The driver builds the instrument's ASCII commands, keeps the bus addressed
//! to the right device and runs the trigger / busy-poll / read cycle of a
//! measurement. Moving bytes over the bus is left to a [`GpibBus`]
//! implementation, such as the bundled [`PrologixBus`] for Prologix-style
//! GPIB-USB controllers.
//!
//! ## Features
//!
//! - **Typed settings**: bandwidth, impedances, calibration, output value,
//!   level display and trigger mode as closed enums with bit-exact codes
//! - **Addressing discipline**: several instruments can share one bus
//! - **Measurement protocol**: serial-poll wait with configurable interval,
//!   attempt limit, deadline and cancellation
//! - **Typed results**: levels as `f64`, frequencies as integers, in the
//!   order the instrument reports them
//! - **Testable without hardware**: [`MockBus`] records every bus operation
//!
//! ## Examples
//!
//! ### Setting up a measurement
//!
//! ```rust,no_run
//! use spm15_rs::{Bandwidth, InputImpedance, OutputValue, PrologixBus, Spm15};
//!
//! let bus = PrologixBus::open("/dev/ttyUSB0")?;
//! let mut meter = Spm15::new(bus, 7)?;
//!
//! meter.set_bandwidth(Bandwidth::B1740)?;
//! meter.set_input_impedance(InputImpedance::Bal600Inf)?;
//! meter.set_output_value(OutputValue::MeasLevelFreq)?;
//! meter.set_frequency(1_000)?;
//!
//! match meter.measure()? {
//!     Ok(result) => println!("Measured {:?}", result),
//!     Err(failure) => println!("Measurement failed: {}", failure),
//! }
//! meter.local()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Bounded waits
//!
//! ```rust,no_run
//! use spm15_rs::{PollPolicy, PrologixBus, Spm15, Spm15Config};
//! use std::time::Duration;
//!
//! let config = Spm15Config::default()
//!     .with_poll_policy(PollPolicy::default().with_deadline(Duration::from_secs(5)));
//! let mut meter = Spm15::with_config(PrologixBus::open("/dev/ttyUSB0")?, 7, config)?;
//! let reading = meter.measure()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Sharing a bus
//!
//! ```rust
//! use spm15_rs::{Bandwidth, MockBus, Spm15};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let bus = Rc::new(RefCell::new(MockBus::new()));
//! let mut left = Spm15::new(Rc::clone(&bus), 7)?;
//! let mut right = Spm15::new(Rc::clone(&bus), 8)?;
//!
//! left.set_bandwidth(Bandwidth::Wideband)?;
//! right.set_bandwidth("USB")?;
//! assert_eq!(bus.borrow().writes(), ["B0,", "B7,"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod busy_poll;
pub mod command;
pub mod gpib_bus;
pub mod measurement;
pub mod mock_bus;
pub mod prologix;
pub mod settings;
pub mod spm15;

// Re-export the main types for convenience
pub use settings::{
    Bandwidth, Calibration, InputImpedance, InstrumentSetting, IntoSetting, LevelDisplay,
    MeasurementType, OutputImpedance, OutputValue, TriggerMode, UnsupportedSetting,
};

pub use command::{CommandString, OutOfRange, RangePolicy};

pub use gpib_bus::{BusError, GpibBus};

pub use busy_poll::{CancelToken, PollError, PollLimit, PollPolicy, StatusByte};

pub use measurement::{DecodeFailure, Field, MeasurementResult, MeasurementState};

pub use mock_bus::{BusEvent, MockBus};

pub use prologix::{PrologixBus, PrologixConfig};

pub use spm15::{Spm15, Spm15Config, Spm15Error};
