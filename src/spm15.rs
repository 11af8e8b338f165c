use std::fmt;

use crate::busy_poll::{wait_while_busy, CancelToken, PollError, PollPolicy};
use crate::command::{
    encode_amplitude, encode_frequency, encode_generator, encode_level_measurement,
    encode_setting, CommandString, OutOfRange, RangePolicy,
};
use crate::gpib_bus::{check_address, BusError, GpibBus, READ_EOI_COMMAND, TRIGGER_COMMAND};
use crate::measurement::{decode, DecodeFailure, MeasurementResult, MeasurementState};
use crate::settings::{
    Bandwidth, Calibration, InputImpedance, InstrumentSetting, IntoSetting, LevelDisplay,
    MeasurementType, OutputImpedance, OutputValue, TriggerMode, UnsupportedSetting,
};

#[derive(Debug, thiserror::Error)]
pub enum Spm15Error {
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error(transparent)]
    UnsupportedSetting(#[from] UnsupportedSetting),

    #[error(transparent)]
    OutOfRange(#[from] OutOfRange),

    #[error("GPIB address {0} is out of range (0-30)")]
    InvalidAddress(u8),

    #[error("Instrument still busy after {attempts} status polls ({elapsed:?})")]
    BusyTimeout {
        attempts: u32,
        elapsed: std::time::Duration,
    },

    #[error("Measurement cancelled after {attempts} status polls")]
    Cancelled { attempts: u32 },
}

impl From<PollError> for Spm15Error {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Bus(e) => Self::Bus(e),
            PollError::Exhausted { attempts, elapsed } => Self::BusyTimeout { attempts, elapsed },
            PollError::Cancelled { attempts } => Self::Cancelled { attempts },
        }
    }
}

/// Driver behavior that is not part of the instrument state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Spm15Config {
    pub poll: PollPolicy,
    pub range_policy: RangePolicy,
}

impl Spm15Config {
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_range_policy(mut self, range_policy: RangePolicy) -> Self {
        self.range_policy = range_policy;
        self
    }
}

/// Wandel & Goltermann SPM-15 selective level meter on a GPIB bus.
///
/// The bus may be shared with other instruments (pass `&mut bus` or an
/// `Rc<RefCell<_>>`); every operation re-addresses the bus when it was
/// last pointed elsewhere.
pub struct Spm15<B: GpibBus> {
    bus: B,
    address: u8,
    addressed_once: bool,
    state: MeasurementState,
    config: Spm15Config,
}

impl<B: GpibBus> Spm15<B> {
    pub fn new(bus: B, address: u8) -> Result<Self, Spm15Error> {
        Self::with_config(bus, address, Spm15Config::default())
    }

    /// Attach to the instrument at `address` and bring bus and instrument
    /// to a known state: address it, drain any pending output, clear the
    /// pending status byte.
    pub fn with_config(bus: B, address: u8, config: Spm15Config) -> Result<Self, Spm15Error> {
        let address = check_address(address).map_err(|_| Spm15Error::InvalidAddress(address))?;

        let mut instrument = Self {
            bus,
            address,
            addressed_once: false,
            state: MeasurementState::Idle,
            config,
        };

        instrument.ensure_addressed()?;

        let pending = instrument.bus.query(READ_EOI_COMMAND)?;
        if !pending.is_empty() {
            log::debug!("Discarded pending output {:?}", pending);
        }

        instrument.bus.request_status_poll()?;
        let status = instrument.bus.read()?;
        log::debug!("SPM-15 at address {} status: {:?}", address, status.trim());

        Ok(instrument)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn state(&self) -> MeasurementState {
        self.state
    }

    pub fn config(&self) -> &Spm15Config {
        &self.config
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Point the bus at this instrument unless it already is.
    fn ensure_addressed(&mut self) -> Result<(), BusError> {
        if !self.addressed_once || self.bus.current_address() != Some(self.address) {
            log::debug!("Addressing SPM-15 at {}", self.address);
            self.bus.switch_address(self.address)?;
            self.addressed_once = true;
        }
        Ok(())
    }

    fn send(&mut self, command: &CommandString) -> Result<(), Spm15Error> {
        log::debug!("SPM-15 <- {}", command);
        self.bus.write(command.as_str())?;
        Ok(())
    }

    fn send_setting<S, T>(&mut self, selector: T) -> Result<(), Spm15Error>
    where
        S: InstrumentSetting,
        T: IntoSetting<S>,
    {
        self.ensure_addressed()?;
        let setting = selector.into_setting()?;
        self.send(&encode_setting(setting))
    }

    /// Send an encoded numeric parameter, applying the range policy to
    /// values the encoder refused.
    fn send_ranged(
        &mut self,
        command: Result<CommandString, OutOfRange>,
    ) -> Result<(), Spm15Error> {
        self.ensure_addressed()?;
        match command {
            Ok(command) => self.send(&command),
            Err(err) => match self.config.range_policy {
                RangePolicy::Ignore => {
                    log::warn!("{}; command not sent", err);
                    Ok(())
                }
                RangePolicy::Reject => Err(err.into()),
            },
        }
    }

    /// Selected device clear. Any measurement in progress is abandoned.
    pub fn reset(&mut self) -> Result<(), Spm15Error> {
        self.ensure_addressed()?;
        self.bus.reset_bus()?;
        self.state = MeasurementState::Idle;
        Ok(())
    }

    /// Hand the instrument back to its front panel.
    pub fn local(&mut self) -> Result<(), Spm15Error> {
        self.ensure_addressed()?;
        self.bus.release_to_local()?;
        Ok(())
    }

    /// Frequencies outside 50 Hz..10 MHz are handled per [`RangePolicy`].
    pub fn set_frequency(&mut self, hz: u32) -> Result<(), Spm15Error> {
        self.send_ranged(encode_frequency(hz))
    }

    /// Generator level in dBm, valid from -50.9 to 10.03.
    pub fn set_amplitude(&mut self, dbm: f64) -> Result<(), Spm15Error> {
        self.send_ranged(encode_amplitude(dbm))
    }

    pub fn enable_generator(&mut self, on: bool) -> Result<(), Spm15Error> {
        self.ensure_addressed()?;
        self.send(&encode_generator(on))
    }

    pub fn set_bandwidth(&mut self, bandwidth: impl IntoSetting<Bandwidth>) -> Result<(), Spm15Error> {
        self.send_setting::<Bandwidth, _>(bandwidth)
    }

    pub fn set_output_impedance(
        &mut self,
        impedance: impl IntoSetting<OutputImpedance>,
    ) -> Result<(), Spm15Error> {
        self.send_setting::<OutputImpedance, _>(impedance)
    }

    pub fn set_input_impedance(
        &mut self,
        impedance: impl IntoSetting<InputImpedance>,
    ) -> Result<(), Spm15Error> {
        self.send_setting::<InputImpedance, _>(impedance)
    }

    pub fn set_calibration(
        &mut self,
        calibration: impl IntoSetting<Calibration>,
    ) -> Result<(), Spm15Error> {
        self.send_setting::<Calibration, _>(calibration)
    }

    pub fn set_output_value(
        &mut self,
        value: impl IntoSetting<OutputValue>,
    ) -> Result<(), Spm15Error> {
        self.send_setting::<OutputValue, _>(value)
    }

    pub fn set_trigger_mode(&mut self, mode: impl IntoSetting<TriggerMode>) -> Result<(), Spm15Error> {
        self.send_setting::<TriggerMode, _>(mode)
    }

    /// Both selectors are validated before anything is sent.
    pub fn set_level_measurement(
        &mut self,
        display: impl IntoSetting<LevelDisplay>,
        measurement: impl IntoSetting<MeasurementType>,
    ) -> Result<(), Spm15Error> {
        self.ensure_addressed()?;
        let display = display.into_setting()?;
        let measurement = measurement.into_setting()?;
        self.send(&encode_level_measurement(display, measurement))
    }

    /// Trigger a measurement, wait for the instrument and decode its answer.
    ///
    /// The outer result carries bus and polling failures. The inner result
    /// is the measurement itself: a payload that cannot be decoded is a
    /// failed measurement, and the instrument can simply be triggered again.
    pub fn measure(&mut self) -> Result<Result<MeasurementResult, DecodeFailure>, Spm15Error> {
        self.run_measurement(None)
    }

    /// Like [`measure`](Self::measure), giving up when `cancel` is triggered.
    pub fn measure_with_cancel(
        &mut self,
        cancel: &CancelToken,
    ) -> Result<Result<MeasurementResult, DecodeFailure>, Spm15Error> {
        self.run_measurement(Some(cancel))
    }

    #[tracing::instrument(level = "debug", skip_all, fields(address = self.address))]
    fn run_measurement(
        &mut self,
        cancel: Option<&CancelToken>,
    ) -> Result<Result<MeasurementResult, DecodeFailure>, Spm15Error> {
        self.ensure_addressed()?;
        self.state = MeasurementState::Idle;

        if let Err(err) = self.bus.write(TRIGGER_COMMAND) {
            self.state = MeasurementState::Failed;
            return Err(err.into());
        }
        self.state = MeasurementState::Triggered;
        log::debug!("Triggered SPM-15 at {}, waiting for busy bit", self.address);

        self.state = MeasurementState::Polling;
        if let Err(err) = wait_while_busy(&mut self.bus, &self.config.poll, cancel) {
            self.state = MeasurementState::Failed;
            return Err(err.into());
        }

        let payload = match self.bus.query(READ_EOI_COMMAND) {
            Ok(payload) => payload,
            Err(err) => {
                self.state = MeasurementState::Failed;
                return Err(err.into());
            }
        };
        log::debug!("SPM-15 -> {:?}", payload);

        let result = decode(&payload);
        self.state = match &result {
            Ok(_) => MeasurementState::ResultReady,
            Err(err) => {
                log::warn!("Measurement failed: {}", err);
                MeasurementState::Failed
            }
        };
        Ok(result)
    }
}

impl<B: GpibBus> fmt::Display for Spm15<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W&G SPM15 address: {}", self.address)
    }
}

impl<B: GpibBus> fmt::Debug for Spm15<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spm15")
            .field("address", &self.address)
            .field("addressed_once", &self.addressed_once)
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
