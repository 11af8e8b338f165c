//! Encoders for the SPM-15 ASCII command grammar.
//!
//! Every command is a single letter, a fixed-width argument and the `,`
//! delimiter. The encoders here are pure; sending is done by
//! [`Spm15`](crate::Spm15).
//!
//! ```
//! use spm15_rs::command::{encode_amplitude, encode_frequency, encode_level_measurement};
//! use spm15_rs::{LevelDisplay, MeasurementType};
//!
//! assert_eq!(encode_frequency(50).unwrap().as_str(), "F00000050,");
//! assert_eq!(encode_amplitude(-50.9).unwrap().as_str(), "L-50.9,");
//! assert_eq!(
//!     encode_level_measurement(LevelDisplay::AbsToRef, MeasurementType::Analog20).as_str(),
//!     "R852,"
//! );
//! assert!(encode_frequency(49).is_err());
//! ```

use std::fmt;
use std::ops::{Range, RangeInclusive};

use crate::settings::{InstrumentSetting, LevelDisplay, MeasurementType};

pub const DELIMITER: char = ',';

/// Valid generator/receiver frequencies in Hz, upper bound exclusive.
pub const FREQUENCY_RANGE: Range<u32> = 50..10_000_000;

/// Valid generator amplitudes in dBm.
pub const AMPLITUDE_RANGE: RangeInclusive<f64> = -50.9..=10.03;

const GENERATOR_ON: &str = "G0210";
const GENERATOR_OFF: &str = "G1210";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OutOfRange {
    #[error("Frequency {hz} Hz is out of range (min 50 Hz, max 9999999 Hz)")]
    Frequency { hz: u32 },

    #[error("Amplitude {dbm} dBm is out of range (min -50.9 dBm, max 10.03 dBm)")]
    Amplitude { dbm: f64 },
}

/// What to do with numeric parameters outside their documented range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangePolicy {
    /// Drop the command without an error. Matches the instrument's
    /// historical driver behavior.
    #[default]
    Ignore,
    /// Return [`OutOfRange`] to the caller.
    Reject,
}

/// A delimiter-terminated ASCII command, built right before it is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandString(String);

impl CommandString {
    fn new(body: &str) -> Self {
        let mut command = String::with_capacity(body.len() + 1);
        command.push_str(body);
        command.push(DELIMITER);
        Self(command)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CommandString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encode a single-family setting, e.g. `Bandwidth::Wideband` as `B0,`.
pub fn encode_setting<S: InstrumentSetting>(setting: S) -> CommandString {
    CommandString::new(setting.code())
}

/// Level display and measurement type share the `R` command.
pub fn encode_level_measurement(
    display: LevelDisplay,
    measurement: MeasurementType,
) -> CommandString {
    CommandString::new(&format!("R{}{}", display.code(), measurement.code()))
}

pub fn encode_frequency(hz: u32) -> Result<CommandString, OutOfRange> {
    if !FREQUENCY_RANGE.contains(&hz) {
        return Err(OutOfRange::Frequency { hz });
    }
    Ok(CommandString::new(&format!("F{hz:08}")))
}

/// Sign, one fractional digit, zero padded to five characters.
pub fn encode_amplitude(dbm: f64) -> Result<CommandString, OutOfRange> {
    if !AMPLITUDE_RANGE.contains(&dbm) {
        return Err(OutOfRange::Amplitude { dbm });
    }
    // anything that rounds to zero goes out as +00.0
    let dbm = if dbm.abs() < 0.05 { 0.0 } else { dbm };
    Ok(CommandString::new(&format!("L{dbm:+05.1}")))
}

pub fn encode_generator(on: bool) -> CommandString {
    CommandString::new(if on { GENERATOR_ON } else { GENERATOR_OFF })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Bandwidth, InputImpedance, OutputValue, TriggerMode};

    #[test]
    fn test_encode_setting() {
        assert_eq!(encode_setting(Bandwidth::Wideband).as_str(), "B0,");
        assert_eq!(encode_setting(InputImpedance::Bal600Inf).as_str(), "Q48,");
        assert_eq!(encode_setting(OutputValue::Error).as_str(), "D99,");
        assert_eq!(encode_setting(TriggerMode::Single).as_str(), "T1,");
    }

    #[test]
    fn test_encode_level_measurement() {
        assert_eq!(
            encode_level_measurement(LevelDisplay::AbsToRef, MeasurementType::Analog20).as_str(),
            "R852,"
        );
        assert_eq!(
            encode_level_measurement(LevelDisplay::Abs, MeasurementType::DigitalAutorange)
                .as_str(),
            "R002,"
        );
        assert_eq!(
            encode_level_measurement(LevelDisplay::AbsRef, MeasurementType::DigitalLowDist)
                .as_str(),
            "R232,"
        );
    }

    #[test]
    fn test_encode_frequency_bounds() {
        assert_eq!(encode_frequency(50).unwrap().as_str(), "F00000050,");
        assert_eq!(encode_frequency(9_999_999).unwrap().as_str(), "F09999999,");
        assert_eq!(encode_frequency(1_000).unwrap().as_str(), "F00001000,");
        assert_eq!(
            encode_frequency(49),
            Err(OutOfRange::Frequency { hz: 49 })
        );
        assert!(encode_frequency(10_000_000).is_err());
    }

    #[test]
    fn test_encode_amplitude_bounds() {
        assert_eq!(encode_amplitude(-50.9).unwrap().as_str(), "L-50.9,");
        assert_eq!(encode_amplitude(10.03).unwrap().as_str(), "L+10.0,");
        assert_eq!(encode_amplitude(5.0).unwrap().as_str(), "L+05.0,");
        assert_eq!(encode_amplitude(-3.5).unwrap().as_str(), "L-03.5,");
        assert_eq!(encode_amplitude(0.0).unwrap().as_str(), "L+00.0,");
        assert_eq!(encode_amplitude(-0.0).unwrap().as_str(), "L+00.0,");
        assert_eq!(encode_amplitude(-0.04).unwrap().as_str(), "L+00.0,");
        assert_eq!(encode_amplitude(0.04).unwrap().as_str(), "L+00.0,");
        assert_eq!(encode_amplitude(-0.1).unwrap().as_str(), "L-00.1,");
        assert!(encode_amplitude(-51.0).is_err());
        assert!(encode_amplitude(10.1).is_err());
        assert!(encode_amplitude(f64::NAN).is_err());
    }

    #[test]
    fn test_encode_generator() {
        assert_eq!(encode_generator(true).as_str(), "G0210,");
        assert_eq!(encode_generator(false).as_str(), "G1210,");
    }
}
