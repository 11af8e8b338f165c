//! Closed sets of instrument settings and their ASCII command fragments.
//!
//! Every family maps each variant 1:1 to the fragment the SPM-15 expects.
//! Families can be selected directly, by their 0-based ordinal, or by their
//! upper-snake label (`"BAL600_INF"`); the last two are checked at runtime
//! and fail with [`UnsupportedSetting`].

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Selected {family} '{value}' doesn't exist")]
pub struct UnsupportedSetting {
    pub family: &'static str,
    pub value: String,
}

impl UnsupportedSetting {
    pub fn new(family: &'static str, value: impl Into<String>) -> Self {
        Self {
            family,
            value: value.into(),
        }
    }
}

/// A member of one of the closed setting families.
pub trait InstrumentSetting: Copy + fmt::Debug {
    /// Human readable family name, used in error messages.
    const FAMILY: &'static str;

    /// ASCII fragment sent to the instrument, without the delimiter.
    fn code(&self) -> &'static str;
}

/// Conversion of a caller-supplied selector into a setting of family `T`.
pub trait IntoSetting<T> {
    fn into_setting(self) -> Result<T, UnsupportedSetting>;
}

macro_rules! setting_family {
    (
        $(#[$meta:meta])*
        $name:ident, $family:literal {
            $($variant:ident = $index:literal, $label:literal => $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn label(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }

            pub fn index(&self) -> u8 {
                match self {
                    $(Self::$variant => $index),+
                }
            }
        }

        impl InstrumentSetting for $name {
            const FAMILY: &'static str = $family;

            fn code(&self) -> &'static str {
                match self {
                    $(Self::$variant => $code),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl TryFrom<u8> for $name {
            type Error = UnsupportedSetting;

            fn try_from(index: u8) -> Result<Self, UnsupportedSetting> {
                match index {
                    $($index => Ok(Self::$variant),)+
                    _ => Err(UnsupportedSetting::new($family, index.to_string())),
                }
            }
        }

        impl FromStr for $name {
            type Err = UnsupportedSetting;

            fn from_str(s: &str) -> Result<Self, UnsupportedSetting> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|setting| setting.label().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| UnsupportedSetting::new($family, s))
            }
        }

        impl IntoSetting<$name> for $name {
            fn into_setting(self) -> Result<$name, UnsupportedSetting> {
                Ok(self)
            }
        }

        impl IntoSetting<$name> for u8 {
            fn into_setting(self) -> Result<$name, UnsupportedSetting> {
                $name::try_from(self)
            }
        }

        impl IntoSetting<$name> for &str {
            fn into_setting(self) -> Result<$name, UnsupportedSetting> {
                self.parse()
            }
        }
    };
}

setting_family! {
    /// Receiver bandwidth.
    Bandwidth, "bandwidth" {
        Wideband = 0, "WIDEBAND" => "B0",
        B25 = 1, "B25" => "B1",
        B1740 = 2, "B1740" => "B3",
        B3100 = 3, "B3100" => "B4",
        Lsb = 4, "LSB" => "B6",
        Usb = 5, "USB" => "B7",
    }
}

setting_family! {
    /// Generator output impedance.
    OutputImpedance, "output impedance" {
        Coax75 = 0, "COAX75" => "P0",
        Bal124 = 1, "BAL124" => "P1",
        Bal150 = 2, "BAL150" => "P2",
        Bal600 = 3, "BAL600" => "P5",
        Bal0 = 4, "BAL0" => "P6",
    }
}

setting_family! {
    /// Receiver input impedance. `*Inf` variants are the high impedance
    /// (bridging) versions of the terminated inputs.
    InputImpedance, "input impedance" {
        Coax75 = 0, "COAX75" => "Q01",
        Coax75Inf = 1, "COAX75_INF" => "Q08",
        Bal124 = 2, "BAL124" => "Q11",
        Bal124Inf = 3, "BAL124_INF" => "Q18",
        Bal150 = 4, "BAL150" => "Q21",
        Bal150Inf = 5, "BAL150_INF" => "Q28",
        Bal600 = 6, "BAL600" => "Q41",
        Bal600Inf = 7, "BAL600_INF" => "Q48",
    }
}

setting_family! {
    /// Automatic calibration mode.
    Calibration, "calibration" {
        Off = 0, "OFF" => "C0",
        On = 1, "ON" => "C1",
        NextMeasurement = 2, "NEXT_MEAS" => "C3",
    }
}

setting_family! {
    /// Which values the instrument reports after a measurement.
    OutputValue, "output value" {
        MeasLevel = 0, "MEAS_LEVEL" => "D11",
        GenLevel = 1, "GEN_LEVEL" => "D12",
        Freq = 2, "FREQ" => "D13",
        MeasGenLevel = 3, "MEAS_GEN_LEVEL" => "D14",
        MeasLevelFreq = 4, "MEAS_LEVEL_FREQ" => "D15",
        MeasGenLevelFreq = 5, "MEAS_GEN_LEVEL_FREQ" => "D16",
        GenLevelFreq = 6, "GEN_LEVEL_FREQ" => "D17",
        Error = 7, "ERROR" => "D99",
    }
}

setting_family! {
    /// Level display mode, first digit of the `R` command.
    LevelDisplay, "level display" {
        Abs = 0, "ABS" => "0",
        Ref = 1, "REF" => "1",
        AbsRef = 2, "ABS_REF" => "2",
        AbsToRef = 3, "ABS_TO_REF" => "8",
    }
}

setting_family! {
    /// Measurement type, last two digits of the `R` command.
    MeasurementType, "measurement type" {
        DigitalAutorange = 0, "DIGITAL_AUTORANGE" => "02",
        DigitalLowNoise = 1, "DIGITAL_LOW_NOISE" => "12",
        DigitalNormalDrive = 2, "DIGITAL_NORMAL_DRIVE" => "22",
        DigitalLowDist = 3, "DIGITAL_LOW_DIST" => "32",
        Analog1 = 4, "ANALOG_1" => "42",
        Analog20 = 5, "ANALOG_20" => "52",
    }
}

setting_family! {
    TriggerMode, "trigger mode" {
        Continuous = 0, "CONTINUOUS" => "T0",
        Single = 1, "SINGLE" => "T1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_bit_exact() {
        let bandwidth: Vec<_> = Bandwidth::ALL.iter().map(InstrumentSetting::code).collect();
        assert_eq!(bandwidth, ["B0", "B1", "B3", "B4", "B6", "B7"]);

        let output: Vec<_> = OutputImpedance::ALL
            .iter()
            .map(InstrumentSetting::code)
            .collect();
        assert_eq!(output, ["P0", "P1", "P2", "P5", "P6"]);

        let input: Vec<_> = InputImpedance::ALL
            .iter()
            .map(InstrumentSetting::code)
            .collect();
        assert_eq!(
            input,
            ["Q01", "Q08", "Q11", "Q18", "Q21", "Q28", "Q41", "Q48"]
        );

        let calibration: Vec<_> = Calibration::ALL
            .iter()
            .map(InstrumentSetting::code)
            .collect();
        assert_eq!(calibration, ["C0", "C1", "C3"]);

        let output_value: Vec<_> = OutputValue::ALL
            .iter()
            .map(InstrumentSetting::code)
            .collect();
        assert_eq!(
            output_value,
            ["D11", "D12", "D13", "D14", "D15", "D16", "D17", "D99"]
        );

        let display: Vec<_> = LevelDisplay::ALL
            .iter()
            .map(InstrumentSetting::code)
            .collect();
        assert_eq!(display, ["0", "1", "2", "8"]);

        let measurement: Vec<_> = MeasurementType::ALL
            .iter()
            .map(InstrumentSetting::code)
            .collect();
        assert_eq!(measurement, ["02", "12", "22", "32", "42", "52"]);

        let trigger: Vec<_> = TriggerMode::ALL
            .iter()
            .map(InstrumentSetting::code)
            .collect();
        assert_eq!(trigger, ["T0", "T1"]);
    }

    #[test]
    fn test_ordinals_follow_declaration_order() {
        for (i, bw) in Bandwidth::ALL.iter().enumerate() {
            assert_eq!(usize::from(bw.index()), i);
            assert_eq!(Bandwidth::try_from(bw.index()), Ok(*bw));
        }
        assert_eq!(InputImpedance::try_from(7), Ok(InputImpedance::Bal600Inf));
    }

    #[test]
    fn test_unknown_ordinal_is_unsupported() {
        let err = Bandwidth::try_from(6).unwrap_err();
        assert_eq!(err.family, "bandwidth");
        assert_eq!(err.value, "6");
        assert!(TriggerMode::try_from(2).is_err());
        assert!(OutputValue::try_from(8).is_err());
    }

    #[test]
    fn test_error_output_value_is_selectable() {
        assert_eq!(OutputValue::try_from(7), Ok(OutputValue::Error));
        assert_eq!("error".parse::<OutputValue>(), Ok(OutputValue::Error));
        assert_eq!(OutputValue::Error.code(), "D99");
        assert_eq!(OutputValue::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_labels_parse_case_insensitively() {
        assert_eq!("bal600_inf".parse::<InputImpedance>(), Ok(InputImpedance::Bal600Inf));
        assert_eq!(" NEXT_MEAS ".parse::<Calibration>(), Ok(Calibration::NextMeasurement));
        assert_eq!(LevelDisplay::AbsToRef.to_string(), "ABS_TO_REF");

        let err = "BAL75".parse::<OutputImpedance>().unwrap_err();
        assert_eq!(err.to_string(), "Selected output impedance 'BAL75' doesn't exist");
    }

    #[test]
    fn test_into_setting_selectors() {
        assert_eq!(
            IntoSetting::<TriggerMode>::into_setting(TriggerMode::Single),
            Ok(TriggerMode::Single)
        );
        assert_eq!(
            IntoSetting::<TriggerMode>::into_setting(1u8),
            Ok(TriggerMode::Single)
        );
        assert_eq!(
            IntoSetting::<TriggerMode>::into_setting("continuous"),
            Ok(TriggerMode::Continuous)
        );
        assert!(IntoSetting::<TriggerMode>::into_setting("GATED").is_err());
    }
}
