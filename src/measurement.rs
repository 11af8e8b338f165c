//! Decoding of measurement payloads.
//!
//! Depending on the selected [`OutputValue`](crate::OutputValue) the SPM-15
//! answers a read with either a single level (`"-12.3"`, possibly carrying a
//! unit such as `"-12.3 DBM"`) or a comma separated list of fields. Fields
//! starting with `F` are frequencies in Hz and decode to integers; every
//! other field is a level and decodes to a float.

use std::fmt;

use crate::command::DELIMITER;

const FREQUENCY_MARKER: char = 'F';

/// Where a measurement is in its trigger/poll/read cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeasurementState {
    #[default]
    Idle,
    Triggered,
    Polling,
    ResultReady,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field {
    /// Frequency in Hz.
    Frequency(i64),
    /// Measured or generator level.
    Level(f64),
}

impl Field {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Frequency(hz) => hz as f64,
            Self::Level(level) => level,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementResult {
    Scalar(f64),
    /// Fields in the order the instrument sent them.
    Fields(Vec<Field>),
}

impl MeasurementResult {
    pub fn scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(value) => Some(*value),
            Self::Fields(_) => None,
        }
    }

    pub fn fields(&self) -> &[Field] {
        match self {
            Self::Scalar(_) => &[],
            Self::Fields(fields) => fields,
        }
    }

    /// First frequency field, if the instrument reported one.
    pub fn frequency(&self) -> Option<i64> {
        self.fields().iter().find_map(|field| match field {
            Field::Frequency(hz) => Some(*hz),
            Field::Level(_) => None,
        })
    }

    pub fn levels(&self) -> Vec<f64> {
        match self {
            Self::Scalar(value) => vec![*value],
            Self::Fields(fields) => fields
                .iter()
                .filter_map(|field| match field {
                    Field::Level(level) => Some(*level),
                    Field::Frequency(_) => None,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Frequency,
    Level,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frequency => f.write_str("frequency"),
            Self::Level => f.write_str("level"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeFailure {
    #[error("Measurement payload is empty")]
    EmptyPayload,

    #[error("Field {index} of payload '{payload}' is empty")]
    EmptyField { index: usize, payload: String },

    #[error("Field {index} ('{field}') is not a valid {kind}")]
    InvalidNumber {
        index: usize,
        field: String,
        kind: FieldKind,
    },
}

/// Decode the raw answer to a read-until-EOI.
pub fn decode(payload: &str) -> Result<MeasurementResult, DecodeFailure> {
    let payload = payload.trim_end_matches(&['\r', '\n'][..]);
    if payload.trim().is_empty() {
        return Err(DecodeFailure::EmptyPayload);
    }

    if !payload.contains(DELIMITER) {
        let level = parse_number(payload, 0, FieldKind::Level)?;
        return Ok(MeasurementResult::Scalar(level));
    }

    payload
        .split(DELIMITER)
        .enumerate()
        .map(|(index, raw)| decode_field(payload, index, raw))
        .collect::<Result<Vec<_>, _>>()
        .map(MeasurementResult::Fields)
}

fn decode_field(payload: &str, index: usize, raw: &str) -> Result<Field, DecodeFailure> {
    match raw.chars().next() {
        None => Err(DecodeFailure::EmptyField {
            index,
            payload: payload.to_string(),
        }),
        Some(FREQUENCY_MARKER) => {
            let digits = strip_labels(raw);
            digits
                .parse()
                .map(Field::Frequency)
                .map_err(|_| invalid(index, raw, FieldKind::Frequency))
        }
        Some(_) => parse_number(raw, index, FieldKind::Level).map(Field::Level),
    }
}

fn parse_number(raw: &str, index: usize, kind: FieldKind) -> Result<f64, DecodeFailure> {
    strip_labels(raw)
        .parse()
        .map_err(|_| invalid(index, raw, kind))
}

/// Drop letters and whitespace: command echoes, units and padding.
fn strip_labels(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_ascii_alphabetic() && !c.is_whitespace())
        .collect()
}

fn invalid(index: usize, raw: &str, kind: FieldKind) -> DecodeFailure {
    DecodeFailure::InvalidNumber {
        index,
        field: raw.to_string(),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_scalar() {
        assert_eq!(decode("1.23"), Ok(MeasurementResult::Scalar(1.23)));
        assert_eq!(decode("-45.6\r\n"), Ok(MeasurementResult::Scalar(-45.6)));
        assert_eq!(decode("N -7.5 DBM"), Ok(MeasurementResult::Scalar(-7.5)));
    }

    #[test]
    fn test_decode_fields_preserve_order_and_kind() {
        let result = decode("F00123456,1.23").unwrap();
        assert_eq!(
            result,
            MeasurementResult::Fields(vec![Field::Frequency(123_456), Field::Level(1.23)])
        );
        assert_eq!(result.frequency(), Some(123_456));
        assert_eq!(result.scalar(), None);

        let result = decode("-10.5,F00001000,+2.0\r\n").unwrap();
        assert_eq!(
            result.fields(),
            [
                Field::Level(-10.5),
                Field::Frequency(1000),
                Field::Level(2.0)
            ]
        );
        assert_eq!(result.levels(), [-10.5, 2.0]);
    }

    #[test]
    fn test_decode_failures() {
        assert_eq!(decode(""), Err(DecodeFailure::EmptyPayload));
        assert_eq!(decode("\r\n"), Err(DecodeFailure::EmptyPayload));
        assert!(matches!(
            decode("OVERLOAD"),
            Err(DecodeFailure::InvalidNumber {
                index: 0,
                kind: FieldKind::Level,
                ..
            })
        ));
        assert!(matches!(
            decode("F00123456,"),
            Err(DecodeFailure::EmptyField { index: 1, .. })
        ));
        assert!(matches!(
            decode("F12.5,1.0"),
            Err(DecodeFailure::InvalidNumber {
                index: 0,
                kind: FieldKind::Frequency,
                ..
            })
        ));
        assert!(matches!(
            decode("1.0,--"),
            Err(DecodeFailure::InvalidNumber { index: 1, .. })
        ));
    }

    #[test]
    fn test_field_as_f64() {
        assert_eq!(Field::Frequency(1000).as_f64(), 1000.0);
        assert_eq!(Field::Level(-3.5).as_f64(), -3.5);
        assert_eq!(MeasurementResult::Scalar(4.0).levels(), [4.0]);
    }
}
