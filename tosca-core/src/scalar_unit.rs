//! Scalar-with-unit values
//!
//! TOSCA scalar-unit properties are literals of the form `<number> <unit>`
//! in one of four families (size, time, frequency, bitrate). Values are
//! normalized to the family's base unit for comparison. Size units use the
//! binary (IEC) interpretation for both plain and `i` spellings, so
//! `1024 MB == 1 GiB`.

use crate::error::{Result, ToscaError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

/// Grammar of a scalar-unit literal
static SCALAR_UNIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?[0-9]*\.?[0-9]+(?:[eE][+-]?[0-9]+)?)\s*([A-Za-z]+)\s*$")
        .expect("scalar-unit grammar is valid")
});

/// The four scalar-unit families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarUnitKind {
    /// Bytes; base unit B
    Size,
    /// Durations; base unit s
    Time,
    /// Frequencies; base unit Hz
    Frequency,
    /// Bit rates; base unit bps
    Bitrate,
}

impl ScalarUnitKind {
    /// Map a TOSCA property type name to its scalar-unit family
    #[must_use]
    pub fn for_type_name(name: &str) -> Option<Self> {
        match name {
            "scalar-unit.size" => Some(Self::Size),
            "scalar-unit.time" => Some(Self::Time),
            "scalar-unit.frequency" => Some(Self::Frequency),
            "scalar-unit.bitrate" => Some(Self::Bitrate),
            _ => None,
        }
    }

    /// True if the property type name is a scalar-unit type
    #[must_use]
    pub fn is_scalar_unit_type(name: &str) -> bool {
        Self::for_type_name(name).is_some()
    }

    fn units(self) -> &'static [(&'static str, f64)] {
        const KI: f64 = 1024.0;
        match self {
            Self::Size => &[
                ("b", 1.0),
                ("kb", KI),
                ("kib", KI),
                ("mb", KI * KI),
                ("mib", KI * KI),
                ("gb", KI * KI * KI),
                ("gib", KI * KI * KI),
                ("tb", KI * KI * KI * KI),
                ("tib", KI * KI * KI * KI),
            ],
            Self::Time => &[
                ("d", 86_400.0),
                ("h", 3_600.0),
                ("m", 60.0),
                ("min", 60.0),
                ("s", 1.0),
                ("ms", 1e-3),
                ("us", 1e-6),
                ("ns", 1e-9),
            ],
            Self::Frequency => &[
                ("hz", 1.0),
                ("khz", 1e3),
                ("mhz", 1e6),
                ("ghz", 1e9),
            ],
            Self::Bitrate => &[
                ("bps", 1.0),
                ("kbps", 1e3),
                ("kibps", KI),
                ("mbps", 1e6),
                ("mibps", KI * KI),
                ("gbps", 1e9),
                ("gibps", KI * KI * KI),
                ("tbps", 1e12),
                ("tibps", KI * KI * KI * KI),
            ],
        }
    }

    fn multiplier(self, unit: &str) -> Option<f64> {
        let lowered = unit.to_ascii_lowercase();
        self.units()
            .iter()
            .find(|(name, _)| *name == lowered)
            .map(|(_, factor)| *factor)
    }
}

impl fmt::Display for ScalarUnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size => write!(f, "scalar-unit.size"),
            Self::Time => write!(f, "scalar-unit.time"),
            Self::Frequency => write!(f, "scalar-unit.frequency"),
            Self::Bitrate => write!(f, "scalar-unit.bitrate"),
        }
    }
}

/// A parsed scalar-unit literal
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarUnit {
    kind: ScalarUnitKind,
    value: f64,
    unit: String,
}

impl ScalarUnit {
    /// Parse a `<number> <unit>` literal of the given family
    ///
    /// # Errors
    ///
    /// Returns `InvalidPropertyValue` for a malformed literal and
    /// `Validation` for an unknown unit.
    pub fn parse(kind: ScalarUnitKind, literal: &str) -> Result<Self> {
        let captures = SCALAR_UNIT_RE.captures(literal).ok_or_else(|| {
            ToscaError::invalid_value(format!("{kind} literal \"{literal}\""))
        })?;
        let value: f64 = captures[1].parse().map_err(|_| {
            ToscaError::invalid_value(format!("{kind} literal \"{literal}\""))
        })?;
        let unit = captures[2].to_string();
        if kind.multiplier(&unit).is_none() {
            return Err(ToscaError::validation(format!(
                "unknown unit \"{unit}\" in {kind} literal \"{literal}\""
            )));
        }
        Ok(Self { kind, value, unit })
    }

    /// The family this literal belongs to
    #[must_use]
    pub fn kind(&self) -> ScalarUnitKind {
        self.kind
    }

    /// The numeric part as written
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// The unit as written
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// The value converted to the family's base unit
    #[must_use]
    pub fn to_base(&self) -> f64 {
        let factor = self
            .kind
            .multiplier(&self.unit)
            .expect("unit was checked at parse time");
        self.value * factor
    }

    /// Order two literals of the same family by their base-unit value
    #[must_use]
    pub fn compare(&self, other: &ScalarUnit) -> Option<Ordering> {
        if self.kind != other.kind {
            return None;
        }
        self.to_base().partial_cmp(&other.to_base())
    }
}

/// Normalize a value of a scalar-unit property type to its base unit
///
/// Non-string values pass through as plain numbers when possible so
/// constraints written against already-normalized numbers keep working.
///
/// # Errors
///
/// Returns the underlying parse error for malformed literals.
pub fn normalized_value(kind: ScalarUnitKind, value: &crate::value::Value) -> Result<f64> {
    use crate::value::Value;
    match value {
        Value::String(literal) => Ok(ScalarUnit::parse(kind, literal)?.to_base()),
        Value::Integer(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(ToscaError::invalid_value(format!(
            "{kind} value of type {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_units_are_binary() {
        let mb = ScalarUnit::parse(ScalarUnitKind::Size, "1024 MB").expect("parses");
        let gib = ScalarUnit::parse(ScalarUnitKind::Size, "1 GiB").expect("parses");
        assert_eq!(mb.to_base(), gib.to_base());
        assert_eq!(gib.to_base(), 1_073_741_824.0);
    }

    #[test]
    fn test_units_are_case_insensitive() {
        let a = ScalarUnit::parse(ScalarUnitKind::Size, "2 gb").expect("parses");
        let b = ScalarUnit::parse(ScalarUnitKind::Size, "2 GB").expect("parses");
        assert_eq!(a.to_base(), b.to_base());
    }

    #[test]
    fn test_time_conversions() {
        let day = ScalarUnit::parse(ScalarUnitKind::Time, "1 d").expect("parses");
        assert_eq!(day.to_base(), 86_400.0);
        let ms = ScalarUnit::parse(ScalarUnitKind::Time, "500 ms").expect("parses");
        assert_eq!(ms.to_base(), 0.5);
    }

    #[test]
    fn test_frequency_and_bitrate() {
        let freq = ScalarUnit::parse(ScalarUnitKind::Frequency, "2.4 GHz").expect("parses");
        assert_eq!(freq.to_base(), 2.4e9);
        let decimal = ScalarUnit::parse(ScalarUnitKind::Bitrate, "1 Kbps").expect("parses");
        assert_eq!(decimal.to_base(), 1000.0);
        let binary = ScalarUnit::parse(ScalarUnitKind::Bitrate, "1 Kibps").expect("parses");
        assert_eq!(binary.to_base(), 1024.0);
    }

    #[test]
    fn test_malformed_literal() {
        let err = ScalarUnit::parse(ScalarUnitKind::Size, "lots of bytes").unwrap_err();
        assert!(matches!(err, ToscaError::InvalidPropertyValue { .. }));
    }

    #[test]
    fn test_unknown_unit() {
        let err = ScalarUnit::parse(ScalarUnitKind::Size, "4 parsecs").unwrap_err();
        assert!(matches!(err, ToscaError::Validation { .. }));
        let err = ScalarUnit::parse(ScalarUnitKind::Time, "3 GB").unwrap_err();
        assert!(err.to_string().contains("GB"));
    }

    #[test]
    fn test_compare_across_units() {
        let a = ScalarUnit::parse(ScalarUnitKind::Size, "1 GiB").expect("parses");
        let b = ScalarUnit::parse(ScalarUnitKind::Size, "1000 MB").expect("parses");
        assert_eq!(a.compare(&b), Some(Ordering::Greater));
    }
}
