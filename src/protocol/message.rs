use serde::{Serialize, Serializer};
use std::fmt;

use super::frame::Frame;

/// Every measurement the host knows how to ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MeasurementKind {
    SolarCurrent,
    HouseCurrent,
    HouseVoltage,
    VehicleVoltage,
    HouseCapacityAmpHours,
    HouseCapacityPercent,
    FreshPercent,
    GrayPercent,
}

impl MeasurementKind {
    /// All kinds, in table order
    pub fn all() -> &'static [MeasurementKind] {
        &[
            MeasurementKind::SolarCurrent,
            MeasurementKind::HouseCurrent,
            MeasurementKind::HouseVoltage,
            MeasurementKind::VehicleVoltage,
            MeasurementKind::HouseCapacityAmpHours,
            MeasurementKind::HouseCapacityPercent,
            MeasurementKind::FreshPercent,
            MeasurementKind::GrayPercent,
        ]
    }

    /// Name used as key in uploaded batches
    pub fn name(&self) -> &'static str {
        match self {
            MeasurementKind::SolarCurrent => "SolarCurrent",
            MeasurementKind::HouseCurrent => "HouseCurrent",
            MeasurementKind::HouseVoltage => "HouseVoltage",
            MeasurementKind::VehicleVoltage => "VehicleVoltage",
            MeasurementKind::HouseCapacityAmpHours => "HouseCapacityAmpHours",
            MeasurementKind::HouseCapacityPercent => "HouseCapacityPercent",
            MeasurementKind::FreshPercent => "FreshPercent",
            MeasurementKind::GrayPercent => "GrayPercent",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-point decimal: `raw / 10^decimals`
///
/// Decoding divides an integer by a power of ten, so keeping the integer
/// means no rounding step exists; conversion to `f64` happens only on output
/// and is the correctly rounded quotient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scaled {
    /// Integer as read from the wire
    pub raw: i64,
    /// Number of fractional digits
    pub decimals: u8,
}

impl Scaled {
    /// Creates a new scaled value
    pub fn new(raw: i64, decimals: u8) -> Self {
        Scaled { raw, decimals }
    }

    /// Value as floating point
    pub fn value(&self) -> f64 {
        self.raw as f64 / 10f64.powi(self.decimals as i32)
    }

    /// Integer view, only when there are no fractional digits
    pub fn as_integer(&self) -> Option<i64> {
        (self.decimals == 0).then_some(self.raw)
    }

    /// Exact difference, expressed at the finer of the two scales
    pub fn minus(&self, other: &Scaled) -> Scaled {
        let decimals = self.decimals.max(other.decimals);
        let lhs = self.raw * 10i64.pow((decimals - self.decimals) as u32);
        let rhs = other.raw * 10i64.pow((decimals - other.decimals) as u32);
        Scaled::new(lhs - rhs, decimals)
    }
}

impl fmt::Display for Scaled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.decimals == 0 {
            return write!(f, "{}", self.raw);
        }
        let unit = 10u64.pow(self.decimals as u32);
        let magnitude = self.raw.unsigned_abs();
        let sign = if self.raw < 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            magnitude / unit,
            magnitude % unit,
            width = self.decimals as usize
        )
    }
}

impl Serialize for Scaled {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.as_integer() {
            Some(raw) => serializer.serialize_i64(raw),
            None => serializer.serialize_f64(self.value()),
        }
    }
}

/// Numeric content of a response payload, before it is tagged with a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    /// One little-endian integer at payload offset 1
    Scalar(Scaled),
    /// Two single-byte sub-fields at payload offsets 1 and 2
    Pair(u8, u8),
}

/// Decoded response frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Measurement {
    /// Amps, positive when charging
    SolarCurrent(Scaled),
    /// Amps through the house battery shunt
    HouseCurrent(Scaled),
    /// Volts
    HouseVoltage(Scaled),
    /// Volts
    VehicleVoltage(Scaled),
    /// Remaining amp-hours
    HouseCapacityAmpHours(u16),
    /// Remaining capacity plus a second byte of unknown meaning
    HouseCapacityPercent {
        /// State of charge
        percent: u8,
        /// Reported alongside, meaning not known
        unknown: u8,
    },
    /// Fresh water tank level
    FreshPercent(u16),
    /// Gray water tank level
    GrayPercent(u16),
    /// Anything the registry does not describe, kept for diagnostics
    Unknown(Frame),
}

impl Measurement {
    /// Tags a decoded value with its kind; `None` if the shapes do not fit
    pub fn from_value(kind: MeasurementKind, value: FieldValue) -> Option<Self> {
        let measurement = match (kind, value) {
            (MeasurementKind::SolarCurrent, FieldValue::Scalar(v)) => Measurement::SolarCurrent(v),
            (MeasurementKind::HouseCurrent, FieldValue::Scalar(v)) => Measurement::HouseCurrent(v),
            (MeasurementKind::HouseVoltage, FieldValue::Scalar(v)) => Measurement::HouseVoltage(v),
            (MeasurementKind::VehicleVoltage, FieldValue::Scalar(v)) => {
                Measurement::VehicleVoltage(v)
            }
            (MeasurementKind::HouseCapacityAmpHours, FieldValue::Scalar(v)) => {
                Measurement::HouseCapacityAmpHours(integer(v)?)
            }
            (MeasurementKind::HouseCapacityPercent, FieldValue::Pair(percent, unknown)) => {
                Measurement::HouseCapacityPercent { percent, unknown }
            }
            (MeasurementKind::FreshPercent, FieldValue::Scalar(v)) => {
                Measurement::FreshPercent(integer(v)?)
            }
            (MeasurementKind::GrayPercent, FieldValue::Scalar(v)) => {
                Measurement::GrayPercent(integer(v)?)
            }
            _ => return None,
        };
        Some(measurement)
    }

    /// Kind of this measurement; `None` for [`Measurement::Unknown`]
    pub fn kind(&self) -> Option<MeasurementKind> {
        match self {
            Measurement::SolarCurrent(_) => Some(MeasurementKind::SolarCurrent),
            Measurement::HouseCurrent(_) => Some(MeasurementKind::HouseCurrent),
            Measurement::HouseVoltage(_) => Some(MeasurementKind::HouseVoltage),
            Measurement::VehicleVoltage(_) => Some(MeasurementKind::VehicleVoltage),
            Measurement::HouseCapacityAmpHours(_) => Some(MeasurementKind::HouseCapacityAmpHours),
            Measurement::HouseCapacityPercent { .. } => Some(MeasurementKind::HouseCapacityPercent),
            Measurement::FreshPercent(_) => Some(MeasurementKind::FreshPercent),
            Measurement::GrayPercent(_) => Some(MeasurementKind::GrayPercent),
            Measurement::Unknown(_) => None,
        }
    }

    /// True when this measurement answers a request for `kind`
    pub fn is(&self, kind: MeasurementKind) -> bool {
        self.kind() == Some(kind)
    }
}

fn integer(value: Scaled) -> Option<u16> {
    value.as_integer().and_then(|raw| u16::try_from(raw).ok())
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::SolarCurrent(v) => write!(f, "{} A solar current", v),
            Measurement::HouseCurrent(v) => write!(f, "{} A house current", v),
            Measurement::HouseVoltage(v) => write!(f, "{:.1} V house voltage", v.value()),
            Measurement::VehicleVoltage(v) => write!(f, "{:.1} V vehicle voltage", v.value()),
            Measurement::HouseCapacityAmpHours(v) => write!(f, "{} Ah house capacity", v),
            Measurement::HouseCapacityPercent { percent, unknown } => {
                write!(f, "{} % house capacity ({})", percent, unknown)
            }
            Measurement::FreshPercent(v) => write!(f, "{} % fresh water", v),
            Measurement::GrayPercent(v) => write!(f, "{} % gray water", v),
            Measurement::Unknown(frame) => write!(f, "{}", frame),
        }
    }
}

/// Host request for one measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Request {
    /// Device asked
    pub address: u8,
    /// Field asked for
    pub field_id: u8,
}

impl Request {
    /// Creates a new request
    pub fn new(address: u8, field_id: u8) -> Self {
        Request { address, field_id }
    }

    /// Request that makes the owning device report `kind`
    pub fn for_kind(kind: MeasurementKind) -> Self {
        let entry = super::table::MeasurementTable::entry(kind);
        Request::new(entry.address, entry.field_id)
    }
}

impl From<MeasurementKind> for Request {
    fn from(kind: MeasurementKind) -> Self {
        Request::for_kind(kind)
    }
}
