//! Static registry of the measurements found on the bus
//!
//! Keyed by (device address, field id). The registry is the only place that
//! knows where a value sits in a payload and how to scale it; the codec is
//! driven entirely by these entries.

use super::message::{FieldValue, MeasurementKind, Scaled};
use super::{address, field};

/// Where the value sits in the payload and how to read it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Little-endian integer of `width` bytes starting at payload offset 1
    Scalar {
        /// Bytes occupied
        width: usize,
        /// Two's complement when set
        signed: bool,
        /// Power of ten the raw integer is divided by
        decimals: u8,
    },
    /// Two single-byte unsigned sub-fields at payload offsets 1 and 2
    Pair,
}

impl Layout {
    /// Reads the value from a response payload; `None` if the payload is too short
    pub fn read(&self, payload: &[u8]) -> Option<FieldValue> {
        match *self {
            Layout::Scalar { width, signed, decimals } => {
                let bytes = payload.get(1..1 + width)?;
                let raw = if signed { le_signed(bytes) } else { le_unsigned(bytes) };
                Some(FieldValue::Scalar(Scaled::new(raw, decimals)))
            }
            Layout::Pair => {
                let bytes = payload.get(1..3)?;
                Some(FieldValue::Pair(bytes[0], bytes[1]))
            }
        }
    }
}

/// Unsigned little-endian integer of up to 7 bytes
pub fn le_unsigned(bytes: &[u8]) -> i64 {
    bytes
        .iter()
        .take(7)
        .enumerate()
        .fold(0i64, |acc, (i, &b)| acc | (b as i64) << (8 * i))
}

/// Two's complement little-endian integer of up to 7 bytes
pub fn le_signed(bytes: &[u8]) -> i64 {
    let width = bytes.len().min(7);
    if width == 0 {
        return 0;
    }
    let shift = 64 - 8 * width as u32;
    (le_unsigned(bytes) << shift) >> shift
}

/// One registry row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableEntry {
    /// Device answering
    pub address: u8,
    /// First payload byte
    pub field_id: u8,
    /// Measurement produced
    pub kind: MeasurementKind,
    /// Decode rule
    pub layout: Layout,
}

const fn word(signed: bool, decimals: u8) -> Layout {
    Layout::Scalar { width: 2, signed, decimals }
}

const fn entry(address: u8, field_id: u8, kind: MeasurementKind, layout: Layout) -> TableEntry {
    TableEntry { address, field_id, kind, layout }
}

/// Every known (address, field id) pair
pub static MEASUREMENT_TABLE: [TableEntry; 8] = [
    entry(address::SOLAR, field::CURRENT, MeasurementKind::SolarCurrent, word(true, 1)),
    entry(address::HOUSE, field::CURRENT, MeasurementKind::HouseCurrent, word(true, 1)),
    entry(address::HOUSE, field::VOLTAGE, MeasurementKind::HouseVoltage, word(false, 2)),
    entry(address::VEHICLE, field::VOLTAGE, MeasurementKind::VehicleVoltage, word(false, 2)),
    entry(address::HOUSE, field::AMP_HOURS, MeasurementKind::HouseCapacityAmpHours, word(false, 0)),
    entry(address::HOUSE, field::CAPACITY_PERCENT, MeasurementKind::HouseCapacityPercent, Layout::Pair),
    entry(address::FRESH_WATER, field::CURRENT, MeasurementKind::FreshPercent, word(false, 0)),
    entry(address::GRAY_WATER, field::CURRENT, MeasurementKind::GrayPercent, word(false, 0)),
];

/// Lookups over [`MEASUREMENT_TABLE`]
pub struct MeasurementTable;

impl MeasurementTable {
    /// All rows
    pub fn entries() -> &'static [TableEntry] {
        &MEASUREMENT_TABLE
    }

    /// Row for a response; a miss is not an error
    pub fn lookup(address: u8, field_id: u8) -> Option<&'static TableEntry> {
        MEASUREMENT_TABLE
            .iter()
            .find(|e| e.address == address && e.field_id == field_id)
    }

    /// Row describing `kind`
    pub fn entry(kind: MeasurementKind) -> &'static TableEntry {
        // Every kind has exactly one row, checked by the tests below.
        &MEASUREMENT_TABLE[kind as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_unique() {
        let keys: HashSet<_> = MEASUREMENT_TABLE
            .iter()
            .map(|e| (e.address, e.field_id))
            .collect();
        assert_eq!(keys.len(), MEASUREMENT_TABLE.len());
    }

    #[test]
    fn test_every_kind_has_its_row() {
        assert_eq!(MeasurementKind::all().len(), MEASUREMENT_TABLE.len());
        for &kind in MeasurementKind::all() {
            assert_eq!(MeasurementTable::entry(kind).kind, kind);
        }
    }

    #[test]
    fn test_lookup() {
        let kind = |a, f| MeasurementTable::lookup(a, f).map(|e| e.kind);
        assert_eq!(kind(0x0c, 0x02), Some(MeasurementKind::HouseCurrent));
        assert_eq!(kind(0x10, 0x02), Some(MeasurementKind::SolarCurrent));
        assert_eq!(kind(0x44, 0x03), Some(MeasurementKind::VehicleVoltage));
        assert_eq!(kind(0x99, 0x02), None);
        assert_eq!(kind(0x10, 0x03), None);
    }

    #[test]
    fn test_decimal_scaling() {
        let signed = word(true, 1).read(&[0x02, 0x7b, 0x00]).unwrap();
        assert_eq!(signed, FieldValue::Scalar(Scaled::new(123, 1)));
        if let FieldValue::Scalar(v) = signed {
            assert_eq!(v.value(), 12.3);
        }

        let unsigned = word(false, 0).read(&[0x05, 0xf4, 0x01]).unwrap();
        assert_eq!(unsigned, FieldValue::Scalar(Scaled::new(500, 0)));
    }

    #[test]
    fn test_signed_negative() {
        assert_eq!(le_signed(&[0xf6, 0xff]), -10);
        assert_eq!(le_signed(&[0x00, 0x80]), -32768);
        assert_eq!(le_unsigned(&[0xf6, 0xff]), 65526);
        assert_eq!(le_signed(&[0x80]), -128);
    }

    #[test]
    fn test_short_payload() {
        assert_eq!(word(false, 2).read(&[0x03, 0x10]), None);
        assert_eq!(Layout::Pair.read(&[0x06, 0x50]), None);
        assert_eq!(Layout::Pair.read(&[0x06, 0x50, 0x01]), Some(FieldValue::Pair(0x50, 0x01)));
    }
}
