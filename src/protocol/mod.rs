//! Protocol implementation module
//!
//! This module defines the Votronic bus wire format: checksumming, frame
//! extraction, the measurement registry and the typed request/measurement codec.

pub mod checksum;
pub mod codec;
pub mod frame;
pub mod message;
pub mod table;

pub use self::codec::{annotate, decode, encode, Annotated};
pub use self::frame::{Frame, FrameCodec, SyncStats};
pub use self::message::{FieldValue, Measurement, MeasurementKind, Request, Scaled};
pub use self::table::{Layout, MeasurementTable, TableEntry};

/// First byte of every frame
pub const SENTINEL: u8 = 0xAA;

/// Class byte of frames sent by the host
pub const CLASS_REQUEST: u8 = 0x22;

/// Class byte of frames answered by a device
pub const CLASS_RESPONSE: u8 = 0x62;

/// Third header byte, constant on this bus
pub const PROTOCOL_BYTE: u8 = 0xF4;

/// Seed of the running-XOR checksum
pub const CHECKSUM_SEED: u8 = 0x55;

/// Class, address and protocol byte
pub const HEADER_LEN: usize = 3;

/// Position of the payload length byte
pub const LENGTH_OFFSET: usize = 1 + HEADER_LEN;

/// Sentinel, header, length and checksum
pub const FRAME_OVERHEAD: usize = 1 + HEADER_LEN + 1 + 1;

/// Largest payload a single length byte can describe
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// Device addresses
pub mod address {
    /// Battery controller, house side
    pub const HOUSE: u8 = 0x0c;
    /// Solar charge regulator
    pub const SOLAR: u8 = 0x10;
    /// Fresh water level sensor
    pub const FRESH_WATER: u8 = 0x14;
    /// Gray water level sensor
    pub const GRAY_WATER: u8 = 0x18;
    /// Vehicle (starter) battery
    pub const VEHICLE: u8 = 0x44;
}

/// Field ids, first payload byte
pub mod field {
    /// Current, or fill level on the water sensors
    pub const CURRENT: u8 = 0x02;
    /// Voltage
    pub const VOLTAGE: u8 = 0x03;
    /// Remaining capacity in amp-hours
    pub const AMP_HOURS: u8 = 0x05;
    /// Remaining capacity in percent
    pub const CAPACITY_PERCENT: u8 = 0x06;
}
