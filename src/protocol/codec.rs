//! Typed view over frames: response decoding and request encoding

use std::fmt;

use super::frame::Frame;
use super::message::{Measurement, Request};
use super::table::MeasurementTable;
use super::{CLASS_REQUEST, CLASS_RESPONSE, PROTOCOL_BYTE};

/// Decodes a validated frame into a measurement
///
/// Requests, unregistered (address, field id) pairs and payloads too short
/// for their registered layout all come back as [`Measurement::Unknown`].
pub fn decode(frame: &Frame) -> Measurement {
    if frame.class() != CLASS_RESPONSE {
        return Measurement::Unknown(frame.clone());
    }

    frame
        .field_id()
        .and_then(|field_id| MeasurementTable::lookup(frame.address(), field_id))
        .and_then(|entry| {
            let value = entry.layout.read(frame.payload())?;
            Measurement::from_value(entry.kind, value)
        })
        .unwrap_or_else(|| Measurement::Unknown(frame.clone()))
}

/// Encodes a request as `[field id, 0, 0]` addressed to its device
pub fn encode(request: &Request) -> Frame {
    Frame::assemble(
        [CLASS_REQUEST, request.address, PROTOCOL_BYTE],
        &[request.field_id, 0x00, 0x00],
    )
}

/// A received frame together with its decoded reading, for dumps
///
/// Displays as the frame, then the reading: `62 f4 10 / 02 7b 00  12.3 A solar current`.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotated<'a> {
    /// Frame as received
    pub frame: &'a Frame,
    /// What it decodes to
    pub measurement: Measurement,
}

/// Decodes `frame` and keeps it alongside the result
pub fn annotate(frame: &Frame) -> Annotated<'_> {
    Annotated {
        frame,
        measurement: decode(frame),
    }
}

impl fmt::Display for Annotated<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.measurement {
            Measurement::Unknown(_) => write!(f, "{}", self.frame),
            reading => write!(f, "{}  {}", self.frame, reading),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{checksum, FrameCodec, MeasurementKind, Scaled};
    use bytes::BytesMut;
    use tokio_util::codec::Decoder;

    fn response(address: u8, payload: &[u8]) -> Frame {
        Frame::new([CLASS_RESPONSE, address, PROTOCOL_BYTE], payload).unwrap()
    }

    #[test]
    fn test_encode_request() {
        let frame = encode(&Request::for_kind(MeasurementKind::HouseCurrent));
        assert_eq!(
            frame.as_bytes(),
            &[0xaa, 0x22, 0x0c, 0xf4, 0x03, 0x02, 0x00, 0x00, 0x24]
        );
    }

    #[test]
    fn test_every_request_survives_the_wire() {
        for &kind in MeasurementKind::all() {
            let frame = encode(&Request::for_kind(kind));
            assert_eq!(checksum::compute(frame.as_bytes()), 0);

            let mut codec = FrameCodec::new();
            let mut bytes = BytesMut::from(frame.as_bytes());
            let decoded = codec.decode(&mut bytes).unwrap().unwrap();
            assert_eq!(decoded, frame);

            // A request is never mistaken for an answer
            assert_eq!(decode(&decoded), Measurement::Unknown(frame));
        }
    }

    #[test]
    fn test_decode_every_kind() {
        let cases = [
            (0x10, vec![0x02, 0x7b, 0x00], Measurement::SolarCurrent(Scaled::new(123, 1))),
            (0x0c, vec![0x02, 0xf6, 0xff], Measurement::HouseCurrent(Scaled::new(-10, 1))),
            (0x0c, vec![0x03, 0x2d, 0x05], Measurement::HouseVoltage(Scaled::new(1325, 2))),
            (0x44, vec![0x03, 0xc4, 0x04], Measurement::VehicleVoltage(Scaled::new(1220, 2))),
            (0x0c, vec![0x05, 0xf4, 0x01], Measurement::HouseCapacityAmpHours(500)),
            (
                0x0c,
                vec![0x06, 0x57, 0x03],
                Measurement::HouseCapacityPercent { percent: 87, unknown: 3 },
            ),
            (0x14, vec![0x02, 0x32, 0x00], Measurement::FreshPercent(50)),
            (0x18, vec![0x02, 0x0a, 0x00], Measurement::GrayPercent(10)),
        ];

        for (address, payload, expected) in cases {
            assert_eq!(decode(&response(address, &payload)), expected);
        }
    }

    #[test]
    fn test_decode_panel_header_order() {
        // aa 62 f4 10 03 02 7b 00 <checksum>
        let frame = Frame::new([CLASS_RESPONSE, PROTOCOL_BYTE, 0x10], &[0x02, 0x7b, 0x00]).unwrap();
        assert_eq!(&frame.as_bytes()[..4], &[0xaa, 0x62, 0xf4, 0x10]);
        assert_eq!(decode(&frame), Measurement::SolarCurrent(Scaled::new(123, 1)));

        let frame = Frame::new([CLASS_RESPONSE, PROTOCOL_BYTE, 0x0c], &[0x06, 0x57, 0x03]).unwrap();
        assert_eq!(
            decode(&frame),
            Measurement::HouseCapacityPercent { percent: 87, unknown: 3 }
        );
    }

    #[test]
    fn test_annotated_display() {
        let frame = response(0x10, &[0x02, 0x7b, 0x00]);
        assert_eq!(
            annotate(&frame).to_string(),
            "62 10 f4 / 02 7b 00  12.3 A solar current"
        );

        let frame = Frame::new([CLASS_RESPONSE, PROTOCOL_BYTE, 0x44], &[0x03, 0xc4, 0x04]).unwrap();
        assert_eq!(
            annotate(&frame).to_string(),
            "62 f4 44 / 03 c4 04  12.2 V vehicle voltage"
        );

        let unknown = response(0x99, &[0x01, 0x00, 0x00]);
        assert_eq!(annotate(&unknown).to_string(), "62 99 f4 / 01 00 00");
    }

    #[test]
    fn test_decode_unknown() {
        let frame = response(0x99, &[0x02, 0x01, 0x00]);
        assert_eq!(decode(&frame), Measurement::Unknown(frame.clone()));

        let empty = response(0x0c, &[]);
        assert_eq!(decode(&empty), Measurement::Unknown(empty.clone()));

        let short = response(0x0c, &[0x03, 0x2d]);
        assert_eq!(decode(&short), Measurement::Unknown(short.clone()));
    }

    #[test]
    fn test_decode_ignores_trailing_payload() {
        let frame = response(0x10, &[0x02, 0x7b, 0x00, 0xff, 0xff]);
        assert_eq!(decode(&frame), Measurement::SolarCurrent(Scaled::new(123, 1)));
    }
}
