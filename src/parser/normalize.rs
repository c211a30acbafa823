//! Field normalization
//!
//! Maps the raw fields of one frame onto a [`CanonicalPacket`]. Each layout
//! names its canonical keys in [`slot_for`]; anything else lands in the
//! packet's extra bag with its original key. Raw values that fail to parse
//! are reported as defects and kept verbatim.

use crate::conversion::{
    parse_count, parse_date, parse_fnum, parse_number, parse_shutter, parse_tuple,
    ShutterNotation,
};
use crate::parser::block::RawFrame;
use crate::parser::extract::RawFields;
use crate::types::{CanonicalPacket, Defect, FieldMap, FieldValue, GeoPoint, Layout, Orientation};
use chrono::{DateTime, Utc};

/// Raw metadata key holding the frame's timecode line
pub const TIMECODE_KEY: &str = "TIMECODE";

/// Canonical destination of a raw key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Date,
    /// `(lon, lat, satellites | altitude)`
    Gps,
    /// `(lon, lat, altitude)`, preferred over `Gps`
    Rtk,
    /// `(lon, lat[, altitude])`
    Home,
    Latitude,
    Longitude,
    Satellites,
    AltitudeBarometer,
    AltitudeGps,
    Iso,
    Ev,
    FocalLength,
    Shutter(ShutterNotation),
    FNumber { hundredths: bool },
    GimbalPitch,
    GimbalRoll,
    GimbalYaw,
    GimbalTuple,
    AircraftTuple,
}

fn slot_for(layout: Layout, key: &str) -> Option<Slot> {
    let common = match key {
        "DATE" => Some(Slot::Date),
        "ISO" => Some(Slot::Iso),
        "EV" => Some(Slot::Ev),
        "FOCAL_LEN" => Some(Slot::FocalLength),
        "SATELLITES" => Some(Slot::Satellites),
        _ => None,
    };
    if common.is_some() {
        return common;
    }

    match layout {
        Layout::Rtk | Layout::Phantom4Pro => match key {
            "RTK" if layout == Layout::Rtk => Some(Slot::Rtk),
            "GPS" => Some(Slot::Gps),
            "F" => Some(Slot::FNumber { hundredths: false }),
            "SS" => Some(Slot::Shutter(ShutterNotation::Denominator)),
            "H" => Some(Slot::AltitudeBarometer),
            "G_PRY" => Some(Slot::GimbalTuple),
            "F_PRY" => Some(Slot::AircraftTuple),
            _ => None,
        },
        Layout::Mavic2 | Layout::MavicAir => match key {
            "LATITUDE" => Some(Slot::Latitude),
            "LONGITUDE" | "LONGTITUDE" => Some(Slot::Longitude),
            "REL_ALT" | "ALTITUDE" => Some(Slot::AltitudeBarometer),
            "ABS_ALT" => Some(Slot::AltitudeGps),
            "SHUTTER" => Some(Slot::Shutter(ShutterNotation::Fraction)),
            "FNUM" => Some(Slot::FNumber { hundredths: true }),
            "GB_PITCH" => Some(Slot::GimbalPitch),
            "GB_ROLL" => Some(Slot::GimbalRoll),
            "GB_YAW" => Some(Slot::GimbalYaw),
            _ => None,
        },
        Layout::MavicPro | Layout::MavicProBuggy => match key {
            "HOME" => Some(Slot::Home),
            "GPS" => Some(Slot::Gps),
            "BAROMETER" => Some(Slot::AltitudeBarometer),
            "SHUTTER" => Some(Slot::Shutter(ShutterNotation::Denominator)),
            "FNUM" => Some(Slot::FNumber { hundredths: false }),
            _ => None,
        },
        Layout::Legacy => match key {
            "HOME" => Some(Slot::Home),
            "GPS" => Some(Slot::Gps),
            "HB" => Some(Slot::AltitudeBarometer),
            "SHUTTER" => Some(Slot::Shutter(ShutterNotation::Denominator)),
            "F_NUM" => Some(Slot::FNumber { hundredths: false }),
            _ => None,
        },
    }
}

/// Typed form of a raw value for the metadata bags
pub fn typed_value(text: &str) -> FieldValue {
    if let Some(number) = parse_number(text) {
        return FieldValue::Number(number);
    }
    if text.contains(',') {
        if let Ok(values) = parse_tuple(text) {
            return FieldValue::List(values);
        }
    }
    FieldValue::Text(text.to_string())
}

/// Result of normalizing one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub packet: CanonicalPacket,
    /// Every raw field of the frame, typed, in order of appearance
    pub raw: FieldMap,
    pub defects: Vec<Defect>,
}

/// Collects canonical values while fields are walked in order
#[derive(Default)]
struct Draft {
    date: Option<DateTime<Utc>>,
    gps: Option<GeoPoint>,
    rtk: Option<GeoPoint>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    gimbal: Orientation,
    aircraft: Option<Orientation>,
}

fn point(values: &[f64]) -> Option<GeoPoint> {
    match values {
        [lon, lat, ..] => Some(GeoPoint::new(*lat, *lon)),
        _ => None,
    }
}

fn orientation(values: &[f64]) -> Option<Orientation> {
    match values {
        [pitch, roll, yaw, ..] => Some(Orientation {
            pitch: Some(*pitch),
            roll: Some(*roll),
            yaw: Some(*yaw),
        }),
        _ => None,
    }
}

/// A decimal third GPS element is an altitude, an integral one a satellite count
fn third_is_altitude(text: &str) -> bool {
    text.split(',').nth(2).map_or(false, |part| part.contains('.'))
}

/// Apply one canonical field; `false` when the value cannot be interpreted
fn apply(slot: Slot, text: &str, packet: &mut CanonicalPacket, draft: &mut Draft) -> bool {
    match slot {
        Slot::Date => {
            draft.date = parse_date(text);
            draft.date.is_some()
        }
        Slot::Gps | Slot::Rtk | Slot::Home => {
            let Ok(values) = parse_tuple(text) else {
                return false;
            };
            let Some(fix) = point(&values) else {
                return false;
            };
            match slot {
                Slot::Gps => {
                    draft.gps = Some(fix);
                    if let Some(third) = values.get(2) {
                        if third_is_altitude(text) {
                            packet.altitude_gps = Some(*third);
                        } else if *third >= 0.0 {
                            packet.satellites = Some(*third as u32);
                        }
                    }
                }
                Slot::Rtk => {
                    draft.rtk = Some(fix);
                    if let Some(altitude) = values.get(2) {
                        packet.altitude_gps = Some(*altitude);
                    }
                }
                _ => packet.home = Some(fix).filter(|p| p.is_valid() && !p.is_placeholder()),
            }
            true
        }
        Slot::Latitude => {
            draft.latitude = parse_number(text);
            draft.latitude.is_some()
        }
        Slot::Longitude => {
            draft.longitude = parse_number(text);
            draft.longitude.is_some()
        }
        Slot::Satellites => {
            packet.satellites = parse_count(text);
            packet.satellites.is_some()
        }
        Slot::AltitudeBarometer => {
            packet.altitude_barometer = parse_number(text);
            packet.altitude_barometer.is_some()
        }
        Slot::AltitudeGps => {
            packet.altitude_gps = parse_number(text);
            packet.altitude_gps.is_some()
        }
        Slot::Iso => {
            packet.camera.iso = parse_count(text);
            packet.camera.iso.is_some()
        }
        Slot::Ev => {
            packet.camera.ev = parse_number(text);
            packet.camera.ev.is_some()
        }
        Slot::FocalLength => {
            packet.camera.focal_length = parse_number(text);
            packet.camera.focal_length.is_some()
        }
        Slot::Shutter(notation) => {
            packet.camera.shutter = parse_shutter(text, notation);
            packet.camera.shutter.is_some()
        }
        Slot::FNumber { hundredths } => {
            packet.camera.fnum = parse_fnum(text, hundredths);
            packet.camera.fnum.is_some()
        }
        Slot::GimbalPitch => {
            draft.gimbal.pitch = parse_number(text);
            draft.gimbal.pitch.is_some()
        }
        Slot::GimbalRoll => {
            draft.gimbal.roll = parse_number(text);
            draft.gimbal.roll.is_some()
        }
        Slot::GimbalYaw => {
            draft.gimbal.yaw = parse_number(text);
            draft.gimbal.yaw.is_some()
        }
        Slot::GimbalTuple => match parse_tuple(text).ok().as_deref().and_then(orientation) {
            Some(value) => {
                draft.gimbal = value;
                true
            }
            None => false,
        },
        Slot::AircraftTuple => {
            draft.aircraft = parse_tuple(text).ok().as_deref().and_then(orientation);
            draft.aircraft.is_some()
        }
    }
}

/// Position of a frame on the video clock: timecode start, else
/// `(index - 1)` nominal frame intervals
pub(crate) fn relative_ms(layout: Layout, frame: &RawFrame) -> i64 {
    match frame.timecode {
        Some(timecode) => timecode.start_ms,
        None => i64::try_from(frame.index.saturating_sub(1))
            .unwrap_or(i64::MAX)
            .saturating_mul(layout.nominal_frame_interval_ms()),
    }
}

/// Normalize one extracted frame
///
/// The timestamp is the absolute date when the frame carries one, else the
/// timecode start, else `(index - 1)` nominal frame intervals.
pub fn normalize_frame(layout: Layout, frame: &RawFrame, fields: RawFields) -> Normalized {
    let mut packet = CanonicalPacket::new(frame.index, 0);
    let mut raw = FieldMap::new();
    let mut defects = Vec::new();
    let mut draft = Draft::default();

    if let Some(timecode) = &frame.timecode_text {
        raw.insert(TIMECODE_KEY, timecode.as_str());
        packet.extra.insert(TIMECODE_KEY, timecode.as_str());
    }

    for (key, text) in fields {
        let value = typed_value(&text);
        match slot_for(layout, &key) {
            Some(slot) => {
                if !apply(slot, &text, &mut packet, &mut draft) {
                    defects.push(Defect::field(frame.index, key.as_str(), text.as_str()));
                    packet.extra.insert(key.as_str(), FieldValue::Text(text.clone()));
                }
            }
            None => {
                packet.extra.insert(key.as_str(), value.clone());
            }
        }
        raw.insert(key, value);
    }

    let paired = match (draft.latitude, draft.longitude) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint::new(latitude, longitude)),
        _ => None,
    };
    if let (Some(_), Some(gps)) = (draft.rtk, draft.gps) {
        // RTK supersedes the plain receiver; keep its fix visible
        packet
            .extra
            .insert("GPS", vec![gps.longitude, gps.latitude]);
    }
    packet.position = draft
        .rtk
        .or(draft.gps)
        .or(paired)
        .filter(|p| p.is_valid() && !p.is_placeholder());

    if !draft.gimbal.is_empty() {
        packet.gimbal = Some(draft.gimbal);
    }
    packet.aircraft = draft.aircraft;

    packet.date = draft.date;
    packet.timestamp_ms = match draft.date {
        Some(date) => date.timestamp_millis(),
        None => relative_ms(layout, frame),
    };

    Normalized {
        packet,
        raw,
        defects,
    }
}
