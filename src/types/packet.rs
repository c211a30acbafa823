use chrono::{DateTime, Utc};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Typed value stored in a field bag
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FieldValue {
    Number(f64),
    List(Vec<f64>),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Number(value) => write!(f, "{}", value),
            FieldValue::List(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(" "))
            }
            FieldValue::Text(text) => write!(f, "{}", text),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<Vec<f64>> for FieldValue {
    fn from(values: Vec<f64>) -> Self {
        FieldValue::List(values)
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

/// Ordered field-name to value mapping
///
/// Keeps first-insertion order so re-exports are deterministic. Inserting an
/// existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(String, FieldValue)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `other` into this map; keys already present are overridden
    pub fn merge(&mut self, other: &FieldMap) {
        for (key, value) in other.iter() {
            self.insert(key, value.clone());
        }
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

#[cfg(feature = "serde")]
impl Serialize for FieldMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldMapVisitor;

        impl<'de> serde::de::Visitor<'de> for FieldMapVisitor {
            type Value = FieldMap;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of field names to numbers, strings or number lists")
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(
                self,
                mut access: A,
            ) -> Result<FieldMap, A::Error> {
                let mut map = FieldMap::new();
                while let Some((key, value)) = access.next_entry::<String, FieldValue>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(FieldMapVisitor)
    }
}

/// Latitude/longitude pair in signed decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0
    }

    /// The exact (0,0) fix DJI firmwares write before GPS lock
    pub fn is_placeholder(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

/// Pitch/roll/yaw triple in degrees; each axis may be missing
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Orientation {
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub yaw: Option<f64>,
}

impl Orientation {
    pub fn is_empty(&self) -> bool {
        self.pitch.is_none() && self.roll.is_none() && self.yaw.is_none()
    }
}

/// Camera exposure parameters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CameraSettings {
    pub iso: Option<u32>,
    /// Shutter as the denominator of `1/shutter` seconds
    pub shutter: Option<f64>,
    pub fnum: Option<f64>,
    pub ev: Option<f64>,
    pub focal_length: Option<f64>,
}

/// Speeds derived from the step to the previous packet of the same session (km/h)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PacketSpeed {
    pub two_d: f64,
    pub three_d: f64,
    pub vertical: Option<f64>,
}

/// One normalized telemetry sample
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CanonicalPacket {
    /// Frame number (SRT sequence number, 1-based)
    pub frame: usize,
    /// Epoch milliseconds when `date` is known, otherwise milliseconds from
    /// the start of the recording
    pub timestamp_ms: i64,
    pub date: Option<DateTime<Utc>>,
    pub position: Option<GeoPoint>,
    /// Home point as recorded by the aircraft
    pub home: Option<GeoPoint>,
    pub altitude_barometer: Option<f64>,
    pub altitude_gps: Option<f64>,
    pub satellites: Option<u32>,
    pub camera: CameraSettings,
    pub gimbal: Option<Orientation>,
    pub aircraft: Option<Orientation>,
    pub speed: Option<PacketSpeed>,
    /// Name of the input this packet came from
    pub source: Option<Arc<str>>,
    /// Layout-specific fields without a canonical slot
    pub extra: FieldMap,
}

impl CanonicalPacket {
    pub fn new(frame: usize, timestamp_ms: i64) -> Self {
        Self {
            frame,
            timestamp_ms,
            ..Default::default()
        }
    }

    /// Barometric altitude, falling back to the GPS one
    pub fn altitude(&self) -> Option<f64> {
        self.altitude_barometer.or(self.altitude_gps)
    }

    pub fn fix(&self) -> Option<GeoPoint> {
        self.position.filter(GeoPoint::is_valid)
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

/// Canonical numeric fields covered by the min/max/avg statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Field {
    Latitude,
    Longitude,
    AltitudeBarometer,
    AltitudeGps,
    Satellites,
    Iso,
    Shutter,
    FNumber,
    Ev,
    FocalLength,
    GimbalPitch,
    GimbalRoll,
    GimbalYaw,
    AircraftPitch,
    AircraftRoll,
    AircraftYaw,
}

impl Field {
    pub const ALL: [Field; 16] = [
        Field::Latitude,
        Field::Longitude,
        Field::AltitudeBarometer,
        Field::AltitudeGps,
        Field::Satellites,
        Field::Iso,
        Field::Shutter,
        Field::FNumber,
        Field::Ev,
        Field::FocalLength,
        Field::GimbalPitch,
        Field::GimbalRoll,
        Field::GimbalYaw,
        Field::AircraftPitch,
        Field::AircraftRoll,
        Field::AircraftYaw,
    ];

    /// Column/property name used by exporters
    pub fn name(self) -> &'static str {
        match self {
            Field::Latitude => "LATITUDE",
            Field::Longitude => "LONGITUDE",
            Field::AltitudeBarometer => "BAROMETER",
            Field::AltitudeGps => "GPS_ALTITUDE",
            Field::Satellites => "SATELLITES",
            Field::Iso => "ISO",
            Field::Shutter => "SHUTTER",
            Field::FNumber => "FNUM",
            Field::Ev => "EV",
            Field::FocalLength => "FOCAL_LEN",
            Field::GimbalPitch => "GIMBAL_PITCH",
            Field::GimbalRoll => "GIMBAL_ROLL",
            Field::GimbalYaw => "GIMBAL_YAW",
            Field::AircraftPitch => "AIRCRAFT_PITCH",
            Field::AircraftRoll => "AIRCRAFT_ROLL",
            Field::AircraftYaw => "AIRCRAFT_YAW",
        }
    }

    pub fn value(self, packet: &CanonicalPacket) -> Option<f64> {
        let gimbal = packet.gimbal.unwrap_or_default();
        let aircraft = packet.aircraft.unwrap_or_default();
        match self {
            Field::Latitude => packet.fix().map(|p| p.latitude),
            Field::Longitude => packet.fix().map(|p| p.longitude),
            Field::AltitudeBarometer => packet.altitude_barometer,
            Field::AltitudeGps => packet.altitude_gps,
            Field::Satellites => packet.satellites.map(f64::from),
            Field::Iso => packet.camera.iso.map(f64::from),
            Field::Shutter => packet.camera.shutter,
            Field::FNumber => packet.camera.fnum,
            Field::Ev => packet.camera.ev,
            Field::FocalLength => packet.camera.focal_length,
            Field::GimbalPitch => gimbal.pitch,
            Field::GimbalRoll => gimbal.roll,
            Field::GimbalYaw => gimbal.yaw,
            Field::AircraftPitch => aircraft.pitch,
            Field::AircraftRoll => aircraft.roll,
            Field::AircraftYaw => aircraft.yaw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_map_keeps_insertion_order_on_override() {
        let mut map = FieldMap::new();
        map.insert("CT", 5500.0);
        map.insert("COLOR_MD", "default");
        map.insert("CT", 5200.0);

        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["CT", "COLOR_MD"]);
        assert_eq!(map.get("CT"), Some(&FieldValue::Number(5200.0)));
    }

    #[test]
    fn test_fix_validity() {
        assert!(GeoPoint::new(0.0, 0.0).is_placeholder());
        assert!(!GeoPoint::new(0.0, 0.001).is_placeholder());
        assert!(!GeoPoint::new(91.0, 10.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 10.0).is_valid());
        assert!(GeoPoint::new(-20.2533, 149.0251).is_valid());
        assert!(GeoPoint::new(0.0, 0.001).is_valid());
    }

    #[test]
    fn test_altitude_prefers_barometer() {
        let mut packet = CanonicalPacket::new(1, 0);
        packet.altitude_gps = Some(98.4);
        assert_eq!(packet.altitude(), Some(98.4));
        packet.altitude_barometer = Some(1.3);
        assert_eq!(packet.altitude(), Some(1.3));
    }
}
