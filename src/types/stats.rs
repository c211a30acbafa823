use crate::types::{Field, FieldMap, GeoPoint};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Min/max/average over the defined samples of one field
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl FieldStats {
    /// Returns `None` when the iterator yields nothing
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for value in values {
            count += 1;
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }
        (count > 0).then(|| FieldStats {
            min,
            max,
            avg: sum / count as f64,
        })
    }
}

/// Speed summary in km/h
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeedStats {
    /// `avg` is 2D distance over duration
    pub two_d: FieldStats,
    /// `avg` is 3D distance over duration
    pub three_d: FieldStats,
    pub vertical: Option<FieldStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HomeSource {
    /// Written by the aircraft in a HOME field
    Recorded,
    /// No HOME field; first valid GPS fix of the session
    FirstFix,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HomePoint {
    pub point: GeoPoint,
    pub source: HomeSource,
    pub session: Option<String>,
}

/// Aggregate statistics over a packet sequence
///
/// GPS-derived values are `None` when no packet carries a valid fix.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StatsSummary {
    /// First absolute date in the sequence
    pub date: Option<DateTime<Utc>>,
    pub duration_ms: i64,
    /// Cumulative great-circle distance in meters
    pub distance_2d: Option<f64>,
    /// Distance including altitude changes, in meters
    pub distance_3d: Option<f64>,
    pub speed: Option<SpeedStats>,
    pub home: Vec<HomePoint>,
    pub fields: BTreeMap<Field, FieldStats>,
    /// Numeric layout-specific fields, in first-seen order
    pub extra: Vec<(String, FieldStats)>,
    pub properties: FieldMap,
}

impl StatsSummary {
    pub fn field(&self, field: Field) -> Option<&FieldStats> {
        self.fields.get(&field)
    }

    pub fn extra_field(&self, name: &str) -> Option<&FieldStats> {
        self.extra.iter().find(|(k, _)| k == name).map(|(_, s)| s)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}
