//! Statistics aggregation
//!
//! Min/max/avg per canonical field, plus the composite values derived from
//! the packet order: duration, great-circle distance, 2D/3D speed and the
//! home point. Steps are only ever taken between consecutive packets of the
//! same source, so a merged sequence never gets a jump between two inputs.

use crate::conversion::speed_kmh;
use crate::types::{
    CanonicalPacket, Field, FieldMap, FieldStats, FieldValue, GeoPoint, HomePoint, HomeSource,
    PacketSpeed, SpeedStats, StatsSummary,
};
use std::collections::HashMap;

/// Mean earth radius used for great-circle distances (meters)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters
pub fn haversine_distance(from: GeoPoint, to: GeoPoint) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos()
            * to.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

/// Movement between a packet and the previous packet of its source
#[derive(Debug, Clone, Copy)]
struct Step {
    /// Both ends carry a valid fix
    located: bool,
    horizontal: f64,
    vertical: Option<f64>,
    millis: i64,
}

impl Step {
    fn three_d(&self) -> f64 {
        match self.vertical {
            Some(dz) => (self.horizontal * self.horizontal + dz * dz).sqrt(),
            None => self.horizontal,
        }
    }
}

/// One entry per packet; `None` for the first packet of each source
fn steps(packets: &[CanonicalPacket]) -> Vec<Option<Step>> {
    let mut last_of_source: HashMap<Option<&str>, usize> = HashMap::new();
    packets
        .iter()
        .enumerate()
        .map(|(i, packet)| {
            let previous = last_of_source.insert(packet.source_name(), i)?;
            let previous = &packets[previous];
            let (located, horizontal) = match (previous.fix(), packet.fix()) {
                (Some(from), Some(to)) => (true, haversine_distance(from, to)),
                _ => (false, 0.0),
            };
            let vertical = match (previous.altitude(), packet.altitude()) {
                (Some(from), Some(to)) => Some(to - from),
                _ => None,
            };
            Some(Step {
                located,
                horizontal,
                vertical,
                millis: packet.timestamp_ms.saturating_sub(previous.timestamp_ms),
            })
        })
        .collect()
}

/// Attach per-packet 2D/3D/vertical speed (km/h)
///
/// A packet gets a speed only when it and its predecessor both carry a
/// valid fix; existing speeds are cleared otherwise.
pub fn annotate_speeds(packets: &mut [CanonicalPacket]) {
    let steps = steps(packets);
    for (packet, step) in packets.iter_mut().zip(steps) {
        packet.speed = step.filter(|s| s.located).map(|s| PacketSpeed {
            two_d: speed_kmh(s.horizontal, s.millis),
            three_d: speed_kmh(s.three_d(), s.millis),
            vertical: s.vertical.map(|dz| speed_kmh(dz, s.millis)),
        });
    }
}

/// Recorded HOME tuples first, the first valid fix otherwise; one per source
fn home_points(packets: &[CanonicalPacket]) -> Vec<HomePoint> {
    let mut order: Vec<Option<&str>> = Vec::new();
    let mut found: HashMap<Option<&str>, HomePoint> = HashMap::new();

    for packet in packets {
        let source = packet.source_name();
        if !order.contains(&source) {
            order.push(source);
        }
        let current = found.get(&source).map(|h| h.source);
        if let Some(home) = packet.home.filter(GeoPoint::is_valid) {
            if current != Some(HomeSource::Recorded) {
                found.insert(
                    source,
                    HomePoint {
                        point: home,
                        source: HomeSource::Recorded,
                        session: source.map(str::to_string),
                    },
                );
            }
        } else if current.is_none() {
            if let Some(fix) = packet.fix() {
                found.insert(
                    source,
                    HomePoint {
                        point: fix,
                        source: HomeSource::FirstFix,
                        session: source.map(str::to_string),
                    },
                );
            }
        }
    }

    order
        .into_iter()
        .filter_map(|source| found.remove(&source))
        .collect()
}

/// Stats over the numeric values of non-canonical fields, first-seen order
fn extra_stats(packets: &[CanonicalPacket]) -> Vec<(String, FieldStats)> {
    let mut columns: Vec<(String, Vec<f64>)> = Vec::new();
    for packet in packets {
        for (key, value) in packet.extra.iter() {
            let FieldValue::Number(number) = value else {
                continue;
            };
            match columns.iter_mut().find(|(k, _)| k == key) {
                Some((_, values)) => values.push(*number),
                None => columns.push((key.to_string(), vec![*number])),
            }
        }
    }
    columns
        .into_iter()
        .filter_map(|(key, values)| FieldStats::from_values(values).map(|s| (key, s)))
        .collect()
}

fn speed_stats(
    steps: &[Option<Step>],
    distance_2d: f64,
    distance_3d: f64,
    duration_ms: i64,
) -> SpeedStats {
    let timed: Vec<&Step> = steps.iter().flatten().filter(|s| s.millis > 0).collect();

    let with_avg = |values: Vec<f64>, avg: f64| {
        let spread = FieldStats::from_values(values).unwrap_or(FieldStats {
            min: avg,
            max: avg,
            avg,
        });
        FieldStats { avg, ..spread }
    };

    let located: Vec<&&Step> = timed.iter().filter(|s| s.located).collect();
    let two_d = with_avg(
        located.iter().map(|s| speed_kmh(s.horizontal, s.millis)).collect(),
        speed_kmh(distance_2d, duration_ms),
    );
    let three_d = with_avg(
        located.iter().map(|s| speed_kmh(s.three_d(), s.millis)).collect(),
        speed_kmh(distance_3d, duration_ms),
    );
    let vertical = FieldStats::from_values(
        timed
            .iter()
            .filter_map(|s| s.vertical.map(|dz| speed_kmh(dz, s.millis))),
    );

    SpeedStats {
        two_d,
        three_d,
        vertical,
    }
}

/// Compute the summary of a packet sequence
///
/// GPS-derived values stay `None` when no packet carries a valid fix. A
/// step that lacks a fix on either end adds no horizontal distance.
pub fn compute_stats(packets: &[CanonicalPacket], properties: &FieldMap) -> StatsSummary {
    let duration_ms = match (packets.first(), packets.last()) {
        (Some(first), Some(last)) => last.timestamp_ms.saturating_sub(first.timestamp_ms).max(0),
        _ => 0,
    };

    let fields = Field::ALL
        .iter()
        .filter_map(|&field| {
            FieldStats::from_values(packets.iter().filter_map(|p| field.value(p)))
                .map(|stats| (field, stats))
        })
        .collect();

    let mut summary = StatsSummary {
        date: packets.iter().find_map(|p| p.date),
        duration_ms,
        fields,
        extra: extra_stats(packets),
        home: home_points(packets),
        properties: properties.clone(),
        ..Default::default()
    };

    if packets.iter().any(|p| p.fix().is_some()) {
        let steps = steps(packets);
        let distance_2d: f64 = steps.iter().flatten().map(|s| s.horizontal).sum();
        let distance_3d: f64 = steps
            .iter()
            .flatten()
            .filter(|s| s.located)
            .map(Step::three_d)
            .sum();
        summary.speed = Some(speed_stats(&steps, distance_2d, distance_3d, duration_ms));
        summary.distance_2d = Some(distance_2d);
        summary.distance_3d = Some(distance_3d);
    }

    summary
}
