//! Time-series reduction filters
//!
//! Resampling keeps one packet per fixed time bucket; smoothing applies a
//! centred moving average to coordinates and altitudes. Both return new
//! sequences and leave discrete fields (satellites, exposure) untouched.
//!
//! # Usage
//!
//! These are driven by the `ViewOptions` of a `Dataset`; a value of 0
//! disables either filter.

use crate::types::{CanonicalPacket, GeoPoint};

/// Reduce a sequence to the first packet of each `millis_per_sample` bucket
///
/// Buckets start at the first packet's timestamp. The first and the last
/// packets are always kept so the result spans the original duration.
/// Packets whose timestamp went backwards never open a new bucket.
///
/// # Arguments
/// * `packets` - Time-ordered packets of one session
/// * `millis_per_sample` - Bucket width; 0 returns the input unchanged
pub fn resample(packets: &[CanonicalPacket], millis_per_sample: u64) -> Vec<CanonicalPacket> {
    let (Some(first), Some(last)) = (packets.first(), packets.last()) else {
        return Vec::new();
    };
    if millis_per_sample == 0 || packets.len() <= 2 {
        return packets.to_vec();
    }

    let width = i64::try_from(millis_per_sample).unwrap_or(i64::MAX);
    let start = first.timestamp_ms;
    let mut kept = vec![first.clone()];
    let mut current_bucket = 0i64;

    for packet in &packets[1..packets.len() - 1] {
        let bucket = packet.timestamp_ms.saturating_sub(start).div_euclid(width);
        if bucket > current_bucket {
            kept.push(packet.clone());
            current_bucket = bucket;
        }
    }

    kept.push(last.clone());
    kept
}

/// Mean of the values defined inside the window
fn window_mean<F>(window: &[CanonicalPacket], value: F) -> Option<f64>
where
    F: Fn(&CanonicalPacket) -> Option<f64>,
{
    let (sum, count) = window
        .iter()
        .filter_map(value)
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Centred moving average over `2 * factor + 1` packets
///
/// The window narrows at both ends instead of padding. Values absent in a
/// packet stay absent; absent neighbours are left out of the mean.
pub fn smooth(packets: &[CanonicalPacket], factor: usize) -> Vec<CanonicalPacket> {
    if factor == 0 || packets.len() < 2 {
        return packets.to_vec();
    }

    (0..packets.len())
        .map(|i| {
            let lo = i.saturating_sub(factor);
            let hi = (i + factor).min(packets.len() - 1);
            let window = &packets[lo..=hi];
            let mut packet = packets[i].clone();

            if packet.fix().is_some() {
                let latitude = window_mean(window, |p| p.fix().map(|f| f.latitude));
                let longitude = window_mean(window, |p| p.fix().map(|f| f.longitude));
                if let (Some(latitude), Some(longitude)) = (latitude, longitude) {
                    packet.position = Some(GeoPoint::new(latitude, longitude));
                }
            }
            if packet.altitude_barometer.is_some() {
                packet.altitude_barometer = window_mean(window, |p| p.altitude_barometer);
            }
            if packet.altitude_gps.is_some() {
                packet.altitude_gps = window_mean(window, |p| p.altitude_gps);
            }
            packet
        })
        .collect()
}
