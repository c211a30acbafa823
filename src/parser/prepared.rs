//! Prepared payloads: packets that were normalized elsewhere
//!
//! These skip detection, extraction and normalization. Only the minimum
//! canonical content is checked: at least one packet, each with a
//! timestamp.

use crate::error::{Result, SrtError};
use crate::types::{CanonicalPacket, Defect, Session};
use log::info;
use std::sync::Arc;

/// Wrap already-normalized packets in a session
///
/// Frame numbers of 0 are replaced by the packet's 1-based position.
pub fn session_from_prepared(name: &str, packets: Vec<CanonicalPacket>) -> Result<Session> {
    if packets.is_empty() {
        return Err(SrtError::InvalidPrepared {
            name: name.to_string(),
            reason: "no packets".to_string(),
        });
    }

    let source: Arc<str> = Arc::from(name);
    let mut defects = Vec::new();
    let mut previous_ms: Option<i64> = None;

    let packets: Vec<CanonicalPacket> = packets
        .into_iter()
        .enumerate()
        .map(|(i, mut packet)| {
            if packet.frame == 0 {
                packet.frame = i + 1;
            }
            if let Some(previous) = previous_ms {
                if packet.timestamp_ms < previous {
                    defects.push(Defect::regression(packet.frame, previous, packet.timestamp_ms));
                }
            }
            previous_ms = Some(packet.timestamp_ms);
            packet.source = Some(Arc::clone(&source));
            packet
        })
        .collect();

    let raw = packets.iter().map(|p| p.extra.clone()).collect();
    info!("{}: {} prepared packets", name, packets.len());

    Ok(Session {
        name: name.to_string(),
        layout: None,
        packets,
        raw,
        defects,
    })
}

#[cfg(feature = "json")]
fn parse_packets(name: &str, json: &str) -> Result<Vec<CanonicalPacket>> {
    use serde_json::Value;

    let invalid = |reason: String| SrtError::InvalidPrepared {
        name: name.to_string(),
        reason,
    };

    let value: Value = serde_json::from_str(json).map_err(|e| invalid(e.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("packets") {
            Some(Value::Array(items)) => items,
            _ => return Err(invalid("expected a \"packets\" array".to_string())),
        },
        _ => return Err(invalid("expected a packet array".to_string())),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            if item.get("timestamp_ms").is_none() {
                return Err(invalid(format!("packet {} has no timestamp_ms", i + 1)));
            }
            serde_json::from_value(item).map_err(|e| invalid(format!("packet {}: {}", i + 1, e)))
        })
        .collect()
}

/// Build a session from a prepared JSON payload
///
/// Accepts either a packet array or an object with a `packets` array.
#[cfg(feature = "json")]
pub fn session_from_prepared_json(name: &str, json: &str) -> Result<Session> {
    let packets = parse_packets(name, json.trim_start_matches('\u{feff}'))?;
    session_from_prepared(name, packets)
}

pub(crate) fn session_from_prepared_text(name: &str, text: &str) -> Result<Session> {
    #[cfg(feature = "json")]
    {
        session_from_prepared_json(name, text)
    }
    #[cfg(not(feature = "json"))]
    {
        let _ = text;
        Err(SrtError::InvalidPrepared {
            name: name.to_string(),
            reason: "JSON support is not enabled".to_string(),
        })
    }
}
