//! Session building: detect, split, extract and normalize one input.

use crate::error::{Result, SrtError};
use crate::parser::block::split_frames;
use crate::parser::extract::extract_fields;
use crate::parser::layout::{detect_format, Format};
use crate::parser::normalize::{normalize_frame, relative_ms};
use crate::parser::prepared::session_from_prepared_text;
use crate::types::{CanonicalPacket, Defect, Layout, Session};
use log::{debug, info, warn};
use std::sync::Arc;

/// Build a session from one raw input
///
/// Text that looks like a prepared JSON payload is routed to the prepared
/// path; everything else must be SRT in a known layout.
pub fn build_session(name: &str, text: &str) -> Result<Session> {
    match detect_format(text, name)? {
        Format::Srt(layout) => build_srt_session(name, layout, text),
        Format::Prepared => session_from_prepared_text(name, text),
    }
}

/// Put frames without a date on the clock of the dated ones
///
/// An undated frame gets the timestamp of the nearest preceding dated frame
/// (the first one for leading frames) shifted by the video-clock distance
/// between the two. Returns the number of frames moved; a session without
/// any date keeps its relative timestamps.
fn anchor_undated(packets: &mut [CanonicalPacket], relative: &[i64]) -> usize {
    let first_dated = packets
        .iter()
        .zip(relative)
        .find(|(packet, _)| packet.date.is_some())
        .map(|(packet, &at)| (packet.timestamp_ms, at));
    let Some(mut anchor) = first_dated else {
        return 0;
    };

    let mut moved = 0;
    for (packet, &at) in packets.iter_mut().zip(relative) {
        if packet.date.is_some() {
            anchor = (packet.timestamp_ms, at);
        } else {
            packet.timestamp_ms = anchor.0.saturating_add(at.saturating_sub(anchor.1));
            moved += 1;
        }
    }
    moved
}

/// One defect per packet whose timestamp went backwards
fn regressions(packets: &[CanonicalPacket]) -> Vec<Defect> {
    packets
        .windows(2)
        .filter(|pair| pair[1].timestamp_ms < pair[0].timestamp_ms)
        .map(|pair| Defect::regression(pair[1].frame, pair[0].timestamp_ms, pair[1].timestamp_ms))
        .collect()
}

/// Build a session from SRT text whose layout is already known
///
/// Malformed frames are skipped and recorded. Fails only when no frame
/// survives.
pub fn build_srt_session(name: &str, layout: Layout, text: &str) -> Result<Session> {
    let source: Arc<str> = Arc::from(name);
    let mut packets = Vec::new();
    let mut raw = Vec::new();
    let mut relative = Vec::new();
    let mut defects = Vec::new();

    let frames = split_frames(text);
    debug!("{}: {} frame blocks", name, frames.len());

    for frame in &frames {
        let fields = match extract_fields(layout, frame) {
            Ok(fields) => fields,
            Err(reason) => {
                defects.push(Defect::frame(Some(frame.index), reason));
                continue;
            }
        };

        let mut normalized = normalize_frame(layout, frame, fields);
        defects.append(&mut normalized.defects);

        normalized.packet.source = Some(Arc::clone(&source));
        packets.push(normalized.packet);
        raw.push(normalized.raw);
        relative.push(relative_ms(layout, frame));
    }

    let anchored = anchor_undated(&mut packets, &relative);
    if anchored > 0 {
        debug!("{}: {} undated frames placed on the date clock", name, anchored);
    }
    defects.extend(regressions(&packets));

    if !defects.is_empty() {
        warn!("{}: {} defects recorded", name, defects.len());
        for defect in &defects {
            debug!("{}: {}", name, defect);
        }
    }

    if packets.is_empty() {
        return Err(SrtError::EmptySession {
            name: name.to_string(),
            defects: defects.len(),
        });
    }

    info!(
        "{}: {} packets from {} frames ({})",
        name,
        packets.len(),
        frames.len(),
        layout
    );

    Ok(Session {
        name: name.to_string(),
        layout: Some(layout),
        packets,
        raw,
        defects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DefectKind;

    const BUGGY: &str = "1
00:00:00,000 --> 00:00:01,000
GPS(149.0251,-20.2533,17)BAROMETER:1.5 2017.08.06 10:00:01
ISO:100 Shutter:120 EV:0 Fnum:F2.2

2
00:00:01,000 --> 00:00:02,000
@@@ ###

3
00:00:02,000 --> 00:00:03,000
GPS(149.0252,-20.2533,18)BAROMETER:1.7 2017.08.06 10:00:00
ISO:100 Shutter:120 EV:0 Fnum:F2.2
";

    #[test]
    fn test_malformed_frame_is_skipped_not_fatal() {
        let session = build_session("buggy.SRT", BUGGY).unwrap();

        assert_eq!(session.layout, Some(Layout::MavicProBuggy));
        assert_eq!(session.packets.len(), 2);
        assert_eq!(session.raw.len(), 2);
        assert_eq!(session.skipped_frames(), 1);
        assert_eq!(session.defects[0].frame, Some(2));
        assert_eq!(session.packets[1].frame, 3);
        assert_eq!(session.packets[0].source_name(), Some("buggy.SRT"));
    }

    #[test]
    fn test_regression_is_reported_and_order_kept() {
        let session = build_session("buggy.SRT", BUGGY).unwrap();

        let regression = session
            .defects
            .iter()
            .find(|d| matches!(d.kind, DefectKind::TimestampRegression { .. }))
            .unwrap();
        assert_eq!(regression.frame, Some(3));
        assert!(session.packets[1].timestamp_ms < session.packets[0].timestamp_ms);
    }

    #[test]
    fn test_undated_frames_follow_the_date_clock() {
        let text = "1
00:00:00,000 --> 00:00:01,000
GPS(149.0251,-20.2533,17)BAROMETER:1.5

2
00:00:01,000 --> 00:00:02,000
GPS(149.0252,-20.2533,18)BAROMETER:1.7 2017.08.06 10:00:01

3
00:00:02,000 --> 00:00:03,000
GPS(149.0253,-20.2533,18)BAROMETER:1.9 2017.08.06 10:00:02

4
00:00:03,500 --> 00:00:04,000
GPS(149.0254,-20.2533,18)BAROMETER:2.0
";
        let session = build_session("undated.SRT", text).unwrap();
        let start = crate::conversion::build_date(2017, 8, 6, 10, 0, 0, 0)
            .unwrap()
            .timestamp_millis();

        let timestamps: Vec<i64> = session.packets.iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(
            timestamps,
            vec![start, start + 1000, start + 2000, start + 3500]
        );
        assert!(session.packets[3].date.is_none());
        assert!(session.defects.is_empty(), "{:?}", session.defects);
        assert_eq!(session.duration_ms(), 3500);
    }

    #[test]
    fn test_undated_session_keeps_video_clock() {
        let text = "1
00:00:00,000 --> 00:00:01,000
GPS(149.0251,-20.2533,17)BAROMETER:1.5

2
00:00:01,000 --> 00:00:02,000
GPS(149.0252,-20.2533,18)BAROMETER:1.7
";
        let session = build_session("clock.SRT", text).unwrap();
        let timestamps: Vec<i64> = session.packets.iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(timestamps, vec![0, 1000]);
    }

    #[test]
    fn test_no_usable_frames_is_empty_session() {
        let text = "1\n00:00:00,000 --> 00:00:01,000\nBAROMETER:??\n\n2\n00:00:01,000 --> 00:00:02,000\n\n";
        match build_session("empty.SRT", text) {
            Err(SrtError::EmptySession { name, defects }) => {
                assert_eq!(name, "empty.SRT");
                assert_eq!(defects, 2);
            }
            other => panic!("expected EmptySession, got {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_input() {
        assert_eq!(
            build_session("notes.txt", "just some text"),
            Err(SrtError::UnrecognizedFormat {
                name: "notes.txt".to_string()
            })
        );
    }
}
