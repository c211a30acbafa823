//! Layout detection
//!
//! Classifies an input by testing the earliest recognizable frame body
//! against each layout's fingerprint in [`Layout::PRIORITY`] order, so a
//! superset layout is never taken for a narrower one.

use crate::error::{Result, SrtError};
use crate::parser::block::split_frames;
use crate::parser::cached_regex;
use crate::types::Layout;
use log::debug;
use regex::Regex;
use std::sync::OnceLock;

/// Number of leading frame blocks examined before giving up
const DETECTION_WINDOW: usize = 8;

static RTK_TUPLE: OnceLock<Regex> = OnceLock::new();
static BRACKET_GPS: OnceLock<Regex> = OnceLock::new();
static BRACKET_ISO: OnceLock<Regex> = OnceLock::new();
static APERTURE_SLASH: OnceLock<Regex> = OnceLock::new();
static SHUTTER_SS: OnceLock<Regex> = OnceLock::new();
static HOME_TUPLE: OnceLock<Regex> = OnceLock::new();
static HB_FIELD: OnceLock<Regex> = OnceLock::new();

/// What kind of payload an input holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Srt(Layout),
    /// Already-normalized packets (JSON)
    Prepared,
}

impl Layout {
    /// Test a single frame body against this layout's fingerprint
    pub fn matches(self, body: &str) -> bool {
        match self {
            Layout::Rtk => cached_regex(&RTK_TUPLE, r"\bRTK\s*\(").is_match(body),
            Layout::Mavic2 => cached_regex(
                &BRACKET_GPS,
                r"(?i)\[\s*(latitude|longt?itude|rel_alt|abs_alt)\s*:",
            )
            .is_match(body),
            Layout::MavicAir => cached_regex(&BRACKET_ISO, r"(?i)\[\s*iso\s*:").is_match(body),
            Layout::Phantom4Pro => {
                cached_regex(&APERTURE_SLASH, r"\bF/\s*\d").is_match(body)
                    && cached_regex(&SHUTTER_SS, r"\bSS\s+\d").is_match(body)
            }
            Layout::MavicPro => {
                body.contains("BAROMETER")
                    && cached_regex(&HOME_TUPLE, r"\bHOME\s*\(").is_match(body)
            }
            Layout::MavicProBuggy => body.contains("BAROMETER"),
            Layout::Legacy => cached_regex(&HB_FIELD, r"\bHB\s*:").is_match(body),
        }
    }

    /// First layout in priority order whose fingerprint matches `body`
    pub fn classify(body: &str) -> Option<Layout> {
        Layout::PRIORITY.into_iter().find(|layout| layout.matches(body))
    }
}

/// Guess a layout from a file name; never used to override the content
pub fn layout_hint(file_name: &str) -> Option<Layout> {
    let name = file_name.to_ascii_lowercase();
    if name.contains("rtk") {
        Some(Layout::Rtk)
    } else if name.contains("buggy") {
        Some(Layout::MavicProBuggy)
    } else if name.contains("air") {
        Some(Layout::MavicAir)
    } else if name.contains("p4p") || name.contains("phantom") {
        Some(Layout::Phantom4Pro)
    } else if name.contains("mavic_2") || name.contains("m2") {
        Some(Layout::Mavic2)
    } else if name.contains("old") {
        Some(Layout::Legacy)
    } else if name.contains("mavic_pro") {
        Some(Layout::MavicPro)
    } else {
        None
    }
}

fn looks_like_json(text: &str) -> bool {
    let text = text.trim_start_matches('\u{feff}').trim_start();
    if text.starts_with('{') {
        return true;
    }
    text.strip_prefix('[')
        .map(|rest| {
            let rest = rest.trim_start();
            rest.starts_with('{') || rest.starts_with(']')
        })
        .unwrap_or(false)
}

/// Classify a raw input
pub fn detect_format(text: &str, file_name: &str) -> Result<Format> {
    if looks_like_json(text) {
        debug!("{}: input looks like a prepared payload", file_name);
        return Ok(Format::Prepared);
    }

    let detected = split_frames(text)
        .iter()
        .filter(|frame| !frame.body.is_empty())
        .take(DETECTION_WINDOW)
        .find_map(|frame| Layout::classify(&frame.body));

    let Some(layout) = detected else {
        return Err(SrtError::UnrecognizedFormat {
            name: file_name.to_string(),
        });
    };

    match layout_hint(file_name) {
        Some(hint) if hint != layout => debug!(
            "{}: file name suggests {}, content says {}",
            file_name, hint, layout
        ),
        _ => debug!("{}: detected {} layout", file_name, layout),
    }

    Ok(Format::Srt(layout))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAVIC_PRO: &str = "HOME(149.0251,-20.2532) 2017.08.05 14:11:51\nGPS(149.0251,-20.2533,16) BAROMETER:1.9\nISO:100 Shutter:60 EV:0 Fnum:F2.2";
    const BUGGY: &str = "GPS(149.0251,-20.2533,17)BAROMETER:1.5 2017.08.06 10:00:01\nISO:100 Shutter:120 EV:0 Fnum:F2.2";
    const LEGACY: &str = "HOME(149.0251,-20.2532) 2017.08.05 14:11:51\nGPS(149.0251,-20.2533,16) HB:1.9 HS:0.0\nISO:100 Shutter:60 EV:0 F-Num:2.8";
    const P4P: &str = "2018-05-13 18:14:15\nF/3.2, SS 1000, ISO 100, EV 0, GPS (2.1578, 41.3880, 18), D 0.00m, H 0.00m, H.S 0.00m/s, V.S 0.00m/s";
    const RTK: &str = "2019-04-22 10:27:49.000\nF/5.6, SS 1000.0, ISO 100, EV 0, GPS (116.3102, 39.9786, 15), RTK (116.310234, 39.978612, 47.123), H 2.00m, F.PRY (-2.3°, 1.4°, 120.5°)";
    const MAVIC_2: &str = "SrtCnt : 1, DiffTime : 33ms\n2018-09-01 18:47:19,186,839\n[iso : 100] [shutter : 1/500.0] [fnum : 220] [ev : 0] [latitude : 41.388] [longtitude : 2.158] [altitude: 17.2]";
    const MAVIC_AIR: &str = "SrtCnt : 1, DiffTime : 33ms\n2018-06-10 10:00:00,000,000\n[iso : 100] [shutter : 1/60.0] [fnum : 280] [ev : -0.3]";

    #[test]
    fn test_each_layout_fingerprint() {
        assert_eq!(Layout::classify(MAVIC_PRO), Some(Layout::MavicPro));
        assert_eq!(Layout::classify(BUGGY), Some(Layout::MavicProBuggy));
        assert_eq!(Layout::classify(LEGACY), Some(Layout::Legacy));
        assert_eq!(Layout::classify(P4P), Some(Layout::Phantom4Pro));
        assert_eq!(Layout::classify(RTK), Some(Layout::Rtk));
        assert_eq!(Layout::classify(MAVIC_2), Some(Layout::Mavic2));
        assert_eq!(Layout::classify(MAVIC_AIR), Some(Layout::MavicAir));
        assert_eq!(Layout::classify("hello world"), None);
    }

    #[test]
    fn test_rtk_is_not_mistaken_for_phantom_4_pro() {
        // RTK frames carry every Phantom 4 Pro marker as well
        assert!(Layout::Phantom4Pro.matches(RTK));
        assert_eq!(Layout::classify(RTK), Some(Layout::Rtk));
    }

    #[test]
    fn test_detection_skips_leading_malformed_blocks() {
        let text = format!(
            "1\n00:00:00,000 --> 00:00:01,000\n\n2\n00:00:01,000 --> 00:00:02,000\n###\n\n3\n00:00:02,000 --> 00:00:03,000\n{}\n",
            MAVIC_PRO
        );
        assert_eq!(
            detect_format(&text, "flight.SRT"),
            Ok(Format::Srt(Layout::MavicPro))
        );
    }

    #[test]
    fn test_file_name_never_overrides_content() {
        let text = format!("1\n00:00:00,000 --> 00:00:01,000\n{}\n", LEGACY);
        assert_eq!(
            detect_format(&text, "p4_rtk.SRT"),
            Ok(Format::Srt(Layout::Legacy))
        );
    }

    #[test]
    fn test_unrecognized_and_prepared_inputs() {
        assert_eq!(
            detect_format("1\n00:00:00,000 --> 00:00:01,000\nnothing here\n", "x.SRT"),
            Err(SrtError::UnrecognizedFormat {
                name: "x.SRT".to_string()
            })
        );
        assert_eq!(
            detect_format("  [{\"frame\": 1}]", "prepared.json"),
            Ok(Format::Prepared)
        );
        assert_eq!(
            detect_format("{\"packets\": []}", "prepared.json"),
            Ok(Format::Prepared)
        );
    }

    #[test]
    fn test_layout_hint() {
        assert_eq!(layout_hint("p4_rtk.SRT"), Some(Layout::Rtk));
        assert_eq!(layout_hint("mavic_pro_buggy.SRT"), Some(Layout::MavicProBuggy));
        assert_eq!(layout_hint("DJI_0001.SRT"), None);
    }
}
