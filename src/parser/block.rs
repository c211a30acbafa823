//! SRT container splitting
//!
//! Turns subtitle text into per-frame blocks: sequence number, timecode and
//! the caption body with markup removed.

use crate::parser::cached_regex;
use regex::Regex;
use std::sync::OnceLock;

static TIMECODE: OnceLock<Regex> = OnceLock::new();
static MARKUP: OnceLock<Regex> = OnceLock::new();

/// Caption start/end relative to the start of the video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timecode {
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Unparsed text block for one video frame
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// 1-based position of the block in the file
    pub ordinal: usize,
    /// SRT sequence number, or `ordinal` when the block has none
    pub index: usize,
    pub timecode: Option<Timecode>,
    /// Timecode line as written
    pub timecode_text: Option<String>,
    /// Caption body, one trimmed line per source line, markup stripped
    pub body: String,
}

/// Parse `HH:MM:SS,mmm --> HH:MM:SS,mmm`
pub fn parse_timecode(line: &str) -> Option<Timecode> {
    let re = cached_regex(
        &TIMECODE,
        r"(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})",
    );
    let caps = re.captures(line)?;
    let field = |i: usize| -> Option<i64> { caps.get(i)?.as_str().parse().ok() };

    let start = field(1)? * 3_600_000 + field(2)? * 60_000 + field(3)? * 1000 + field(4)?;
    let end = field(5)? * 3_600_000 + field(6)? * 60_000 + field(7)? * 1000 + field(8)?;

    Some(Timecode {
        start_ms: start,
        end_ms: end,
    })
}

fn strip_markup(line: &str) -> String {
    cached_regex(&MARKUP, r"<[^>]*>")
        .replace_all(line, "")
        .trim()
        .to_string()
}

/// Split SRT text into frame blocks separated by blank lines
pub fn split_frames(text: &str) -> Vec<RawFrame> {
    let text = text.trim_start_matches('\u{feff}');
    let mut frames = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !block.is_empty() {
                frames.push(build_frame(&block, frames.len() + 1));
                block.clear();
            }
        } else {
            block.push(line);
        }
    }
    if !block.is_empty() {
        frames.push(build_frame(&block, frames.len() + 1));
    }

    frames
}

fn build_frame(lines: &[&str], ordinal: usize) -> RawFrame {
    let mut rest = lines;

    let index = match rest.first().and_then(|l| l.trim().parse::<usize>().ok()) {
        Some(index) => {
            rest = &rest[1..];
            index
        }
        None => ordinal,
    };

    let (timecode, timecode_text) = match rest.first().and_then(|l| parse_timecode(l)) {
        Some(tc) => {
            let text = rest[0].trim().to_string();
            rest = &rest[1..];
            (Some(tc), Some(text))
        }
        None => (None, None),
    };

    let body = rest
        .iter()
        .map(|l| strip_markup(l))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    RawFrame {
        ordinal,
        index,
        timecode,
        timecode_text,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timecode() {
        let tc = parse_timecode("00:01:02,033 --> 00:01:02,066").unwrap();
        assert_eq!(tc.start_ms, 62_033);
        assert_eq!(tc.end_ms, 62_066);
        assert!(parse_timecode("not a timecode").is_none());
    }

    #[test]
    fn test_split_frames_handles_crlf_and_markup() {
        let text = "1\r\n00:00:00,000 --> 00:00:00,033\r\n<font size=\"36\">SrtCnt : 1, DiffTime : 33ms\r\n[iso : 100] </font>\r\n\r\n2\r\n00:00:00,033 --> 00:00:00,066\r\n[iso : 200]\r\n";
        let frames = split_frames(text);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].index, 1);
        assert_eq!(frames[0].body, "SrtCnt : 1, DiffTime : 33ms\n[iso : 100]");
        assert_eq!(frames[1].timecode.unwrap().start_ms, 33);
        assert_eq!(
            frames[1].timecode_text.as_deref(),
            Some("00:00:00,033 --> 00:00:00,066")
        );
    }

    #[test]
    fn test_block_without_sequence_number_uses_ordinal() {
        let frames = split_frames("00:00:01,000 --> 00:00:02,000\nISO:100\n\n\n\nHB:1.0");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].index, 1);
        assert!(frames[0].timecode.is_some());
        assert_eq!(frames[1].index, 2);
        assert!(frames[1].timecode.is_none());
        assert_eq!(frames[1].body, "HB:1.0");
    }
}
