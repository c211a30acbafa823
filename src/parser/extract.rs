//! Field extraction
//!
//! Pulls raw `key -> text` pairs out of one frame body using the token rules
//! of the frame's layout. Keys are upper-cased with `-` and `.` mapped to
//! `_`; values are kept as written. The date is emitted under `DATE` in the
//! normalized `YYYY-MM-DD HH:MM:SS.mmm` form whatever the source notation.

use crate::parser::block::RawFrame;
use crate::parser::cached_regex;
use crate::types::{Layout, TokenStyle};
use log::debug;
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

static DATE: OnceLock<Regex> = OnceLock::new();
static FRAME_COUNTER: OnceLock<Regex> = OnceLock::new();
static DIFF_TIME: OnceLock<Regex> = OnceLock::new();
static BRACKET_GROUP: OnceLock<Regex> = OnceLock::new();
static BRACKET_PAIR: OnceLock<Regex> = OnceLock::new();
static TUPLE: OnceLock<Regex> = OnceLock::new();
static COLON_PAIR: OnceLock<Regex> = OnceLock::new();
static APERTURE_ITEM: OnceLock<Regex> = OnceLock::new();
static LIST_ITEM: OnceLock<Regex> = OnceLock::new();

/// Raw fields of one frame in order of appearance
pub type RawFields = Vec<(String, String)>;

/// Canonical spelling of a raw key
pub fn normalize_key(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| match c {
            '-' | '.' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Working copy of a body; consumed spans are blanked so later patterns
/// cannot match inside them while positions stay stable.
struct Scan {
    text: String,
    found: Vec<(usize, String, String)>,
}

impl Scan {
    fn new(body: &str) -> Self {
        Self {
            text: body.to_string(),
            found: Vec::new(),
        }
    }

    fn push(&mut self, at: usize, key: &str, value: &str) {
        self.found
            .push((at, normalize_key(key), value.trim().to_string()));
    }

    fn consume(&mut self, spans: Vec<Range<usize>>) {
        for span in spans {
            let blank = " ".repeat(span.len());
            self.text.replace_range(span, &blank);
        }
    }

    fn into_fields(mut self) -> RawFields {
        self.found.sort_by_key(|(at, _, _)| *at);
        self.found.into_iter().map(|(_, k, v)| (k, v)).collect()
    }
}

fn extract_date(scan: &mut Scan) {
    let re = cached_regex(
        &DATE,
        r"(\d{4})[-./](\d{2})[-./](\d{2})[ T]+(\d{1,2}):(\d{2}):(\d{2})(?:[.,:](\d{1,3})\d*)?(?:[.,]\d+)*",
    );
    let Some(caps) = re.captures(&scan.text) else {
        return;
    };
    let Some(whole) = caps.get(0) else {
        return;
    };
    let part = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or("0");
    let millis = caps.get(7).map(|m| m.as_str()).unwrap_or("0");
    let value = format!(
        "{}-{}-{} {:0>2}:{}:{}.{:0<3}",
        part(1),
        part(2),
        part(3),
        part(4),
        part(5),
        part(6),
        millis
    );
    let span = whole.range();
    scan.push(span.start, "DATE", &value);
    scan.consume(vec![span]);
}

/// `KEY(a,b,c)` and `KEY (a, b, c)` tuples
fn extract_tuples(scan: &mut Scan) {
    let re = cached_regex(&TUPLE, r"([A-Za-z][A-Za-z_.]*)\s*\(([^)]*)\)");
    let mut spans = Vec::new();
    let mut found = Vec::new();
    for caps in re.captures_iter(&scan.text) {
        let (Some(whole), Some(key), Some(value)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        found.push((whole.start(), key.as_str().to_string(), value.as_str().to_string()));
        spans.push(whole.range());
    }
    for (at, key, value) in found {
        scan.push(at, &key, &value);
    }
    scan.consume(spans);
}

fn extract_bracketed(scan: &mut Scan) {
    let counter = cached_regex(&FRAME_COUNTER, r"(?i)\b(SrtCnt|FrameCnt)\s*:\s*(\d+)");
    let diff = cached_regex(&DIFF_TIME, r"(?i)\b(DiffTime)\s*:\s*(\d+\s*ms)");
    let group = cached_regex(&BRACKET_GROUP, r"\[([^\]]*)\]");
    let pair = cached_regex(&BRACKET_PAIR, r"([A-Za-z_][A-Za-z0-9_]*)\s*:\s*([^\s,\]]+)");

    let mut found = Vec::new();
    for re in [counter, diff] {
        if let Some(caps) = re.captures(&scan.text) {
            if let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) {
                found.push((key.start(), key.as_str().to_string(), value.as_str().to_string()));
            }
        }
    }
    for group_caps in group.captures_iter(&scan.text) {
        let Some(inner) = group_caps.get(1) else {
            continue;
        };
        for caps in pair.captures_iter(inner.as_str()) {
            if let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) {
                found.push((
                    inner.start() + key.start(),
                    key.as_str().to_string(),
                    value.as_str().to_string(),
                ));
            }
        }
    }
    for (at, key, value) in found {
        scan.push(at, &key, &value);
    }
}

fn extract_colon_pairs(scan: &mut Scan) {
    // Values are fractions, numbers (optionally F-prefixed) or words, which
    // lets glued tokens like `1.5ISO:100` split at the next key.
    let re = cached_regex(
        &COLON_PAIR,
        r"([A-Za-z][A-Za-z0-9_\-]*)\s*:\s*(\d+/\d+(?:\.\d+)?|[Ff]?[-+]?\d+(?:\.\d+)?|[A-Za-z_]+)",
    );
    let found: Vec<(usize, String, String)> = re
        .captures_iter(&scan.text)
        .filter_map(|caps| {
            let key = caps.get(1)?;
            let value = caps.get(2)?;
            Some((key.start(), key.as_str().to_string(), value.as_str().to_string()))
        })
        .collect();
    for (at, key, value) in found {
        scan.push(at, &key, &value);
    }
}

fn extract_list_items(scan: &mut Scan) {
    let aperture = cached_regex(&APERTURE_ITEM, r"^F\s*/\s*(\S+)$");
    let item = cached_regex(&LIST_ITEM, r"^([A-Za-z][A-Za-z0-9_.]*)\s*[:\s]\s*(\S.*)$");

    let mut found = Vec::new();
    let mut offset = 0;
    for piece in scan.text.split(|c: char| c == ',' || c == '\n') {
        let at = offset;
        offset += piece.len() + 1;
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        if let Some(value) = aperture.captures(piece).and_then(|c| c.get(1)) {
            found.push((at, "F".to_string(), value.as_str().to_string()));
        } else if let Some(caps) = item.captures(piece) {
            if let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) {
                found.push((at, key.as_str().to_string(), value.as_str().to_string()));
            }
        } else {
            debug!("ignoring list item '{}'", piece);
        }
    }
    for (at, key, value) in found {
        scan.push(at, &key, &value);
    }
}

/// Extract the raw fields of one frame
///
/// Returns the reason on failure; the caller records it as a frame defect.
pub fn extract_fields(layout: Layout, frame: &RawFrame) -> Result<RawFields, String> {
    if frame.body.trim().is_empty() {
        return Err("empty frame body".to_string());
    }

    let mut scan = Scan::new(&frame.body);
    extract_date(&mut scan);

    match layout.token_style() {
        TokenStyle::Bracketed => extract_bracketed(&mut scan),
        TokenStyle::Colon => {
            extract_tuples(&mut scan);
            extract_colon_pairs(&mut scan);
        }
        TokenStyle::CommaList => {
            extract_tuples(&mut scan);
            extract_list_items(&mut scan);
        }
    }

    let fields = scan.into_fields();
    let has_payload = fields.iter().any(|(key, _)| key != "DATE");
    if !has_payload {
        return Err(format!("no {} fields found", layout.name()));
    }

    Ok(fields)
}
