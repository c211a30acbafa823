//! Value conversion utilities for SRT parsing
//!
//! Number parsing is locale-invariant: `.` is the only decimal separator and
//! `,` always separates values. Units DJI appends to numbers (`m`, `m/s`,
//! `ms`, `°`) are accepted and dropped.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse a number that may carry a trailing unit suffix
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let bytes = text.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    // A lone sign or dot is not a number
    if !text[digits_start..end].bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }

    let unit = text[end..].trim();
    if !unit
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c == '/' || c == '°' || c == '%')
    {
        return None;
    }

    text[..end].parse().ok()
}

/// Parse a comma separated tuple such as `149.0251,-20.2533,16`
///
/// Returns the offending element on failure.
pub fn parse_tuple(text: &str) -> Result<Vec<f64>, String> {
    text.split(',')
        .map(|part| parse_number(part).ok_or_else(|| part.trim().to_string()))
        .collect()
}

/// How a layout writes its shutter speed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterNotation {
    /// `1/500.0`, or plain seconds for long exposures (`1.6`)
    Fraction,
    /// Denominator only: `60` means 1/60 s
    Denominator,
}

/// Convert a shutter value to the denominator of `1/shutter`
pub fn parse_shutter(text: &str, notation: ShutterNotation) -> Option<f64> {
    let text = text.trim();
    if let Some((numerator, denominator)) = text.split_once('/') {
        let numerator = parse_number(numerator)?;
        let denominator = parse_number(denominator)?;
        if numerator <= 0.0 || denominator <= 0.0 {
            return None;
        }
        return Some(denominator / numerator);
    }

    let value = parse_number(text)?;
    if value <= 0.0 {
        return None;
    }
    match notation {
        ShutterNotation::Fraction => Some(1.0 / value),
        ShutterNotation::Denominator => Some(value),
    }
}

/// Parse an aperture written as `F2.2`, `f/2.8`, `2.8`, or in hundredths (`280`)
pub fn parse_fnum(text: &str, hundredths: bool) -> Option<f64> {
    let text = text.trim();
    let text = text
        .strip_prefix('F')
        .or_else(|| text.strip_prefix('f'))
        .unwrap_or(text);
    let text = text.strip_prefix('/').unwrap_or(text);
    let value = parse_number(text)?;
    if hundredths && !text.contains('.') {
        Some(value / 100.0)
    } else {
        Some(value)
    }
}

/// Parse a non-negative integer count (ISO, satellites), tolerating `100.0`
pub fn parse_count(text: &str) -> Option<u32> {
    let value = parse_number(text)?;
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return None;
    }
    Some(value as u32)
}

/// Build a UTC date from the components captured in a frame body
///
/// DJI writes local time without a zone; it is taken as UTC so timestamps
/// stay comparable within a flight.
pub fn build_date(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    millis: u32,
) -> Option<DateTime<Utc>> {
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_milli_opt(
        hour,
        minute,
        second,
        millis,
    )?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Parse the normalized `YYYY-MM-DD HH:MM:SS.mmm` form produced by the extractor
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text.trim(), "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Convert a distance covered in a time span to km/h
pub fn speed_kmh(meters: f64, millis: i64) -> f64 {
    if millis <= 0 {
        return 0.0;
    }
    meters / (millis as f64 / 1000.0) * 3.6
}
