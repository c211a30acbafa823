use crate::types::{CanonicalPacket, FieldMap, Layout};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Non-fatal data-quality problem found while building a session
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Defect {
    /// Frame number the defect belongs to, when known
    pub frame: Option<usize>,
    pub kind: DefectKind,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DefectKind {
    /// The frame block was malformed and skipped
    FrameDefect { reason: String },
    /// A field was present but its value could not be interpreted
    FieldUnparseable { field: String, value: String },
    /// The frame's timestamp is earlier than its predecessor's
    TimestampRegression { previous_ms: i64, current_ms: i64 },
}

impl Defect {
    pub fn frame(frame: Option<usize>, reason: impl Into<String>) -> Self {
        Self {
            frame,
            kind: DefectKind::FrameDefect {
                reason: reason.into(),
            },
        }
    }

    pub fn field(frame: usize, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            frame: Some(frame),
            kind: DefectKind::FieldUnparseable {
                field: field.into(),
                value: value.into(),
            },
        }
    }

    pub fn regression(frame: usize, previous_ms: i64, current_ms: i64) -> Self {
        Self {
            frame: Some(frame),
            kind: DefectKind::TimestampRegression {
                previous_ms,
                current_ms,
            },
        }
    }

    pub fn is_frame_skip(&self) -> bool {
        matches!(self.kind, DefectKind::FrameDefect { .. })
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(frame) = self.frame {
            write!(f, "frame {}: ", frame)?;
        }
        match &self.kind {
            DefectKind::FrameDefect { reason } => write!(f, "skipped ({})", reason),
            DefectKind::FieldUnparseable { field, value } => {
                write!(f, "unparseable {} value '{}'", field, value)
            }
            DefectKind::TimestampRegression {
                previous_ms,
                current_ms,
            } => write!(
                f,
                "timestamp went back from {} to {} ms",
                previous_ms, current_ms
            ),
        }
    }
}

/// One input's parsed telemetry
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Session {
    pub name: String,
    /// Detected layout; `None` for prepared payloads
    pub layout: Option<Layout>,
    pub packets: Vec<CanonicalPacket>,
    /// Every extracted field per kept frame, parallel to `packets`
    pub raw: Vec<FieldMap>,
    pub defects: Vec<Defect>,
}

impl Session {
    /// Get the duration of the session in milliseconds
    pub fn duration_ms(&self) -> i64 {
        match (self.packets.first(), self.packets.last()) {
            (Some(first), Some(last)) => last.timestamp_ms.saturating_sub(first.timestamp_ms),
            _ => 0,
        }
    }

    /// Check if any packet carries a valid GPS fix
    pub fn has_gps_data(&self) -> bool {
        self.packets.iter().any(|p| p.fix().is_some())
    }

    pub fn is_prepared(&self) -> bool {
        self.layout.is_none()
    }

    pub fn skipped_frames(&self) -> usize {
        self.defects.iter().filter(|d| d.is_frame_skip()).count()
    }
}
