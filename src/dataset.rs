//! Dataset: one or more sessions plus the shared view configuration
//!
//! Views (smoothed, resampled packets with speeds and stats) are computed on
//! first read and cached per session, plus one cache for the combined view.
//! Every mutation drops all caches and bumps [`Dataset::version`]. There is
//! no internal locking; share a `Dataset` across threads only behind the
//! caller's own synchronization.

use crate::error::{Result, SrtError};
use crate::filters::{resample, smooth};
use crate::parser::{build_session, session_from_prepared};
#[cfg(feature = "json")]
use crate::parser::session_from_prepared_json;
use crate::stats::{annotate_speeds, compute_stats};
use crate::types::{CanonicalPacket, Defect, FieldMap, FieldValue, Session, StatsSummary};
use log::{debug, info, warn};
use std::cell::OnceCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One input handed to a dataset
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Raw SRT text (or text holding a prepared JSON payload)
    Text { name: String, text: String },
    /// Packets normalized elsewhere
    Prepared {
        name: String,
        packets: Vec<CanonicalPacket>,
    },
    /// Packets normalized elsewhere, as a JSON payload
    #[cfg(feature = "json")]
    PreparedJson { name: String, json: String },
}

impl Input {
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Input::Text {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn prepared(name: impl Into<String>, packets: Vec<CanonicalPacket>) -> Self {
        Input::Prepared {
            name: name.into(),
            packets,
        }
    }

    #[cfg(feature = "json")]
    pub fn prepared_json(name: impl Into<String>, json: impl Into<String>) -> Self {
        Input::PreparedJson {
            name: name.into(),
            json: json.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Input::Text { name, .. } | Input::Prepared { name, .. } => name,
            #[cfg(feature = "json")]
            Input::PreparedJson { name, .. } => name,
        }
    }
}

/// View configuration shared by all sessions of a dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ViewOptions {
    /// Resampling bucket width; 0 keeps every packet
    pub millis_per_sample: u64,
    /// Moving-average half-width; 0 disables smoothing
    pub smoothing: usize,
}

/// Packets of a view and the stats computed over them
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Metadata {
    pub packets: Vec<CanonicalPacket>,
    pub stats: StatsSummary,
}

/// Raw extracted fields, per frame
#[derive(Debug, Clone, PartialEq)]
pub enum RawMetadata<'a> {
    Single(&'a [FieldMap]),
    /// Input name to frames, in registration order
    Multiple(Vec<(&'a str, &'a [FieldMap])>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileName<'a> {
    Single(&'a str),
    Multiple(Vec<&'a str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetState {
    /// No input has been parsed yet
    Unconfigured,
    /// At least one session is available
    Built,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    sessions: Vec<Session>,
    failures: Vec<SrtError>,
    options: ViewOptions,
    properties: FieldMap,
    version: u64,
    views: Vec<OnceCell<Metadata>>,
    combined: OnceCell<Metadata>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from a single raw input
    pub fn from_text(name: &str, text: &str) -> Result<Self> {
        let mut dataset = Self::new();
        dataset.register(Input::text(name, text))?;
        Ok(dataset)
    }

    /// Build a dataset from already-normalized packets
    pub fn from_prepared(name: &str, packets: Vec<CanonicalPacket>) -> Result<Self> {
        let mut dataset = Self::new();
        dataset.register(Input::prepared(name, packets))?;
        Ok(dataset)
    }

    /// Build a dataset from a prepared JSON payload
    #[cfg(feature = "json")]
    pub fn from_prepared_json(name: &str, json: &str) -> Result<Self> {
        let mut dataset = Self::new();
        dataset.register(Input::prepared_json(name, json))?;
        Ok(dataset)
    }

    /// Build a dataset from several inputs
    ///
    /// Inputs that fail are recorded in [`Dataset::failures`] and do not
    /// affect the others. Fails only when no input could be used, with the
    /// first failure.
    pub fn from_inputs<I: IntoIterator<Item = Input>>(inputs: I) -> Result<Self> {
        let mut dataset = Self::new();
        for input in inputs {
            // Recorded in `failures`
            let _ = dataset.register(input);
        }
        if dataset.sessions.is_empty() {
            return Err(dataset
                .failures
                .into_iter()
                .next()
                .unwrap_or(SrtError::NoSessions));
        }
        Ok(dataset)
    }

    /// Parse and add one input; a session with the same name is replaced
    pub fn register(&mut self, input: Input) -> Result<&mut Self> {
        let built = match input {
            Input::Text { name, text } => build_session(&name, &text),
            Input::Prepared { name, packets } => session_from_prepared(&name, packets),
            #[cfg(feature = "json")]
            Input::PreparedJson { name, json } => session_from_prepared_json(&name, &json),
        };
        match built {
            Ok(session) => {
                self.insert_session(session);
                Ok(self)
            }
            Err(error) => {
                warn!("{}", error);
                self.failures.push(error.clone());
                Err(error)
            }
        }
    }

    /// Add or replace a session; earlier failures of the same name are dropped
    fn insert_session(&mut self, session: Session) {
        self.failures
            .retain(|failure| failure.input_name() != Some(session.name.as_str()));
        match self.sessions.iter().position(|s| s.name == session.name) {
            Some(index) => {
                info!("replacing input {}", session.name);
                self.sessions[index] = session;
            }
            None => self.sessions.push(session),
        }
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.version += 1;
        self.views = self.sessions.iter().map(|_| OnceCell::new()).collect();
        self.combined = OnceCell::new();
        debug!("dataset views invalidated (version {})", self.version);
    }

    /// Incremented on every mutation
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn state(&self) -> DatasetState {
        if self.sessions.is_empty() {
            DatasetState::Unconfigured
        } else {
            DatasetState::Built
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.sessions
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| SrtError::UnknownSession(name.to_string()))
    }

    pub fn session(&self, name: &str) -> Result<&Session> {
        self.index_of(name).map(|i| &self.sessions[i])
    }

    /// Inputs that could not be turned into a session
    pub fn failures(&self) -> &[SrtError] {
        &self.failures
    }

    pub fn defects(&self, name: &str) -> Result<&[Defect]> {
        self.session(name).map(|s| s.defects.as_slice())
    }

    pub fn file_name(&self) -> FileName<'_> {
        match self.sessions.as_slice() {
            [only] => FileName::Single(&only.name),
            sessions => FileName::Multiple(sessions.iter().map(|s| s.name.as_str()).collect()),
        }
    }

    /// Raw fields of one input, or of every input when `name` is `None`
    pub fn raw_metadata(&self, name: Option<&str>) -> Result<RawMetadata<'_>> {
        if let Some(name) = name {
            return self.session(name).map(|s| RawMetadata::Single(&s.raw));
        }
        match self.sessions.as_slice() {
            [] => Err(SrtError::NoSessions),
            [only] => Ok(RawMetadata::Single(&only.raw)),
            sessions => Ok(RawMetadata::Multiple(
                sessions
                    .iter()
                    .map(|s| (s.name.as_str(), s.raw.as_slice()))
                    .collect(),
            )),
        }
    }

    /// Packets and stats of one input, or the combined view
    ///
    /// With `None` a single-input dataset returns that input's view and a
    /// multi-input dataset the time-ordered merge of all inputs.
    pub fn metadata(&self, name: Option<&str>) -> Result<&Metadata> {
        match name {
            Some(name) => self.index_of(name).map(|i| self.session_view(i)),
            None => match self.sessions.len() {
                0 => Err(SrtError::NoSessions),
                1 => Ok(self.session_view(0)),
                _ => Ok(self.combined_view()),
            },
        }
    }

    fn session_view(&self, index: usize) -> &Metadata {
        self.views[index].get_or_init(|| {
            let session = &self.sessions[index];
            let smoothed = smooth(&session.packets, self.options.smoothing);
            let mut packets = resample(&smoothed, self.options.millis_per_sample);
            annotate_speeds(&mut packets);
            debug!(
                "{}: view of {} packets from {}",
                session.name,
                packets.len(),
                session.packets.len()
            );
            let stats = compute_stats(&packets, &self.properties);
            Metadata { packets, stats }
        })
    }

    fn combined_view(&self) -> &Metadata {
        self.combined.get_or_init(|| {
            let views: Vec<&[CanonicalPacket]> = (0..self.sessions.len())
                .map(|i| self.session_view(i).packets.as_slice())
                .collect();
            let packets = merge_by_timestamp(&views);
            let stats = compute_stats(&packets, &self.properties);
            Metadata { packets, stats }
        })
    }

    pub fn options(&self) -> ViewOptions {
        self.options
    }

    pub fn set_options(&mut self, options: ViewOptions) -> &mut Self {
        self.options = options;
        self.invalidate();
        self
    }

    /// Set the resampling interval; negative values are rejected
    pub fn set_millis_per_sample(&mut self, millis: i64) -> Result<&mut Self> {
        let millis = u64::try_from(millis).map_err(|_| {
            SrtError::Configuration(format!("negative sampling interval {}", millis))
        })?;
        self.options.millis_per_sample = millis;
        self.invalidate();
        Ok(self)
    }

    pub fn millis_per_sample(&self) -> u64 {
        self.options.millis_per_sample
    }

    /// Set the smoothing factor; negative values are rejected
    pub fn set_smoothing(&mut self, factor: i64) -> Result<&mut Self> {
        let factor = usize::try_from(factor).map_err(|_| {
            SrtError::Configuration(format!("negative smoothing factor {}", factor))
        })?;
        self.options.smoothing = factor;
        self.invalidate();
        Ok(self)
    }

    pub fn smoothing(&self) -> usize {
        self.options.smoothing
    }

    /// Merge custom properties; later values win on a shared key
    pub fn set_properties<I, K, V>(&mut self, properties: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        for (key, value) in properties {
            self.properties.insert(key, value);
        }
        self.invalidate();
        self
    }

    pub fn properties(&self) -> &FieldMap {
        &self.properties
    }
}

/// K-way merge by timestamp; ties go to the earlier input and each input
/// keeps its own order
fn merge_by_timestamp(views: &[&[CanonicalPacket]]) -> Vec<CanonicalPacket> {
    let total = views.iter().map(|v| v.len()).sum();
    let mut merged = Vec::with_capacity(total);
    let mut heap: BinaryHeap<Reverse<(i64, usize, usize)>> = views
        .iter()
        .enumerate()
        .filter_map(|(input, view)| view.first().map(|p| Reverse((p.timestamp_ms, input, 0))))
        .collect();

    while let Some(Reverse((_, input, position))) = heap.pop() {
        let view = views[input];
        merged.push(view[position].clone());
        if let Some(next) = view.get(position + 1) {
            heap.push(Reverse((next.timestamp_ms, input, position + 1)));
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packets(times: &[i64]) -> Vec<CanonicalPacket> {
        times
            .iter()
            .enumerate()
            .map(|(i, &t)| CanonicalPacket::new(i + 1, t))
            .collect()
    }

    #[test]
    fn test_state_transitions() {
        let mut dataset = Dataset::new();
        assert_eq!(dataset.state(), DatasetState::Unconfigured);
        assert_eq!(dataset.metadata(None), Err(SrtError::NoSessions));

        dataset
            .register(Input::prepared("a", packets(&[0, 1000])))
            .unwrap();
        assert_eq!(dataset.state(), DatasetState::Built);

        dataset.set_millis_per_sample(500).unwrap();
        assert_eq!(dataset.state(), DatasetState::Built);
    }

    #[test]
    fn test_mutation_invalidates_cache() {
        let mut dataset = Dataset::from_prepared("a", packets(&[0, 100, 200, 300, 400])).unwrap();
        assert_eq!(dataset.metadata(None).unwrap().packets.len(), 5);

        let before = dataset.version();
        dataset.set_millis_per_sample(250).unwrap();
        assert!(dataset.version() > before);
        assert_eq!(dataset.metadata(None).unwrap().packets.len(), 3);

        dataset.set_millis_per_sample(0).unwrap();
        assert_eq!(dataset.metadata(None).unwrap().packets.len(), 5);
    }

    #[test]
    fn test_negative_configuration_is_rejected() {
        let mut dataset = Dataset::new();
        assert!(matches!(
            dataset.set_millis_per_sample(-1),
            Err(SrtError::Configuration(_))
        ));
        assert!(matches!(
            dataset.set_smoothing(-3),
            Err(SrtError::Configuration(_))
        ));
        assert_eq!(dataset.options(), ViewOptions::default());
    }

    #[test]
    fn test_merge_orders_by_time_and_ties_by_registration() {
        let dataset = Dataset::from_inputs([
            Input::prepared("a", packets(&[0, 1000, 2000])),
            Input::prepared("b", packets(&[500, 1000, 1500])),
        ])
        .unwrap();

        let combined = dataset.metadata(None).unwrap();
        let order: Vec<(&str, i64)> = combined
            .packets
            .iter()
            .map(|p| (p.source_name().unwrap_or(""), p.timestamp_ms))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a", 0),
                ("b", 500),
                ("a", 1000),
                ("b", 1000),
                ("b", 1500),
                ("a", 2000)
            ]
        );
        assert_eq!(combined.stats.duration_ms, 2000);
    }

    #[test]
    fn test_reregistering_replaces_session() {
        let mut dataset = Dataset::from_prepared("a", packets(&[0, 1000])).unwrap();
        dataset
            .register(Input::prepared("a", packets(&[0, 1000, 2000])))
            .unwrap();

        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.file_name(), FileName::Single("a"));
        assert_eq!(dataset.metadata(Some("a")).unwrap().packets.len(), 3);
    }

    #[test]
    fn test_failed_input_does_not_affect_siblings() {
        let dataset = Dataset::from_inputs([
            Input::text("bad.SRT", "nothing to see"),
            Input::prepared("good", packets(&[0, 1000])),
        ])
        .unwrap();

        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.failures().len(), 1);
        assert!(matches!(
            dataset.metadata(Some("bad.SRT")),
            Err(SrtError::UnknownSession(_))
        ));

        let all_bad = Dataset::from_inputs([Input::text("bad.SRT", "nothing to see")]);
        assert!(matches!(all_bad, Err(SrtError::UnrecognizedFormat { .. })));
    }

    #[test]
    fn test_successful_registration_clears_earlier_failure() {
        let mut dataset = Dataset::new();
        assert!(dataset.register(Input::prepared("a", Vec::new())).is_err());
        assert!(dataset.register(Input::text("b.SRT", "nothing to see")).is_err());
        assert_eq!(dataset.failures().len(), 2);

        dataset
            .register(Input::prepared("a", packets(&[0, 1000])))
            .unwrap();
        assert_eq!(dataset.failures().len(), 1);
        assert_eq!(dataset.failures()[0].input_name(), Some("b.SRT"));
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_prepared_json_failures_are_recorded() {
        let mut dataset = Dataset::new();
        let result = dataset.register(Input::prepared_json("p.json", r#"[{"frame": 1}]"#));

        assert!(matches!(result, Err(SrtError::InvalidPrepared { .. })));
        assert_eq!(dataset.failures().len(), 1);
        assert_eq!(dataset.failures()[0].input_name(), Some("p.json"));

        dataset
            .register(Input::prepared_json("p.json", r#"[{"timestamp_ms": 0}]"#))
            .unwrap();
        assert!(dataset.failures().is_empty());
        assert_eq!(dataset.len(), 1);

        assert!(Dataset::from_prepared_json("q.json", "{}").is_err());
    }
}
