//! Export functionality for telemetry datasets
//!
//! Writes the active view of a [`Dataset`] (or its raw metadata) to CSV or
//! GeoJSON. Absent values are empty cells or missing properties, never
//! zeros or nulls. In CSV a column is only written when at least one row
//! has a value for it. Custom properties become constant columns, or
//! properties on every feature.

use std::path::{Path, PathBuf};

#[cfg(any(feature = "csv", feature = "json"))]
use crate::dataset::Dataset;
#[cfg(feature = "csv")]
use crate::dataset::RawMetadata;
#[cfg(any(feature = "csv", feature = "json"))]
use crate::types::{CanonicalPacket, Field, FieldMap};
#[cfg(any(feature = "csv", feature = "json"))]
use anyhow::{Context, Result};
#[cfg(any(feature = "csv", feature = "json"))]
use log::debug;
#[cfg(any(feature = "csv", feature = "json"))]
use std::io::Write;

#[cfg(feature = "json")]
use crate::types::FieldValue;
#[cfg(feature = "json")]
use serde_json::{json, Map, Number, Value};
#[cfg(feature = "json")]
use std::collections::HashMap;

#[cfg(any(feature = "csv", feature = "json"))]
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Export options for controlling output formats
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub csv: bool,
    /// Write a GeoJSON FeatureCollection with one track per input
    pub geojson: bool,
    /// GeoJSON only: also emit one Point feature per located packet
    pub waypoints: bool,
    /// Export the raw extracted fields instead of the canonical view
    pub raw_metadata: bool,
    /// Defaults to the input file's directory
    pub output_dir: Option<String>,
}

/// Paths written by an export run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub csv_path: Option<PathBuf>,
    pub geojson_path: Option<PathBuf>,
}

/// Compute the output path for an input: `<dir>/<stem>.<ext>` or `<stem>.raw.<ext>`
pub fn compute_export_path(input_path: &Path, options: &ExportOptions, extension: &str) -> PathBuf {
    let base_name = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("telemetry");

    let output_dir = match options.output_dir {
        Some(ref dir) => Path::new(dir),
        None => input_path.parent().unwrap_or(Path::new(".")),
    };

    let suffix = if options.raw_metadata { ".raw" } else { "" };
    output_dir.join(format!("{base_name}{suffix}.{extension}"))
}

#[cfg(any(feature = "csv", feature = "json"))]
fn ensure_output_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {dir:?}"))?;
            debug!("Created output directory: {dir:?}");
        }
    }
    Ok(())
}

#[cfg(feature = "csv")]
#[derive(Debug, Clone, Copy, PartialEq)]
enum Column<'a> {
    Source,
    Frame,
    Timestamp,
    Date,
    Canonical(Field),
    HomeLatitude,
    HomeLongitude,
    Speed2d,
    Speed3d,
    SpeedVertical,
    Extra(&'a str),
    Property(&'a str),
}

#[cfg(feature = "csv")]
impl<'a> Column<'a> {
    fn header(&self) -> &'a str {
        match self {
            Column::Source => "SOURCE",
            Column::Frame => "FRAME",
            Column::Timestamp => "TIMESTAMP",
            Column::Date => "DATE",
            Column::Canonical(field) => field.name(),
            Column::HomeLatitude => "HOME_LATITUDE",
            Column::HomeLongitude => "HOME_LONGITUDE",
            Column::Speed2d => "SPEED_TWOD",
            Column::Speed3d => "SPEED_THREED",
            Column::SpeedVertical => "SPEED_VERTICAL",
            Column::Extra(name) | Column::Property(name) => *name,
        }
    }

    fn cell(&self, packet: &CanonicalPacket, properties: &FieldMap) -> Option<String> {
        match self {
            Column::Source => packet.source_name().map(str::to_string),
            Column::Frame => Some(packet.frame.to_string()),
            Column::Timestamp => Some(packet.timestamp_ms.to_string()),
            Column::Date => packet.date.map(|d| d.format(DATE_FORMAT).to_string()),
            Column::Canonical(field) => field.value(packet).map(|v| v.to_string()),
            Column::HomeLatitude => packet.home.map(|h| h.latitude.to_string()),
            Column::HomeLongitude => packet.home.map(|h| h.longitude.to_string()),
            Column::Speed2d => packet.speed.map(|s| s.two_d.to_string()),
            Column::Speed3d => packet.speed.map(|s| s.three_d.to_string()),
            Column::SpeedVertical => packet.speed.and_then(|s| s.vertical).map(|v| v.to_string()),
            Column::Extra(name) => packet.extra.get(name).map(|v| v.to_string()),
            Column::Property(name) => properties.get(name).map(|v| v.to_string()),
        }
    }
}

#[cfg(feature = "csv")]
fn canonical_columns<'a>(
    packets: &'a [CanonicalPacket],
    properties: &'a FieldMap,
    with_source: bool,
) -> Vec<Column<'a>> {
    let mut candidates = vec![Column::Date];
    candidates.extend(Field::ALL.iter().map(|&f| Column::Canonical(f)));
    candidates.extend([
        Column::HomeLatitude,
        Column::HomeLongitude,
        Column::Speed2d,
        Column::Speed3d,
        Column::SpeedVertical,
    ]);
    for packet in packets {
        for key in packet.extra.keys() {
            if !candidates.contains(&Column::Extra(key)) {
                candidates.push(Column::Extra(key));
            }
        }
    }

    let mut columns = Vec::new();
    if with_source {
        columns.push(Column::Source);
    }
    columns.extend([Column::Frame, Column::Timestamp]);
    for column in candidates {
        let taken = columns.iter().any(|c| c.header() == column.header());
        if !taken && packets.iter().any(|p| column.cell(p, properties).is_some()) {
            columns.push(column);
        }
    }
    for key in properties.keys() {
        if !columns.iter().any(|c| c.header() == key) {
            columns.push(Column::Property(key));
        }
    }
    columns
}

/// Write the dataset's active view (or raw metadata) as CSV
#[cfg(feature = "csv")]
pub fn write_csv<W: Write>(dataset: &Dataset, raw_metadata: bool, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    if raw_metadata {
        write_raw_rows(dataset, &mut csv_writer)?;
    } else {
        let metadata = dataset.metadata(None)?;
        let columns = canonical_columns(
            &metadata.packets,
            dataset.properties(),
            dataset.len() > 1,
        );
        csv_writer.write_record(columns.iter().map(|c| c.header()))?;
        for packet in &metadata.packets {
            csv_writer.write_record(
                columns
                    .iter()
                    .map(|c| c.cell(packet, dataset.properties()).unwrap_or_default()),
            )?;
        }
        debug!("wrote {} CSV rows", metadata.packets.len());
    }

    csv_writer.flush()?;
    Ok(())
}

#[cfg(feature = "csv")]
fn write_raw_rows<W: Write>(dataset: &Dataset, csv_writer: &mut csv::Writer<W>) -> Result<()> {
    let inputs: Vec<(&str, &[FieldMap])> = match dataset.raw_metadata(None)? {
        RawMetadata::Single(frames) => vec![("", frames)],
        RawMetadata::Multiple(inputs) => inputs,
    };
    let with_source = inputs.len() > 1;
    let properties = dataset.properties();

    let mut keys: Vec<&str> = Vec::new();
    for (_, frames) in &inputs {
        for frame in frames.iter() {
            for key in frame.keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
    }
    let property_keys: Vec<&str> = properties
        .keys()
        .filter(|key| !keys.contains(key))
        .collect();

    let mut header: Vec<&str> = Vec::new();
    if with_source {
        header.push("SOURCE");
    }
    header.extend(keys.iter().copied());
    header.extend(property_keys.iter().copied());
    csv_writer.write_record(&header)?;

    for (name, frames) in &inputs {
        for frame in frames.iter() {
            let mut row: Vec<String> = Vec::with_capacity(header.len());
            if with_source {
                row.push(name.to_string());
            }
            row.extend(
                keys.iter()
                    .map(|key| frame.get(key).map(|v| v.to_string()).unwrap_or_default()),
            );
            row.extend(
                property_keys
                    .iter()
                    .map(|key| properties.get(key).map(|v| v.to_string()).unwrap_or_default()),
            );
            csv_writer.write_record(&row)?;
        }
    }
    Ok(())
}

/// Export a dataset to CSV next to its input (or into `output_dir`)
#[cfg(feature = "csv")]
pub fn export_to_csv(
    dataset: &Dataset,
    input_path: &Path,
    options: &ExportOptions,
) -> Result<ExportReport> {
    if !options.csv {
        return Ok(ExportReport::default());
    }

    let csv_path = compute_export_path(input_path, options, "csv");
    ensure_output_dir(&csv_path)?;

    let file = std::fs::File::create(&csv_path)
        .with_context(|| format!("Failed to create CSV file: {csv_path:?}"))?;
    write_csv(dataset, options.raw_metadata, file)
        .with_context(|| format!("Failed to write CSV file: {csv_path:?}"))?;

    Ok(ExportReport {
        csv_path: Some(csv_path),
        ..Default::default()
    })
}

#[cfg(feature = "json")]
fn json_number(value: f64) -> Option<Value> {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Some(Value::from(value as i64))
    } else {
        Number::from_f64(value).map(Value::Number)
    }
}

#[cfg(feature = "json")]
fn json_field(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::Number(number) => json_number(*number),
        FieldValue::List(values) => Some(Value::Array(
            values.iter().filter_map(|v| json_number(*v)).collect(),
        )),
        FieldValue::Text(text) => Some(Value::String(text.clone())),
    }
}

/// `[longitude, latitude]` plus altitude when known; `None` without a valid fix
#[cfg(feature = "json")]
fn coordinates(packet: &CanonicalPacket) -> Option<Value> {
    let fix = packet.fix()?;
    let mut position = vec![
        Value::Number(Number::from_f64(fix.longitude)?),
        Value::Number(Number::from_f64(fix.latitude)?),
    ];
    if let Some(altitude) = packet.altitude().and_then(Number::from_f64) {
        position.push(Value::Number(altitude));
    }
    Some(Value::Array(position))
}

#[cfg(feature = "json")]
fn put(properties: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        properties.insert(key.to_string(), value);
    }
}

#[cfg(feature = "json")]
fn packet_properties(packet: &CanonicalPacket, with_source: bool) -> Map<String, Value> {
    let mut properties = Map::new();
    if with_source {
        put(&mut properties, "SOURCE", packet.source_name().map(Value::from));
    }
    put(&mut properties, "FRAME", Some(Value::from(packet.frame)));
    put(&mut properties, "TIMESTAMP", Some(Value::from(packet.timestamp_ms)));
    put(
        &mut properties,
        "DATE",
        packet.date.map(|d| Value::from(d.format(DATE_FORMAT).to_string())),
    );
    for field in Field::ALL {
        put(&mut properties, field.name(), field.value(packet).and_then(json_number));
    }
    put(&mut properties, "HOME_LATITUDE", packet.home.and_then(|h| json_number(h.latitude)));
    put(&mut properties, "HOME_LONGITUDE", packet.home.and_then(|h| json_number(h.longitude)));
    if let Some(speed) = packet.speed {
        put(&mut properties, "SPEED_TWOD", json_number(speed.two_d));
        put(&mut properties, "SPEED_THREED", json_number(speed.three_d));
        put(&mut properties, "SPEED_VERTICAL", speed.vertical.and_then(json_number));
    }
    for (key, value) in packet.extra.iter() {
        if !properties.contains_key(key) {
            put(&mut properties, key, json_field(value));
        }
    }
    properties
}

#[cfg(feature = "json")]
fn raw_properties(frame: &FieldMap) -> Map<String, Value> {
    frame
        .iter()
        .filter_map(|(key, value)| json_field(value).map(|v| (key.to_string(), v)))
        .collect()
}

/// Custom properties never replace a value already present
#[cfg(feature = "json")]
fn add_custom_properties(properties: &mut Map<String, Value>, custom: &FieldMap) {
    for (key, value) in custom.iter() {
        if !properties.contains_key(key) {
            put(properties, key, json_field(value));
        }
    }
}

/// Input name to frame number to raw fields
#[cfg(feature = "json")]
fn raw_index(dataset: &Dataset) -> HashMap<&str, HashMap<usize, &FieldMap>> {
    dataset
        .sessions()
        .iter()
        .map(|session| {
            let frames: HashMap<usize, &FieldMap> = session
                .packets
                .iter()
                .map(|p| p.frame)
                .zip(&session.raw)
                .collect();
            (session.name.as_str(), frames)
        })
        .collect()
}

/// Build a GeoJSON FeatureCollection from the dataset's active view
///
/// Every input becomes one track feature (a LineString, or a Point when it
/// has a single fix; inputs without GPS are left out). With `waypoints`
/// each located packet of the combined view is also emitted as a Point
/// feature ahead of the tracks. With `raw_metadata` waypoint properties are
/// the raw extracted fields instead of the canonical ones.
#[cfg(feature = "json")]
pub fn to_geojson(dataset: &Dataset, raw_metadata: bool, waypoints: bool) -> Result<Value> {
    let combined = dataset.metadata(None)?;
    let custom = dataset.properties();
    let with_source = dataset.len() > 1;
    let raw = if raw_metadata {
        raw_index(dataset)
    } else {
        HashMap::new()
    };

    let mut features = Vec::new();
    if waypoints {
        for packet in &combined.packets {
            let Some(position) = coordinates(packet) else {
                continue;
            };
            let mut properties = if raw_metadata {
                let mut properties = Map::new();
                if with_source {
                    put(&mut properties, "SOURCE", packet.source_name().map(Value::from));
                }
                let frame = packet
                    .source_name()
                    .and_then(|name| raw.get(name))
                    .and_then(|frames| frames.get(&packet.frame));
                if let Some(frame) = frame {
                    properties.extend(raw_properties(frame));
                }
                properties
            } else {
                packet_properties(packet, with_source)
            };
            add_custom_properties(&mut properties, custom);
            features.push(json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": position },
                "properties": properties,
            }));
        }
    }

    for session in dataset.sessions() {
        let packets = &dataset.metadata(Some(&session.name))?.packets;
        let (positions, timestamps): (Vec<Value>, Vec<Value>) = packets
            .iter()
            .filter_map(|p| coordinates(p).map(|c| (c, Value::from(p.timestamp_ms))))
            .unzip();
        let geometry = match positions.len() {
            0 => {
                debug!("{}: no GPS fix, no track", session.name);
                continue;
            }
            1 => json!({ "type": "Point", "coordinates": positions[0] }),
            _ => json!({ "type": "LineString", "coordinates": positions }),
        };

        let mut properties = Map::new();
        put(&mut properties, "NAME", Some(Value::from(session.name.as_str())));
        put(&mut properties, "TIMESTAMPS", Some(Value::Array(timestamps)));
        add_custom_properties(&mut properties, custom);
        features.push(json!({
            "type": "Feature",
            "geometry": geometry,
            "properties": properties,
        }));
    }

    debug!("built {} GeoJSON features", features.len());
    Ok(json!({ "type": "FeatureCollection", "features": features }))
}

/// Write the dataset as a GeoJSON FeatureCollection
#[cfg(feature = "json")]
pub fn write_geojson<W: Write>(
    dataset: &Dataset,
    raw_metadata: bool,
    waypoints: bool,
    mut writer: W,
) -> Result<()> {
    let collection = to_geojson(dataset, raw_metadata, waypoints)?;
    serde_json::to_writer_pretty(&mut writer, &collection)?;
    writer.flush()?;
    Ok(())
}

/// Export a dataset to GeoJSON next to its input (or into `output_dir`)
#[cfg(feature = "json")]
pub fn export_to_geojson(
    dataset: &Dataset,
    input_path: &Path,
    options: &ExportOptions,
) -> Result<ExportReport> {
    if !options.geojson {
        return Ok(ExportReport::default());
    }

    let geojson_path = compute_export_path(input_path, options, "geojson");
    ensure_output_dir(&geojson_path)?;

    let file = std::fs::File::create(&geojson_path)
        .with_context(|| format!("Failed to create GeoJSON file: {geojson_path:?}"))?;
    write_geojson(
        dataset,
        options.raw_metadata,
        options.waypoints,
        std::io::BufWriter::new(file),
    )
    .with_context(|| format!("Failed to write GeoJSON file: {geojson_path:?}"))?;

    Ok(ExportReport {
        geojson_path: Some(geojson_path),
        ..Default::default()
    })
}


#[cfg(all(test, feature = "json"))]
mod geojson_tests {
    use super::*;
    use crate::dataset::Input;
    use crate::types::GeoPoint;

    fn located(frame: usize, ms: i64, longitude: f64) -> CanonicalPacket {
        let mut packet = CanonicalPacket::new(frame, ms);
        packet.position = Some(GeoPoint::new(46.5, longitude));
        packet
    }

    fn features(collection: &Value) -> &Vec<Value> {
        collection["features"].as_array().unwrap()
    }

    fn assert_no_nulls(value: &Value) {
        match value {
            Value::Null => panic!("null in GeoJSON output"),
            Value::Array(items) => items.iter().for_each(assert_no_nulls),
            Value::Object(map) => map.values().for_each(assert_no_nulls),
            _ => {}
        }
    }

    #[test]
    fn test_waypoints_have_numeric_coordinates_and_custom_properties() {
        let mut a = located(1, 0, 6.5);
        a.altitude_barometer = Some(12.5);
        a.camera.iso = Some(100);
        let b = located(2, 1000, 6.501);
        let mut dataset = Dataset::from_prepared("flight", vec![a, b]).unwrap();
        dataset.set_properties([("propInt", FieldValue::from(123)), ("PILOT", "jo".into())]);

        let collection = to_geojson(&dataset, false, true).unwrap();
        let features = features(&collection);
        // Two waypoints then the track
        assert_eq!(features.len(), 3);

        let first = &features[0];
        assert_eq!(first["geometry"]["type"], "Point");
        let position = first["geometry"]["coordinates"].as_array().unwrap();
        assert_eq!(position.len(), 3);
        assert!(position.iter().all(Value::is_number));
        assert_eq!(position[0].as_f64(), Some(6.5));
        assert_eq!(first["properties"]["propInt"].as_i64(), Some(123));
        assert_eq!(first["properties"]["PILOT"], "jo");
        assert_eq!(first["properties"]["ISO"].as_i64(), Some(100));

        // No altitude and no ISO on the second packet: omitted, not null
        let second = &features[1];
        assert_eq!(second["geometry"]["coordinates"].as_array().unwrap().len(), 2);
        assert!(second["properties"].get("ISO").is_none());
        assert!(second["properties"].get("BAROMETER").is_none());
        assert_no_nulls(&collection);
    }

    #[test]
    fn test_track_only_output_has_one_feature_per_input() {
        let dataset = Dataset::from_inputs([
            Input::prepared("a", vec![located(1, 0, 6.5), located(2, 1000, 6.501)]),
            Input::prepared("b", vec![located(1, 500, 7.0)]),
            Input::prepared("c", vec![CanonicalPacket::new(1, 0)]),
        ])
        .unwrap();

        let collection = to_geojson(&dataset, false, false).unwrap();
        let features = features(&collection);
        assert_eq!(features.len(), 2, "an input without fixes has no track");

        assert_eq!(features[0]["geometry"]["type"], "LineString");
        assert_eq!(features[0]["properties"]["NAME"], "a");
        assert_eq!(features[0]["properties"]["TIMESTAMPS"], json!([0, 1000]));
        assert_eq!(features[1]["geometry"]["type"], "Point");
        assert_eq!(features[1]["properties"]["NAME"], "b");
        assert_no_nulls(&collection);
    }

    #[test]
    fn test_raw_waypoints_use_extracted_fields() {
        let mut packet = located(1, 0, 6.5);
        packet.extra.insert("CT", 5);
        packet.camera.iso = Some(100);
        let dataset = Dataset::from_prepared("flight", vec![packet]).unwrap();

        let collection = to_geojson(&dataset, true, true).unwrap();
        let properties = &features(&collection)[0]["properties"];
        assert_eq!(properties["CT"].as_i64(), Some(5));
        assert!(properties.get("ISO").is_none());
    }

    #[test]
    fn test_non_finite_values_are_omitted() {
        let mut packet = located(1, 0, 6.5);
        packet.altitude_barometer = Some(f64::NAN);
        packet.extra.insert("D", f64::INFINITY);
        let dataset = Dataset::from_prepared("flight", vec![packet]).unwrap();

        let collection = to_geojson(&dataset, false, true).unwrap();
        let waypoint = &features(&collection)[0];
        assert_eq!(waypoint["geometry"]["coordinates"].as_array().unwrap().len(), 2);
        assert!(waypoint["properties"].get("D").is_none());
        assert_no_nulls(&collection);
    }

    #[test]
    fn test_export_disabled_writes_nothing() {
        let dataset = Dataset::from_prepared("flight", vec![located(1, 0, 6.5)]).unwrap();
        let report =
            export_to_geojson(&dataset, Path::new("flight.SRT"), &ExportOptions::default()).unwrap();
        assert_eq!(report, ExportReport::default());
    }
}
