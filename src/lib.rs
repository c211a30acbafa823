//! SRT Telemetry Library
//!
//! A Rust library for parsing the SRT telemetry side-files DJI drones record
//! next to their videos, and for computing flight statistics over them.
//! Several incompatible field layouts (Mavic Pro, Mavic 2, Mavic Air,
//! Phantom 4 Pro, Phantom 4 RTK and older firmwares) are detected and
//! normalized to one packet model.
//!
//! # Features
//!
//! - **`csv`** (default): Enable CSV export functionality
//! - **`json`** (default): Accept prepared packet payloads as JSON, export GeoJSON
//! - **`cli`** (default): Build the command-line interface binary
//! - **`serde`**: Enable serialization/deserialization of types
//!
//! # Quick Start
//!
//! Parse a file and read its statistics:
//! ```rust,no_run
//! use srt_telemetry::{Dataset, Field};
//!
//! let text = std::fs::read_to_string("DJI_0001.SRT").unwrap();
//! let dataset = Dataset::from_text("DJI_0001.SRT", &text).unwrap();
//! let metadata = dataset.metadata(None).unwrap();
//! println!("Parsed {} packets", metadata.packets.len());
//! if let Some(iso) = metadata.stats.field(Field::Iso) {
//!     println!("ISO {} - {}", iso.min, iso.max);
//! }
//! ```
//!
//! Resample, smooth and export to CSV:
//! ```rust,no_run
//! use srt_telemetry::{export_to_csv, Dataset, ExportOptions};
//! use std::path::Path;
//!
//! let text = std::fs::read_to_string("DJI_0001.SRT").unwrap();
//! let mut dataset = Dataset::from_text("DJI_0001.SRT", &text).unwrap();
//! dataset
//!     .set_millis_per_sample(1000)
//!     .unwrap()
//!     .set_smoothing(2)
//!     .unwrap()
//!     .set_properties([("pilot", "jo")]);
//!
//! let options = ExportOptions {
//!     csv: true,
//!     ..Default::default()
//! };
//! let report = export_to_csv(&dataset, Path::new("DJI_0001.SRT"), &options).unwrap();
//! if let Some(path) = report.csv_path {
//!     println!("Exported to: {}", path.display());
//! }
//! ```
//!
//! # Public API
//!
//! ## Dataset
//! - [`Dataset`] - One or more sessions plus view configuration
//! - [`Input`] - Raw text or prepared packets handed to a dataset
//! - [`ViewOptions`] - Sampling interval and smoothing factor
//!
//! ## Parsing Functions
//! - [`build_session`] - Detect, extract and normalize one input
//! - [`detect_format`] - Classify an input's layout
//! - [`session_from_prepared`] - Wrap already-normalized packets
//!
//! ## Statistics and Filters
//! - [`compute_stats`] - Min/max/avg, distance, speed and home point
//! - [`haversine_distance`] - Great-circle distance in meters
//! - [`resample`] - One packet per time bucket
//! - [`smooth`] - Centred moving average on coordinates and altitudes
//!
//! ## Export Functions
//! - [`export_to_csv`] - Export a dataset to CSV
//! - [`export_to_geojson`] - Export tracks (and waypoints) to GeoJSON
//! - [`to_geojson`] - Build the GeoJSON FeatureCollection in memory
//! - [`compute_export_path`] - Helper for consistent path computation

// Module declarations
pub mod conversion;
pub mod dataset;
pub mod error;
pub mod export;
pub mod filters;
pub mod parser;
pub mod stats;
pub mod types;

// Re-export everything from modules for convenience
#[allow(ambiguous_glob_reexports)]
pub use conversion::*;
#[allow(ambiguous_glob_reexports)]
pub use dataset::*;
#[allow(ambiguous_glob_reexports)]
pub use error::*;
#[allow(ambiguous_glob_reexports)]
pub use export::*;
#[allow(ambiguous_glob_reexports)]
pub use filters::*;
#[allow(ambiguous_glob_reexports)]
pub use parser::*;
#[allow(ambiguous_glob_reexports)]
pub use stats::*;
#[allow(ambiguous_glob_reexports)]
pub use types::*;
