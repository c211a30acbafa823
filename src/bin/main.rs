//! CLI binary for SRT telemetry
//!
//! Parses DJI SRT side-files, prints flight summaries and optionally exports
//! CSV, GeoJSON or JSON statistics.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use glob::glob;
use log::{debug, LevelFilter};
use srt_telemetry::{
    export_to_csv, export_to_geojson, Dataset, ExportOptions, Field, FileName, Input,
    StatsSummary,
};
use std::path::{Path, PathBuf};

fn long_version() -> String {
    match option_env!("VERGEN_GIT_SHA") {
        Some(sha) => format!("{} ({})", env!("CARGO_PKG_VERSION"), sha),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}

fn build_command() -> Command {
    Command::new("SRT Telemetry")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version())
        .about("Parse DJI SRT telemetry files, print flight statistics, export CSV, GeoJSON or JSON.")
        .arg(
            Arg::new("files")
                .help("SRT files to parse (.SRT and prepared .JSON, case-insensitive, supports globbing)")
                .required(true)
                .num_args(1..)
                .index(1),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug logging (otherwise RUST_LOG, default warn)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("merge")
                .long("merge")
                .help("Combine all inputs into one time-ordered dataset")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("csv")
                .long("csv")
                .help("Export packets to CSV (<name>.csv)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("geojson")
                .long("geojson")
                .help("Export one GPS track per input to GeoJSON (<name>.geojson)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("waypoints")
                .long("waypoints")
                .help("With --geojson, also write one point feature per packet")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("raw")
                .long("raw")
                .help("Export the raw extracted fields instead (<name>.raw.csv, <name>.raw.geojson)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print statistics as JSON instead of a text summary")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .help("Directory for exported files (default: same as input file)")
                .value_name("DIR"),
        )
        .arg(
            Arg::new("ms-per-sample")
                .long("ms-per-sample")
                .help("Resample to one packet per interval in milliseconds (0 = off)")
                .value_name("MS")
                .value_parser(clap::value_parser!(i64))
                .allow_negative_numbers(true)
                .default_value("0"),
        )
        .arg(
            Arg::new("smoothing")
                .long("smoothing")
                .help("Moving-average half-width applied to coordinates and altitudes (0 = off)")
                .value_name("N")
                .value_parser(clap::value_parser!(i64))
                .allow_negative_numbers(true)
                .default_value("0"),
        )
        .arg(
            Arg::new("property")
                .long("property")
                .help("Custom KEY=VALUE property added to stats and CSV (repeatable)")
                .value_name("KEY=VALUE")
                .action(ArgAction::Append),
        )
}

fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn collect_paths(patterns: &[&String]) -> Vec<PathBuf> {
    let mut valid_paths = Vec::new();
    for pattern in patterns {
        let paths: Vec<PathBuf> = if pattern.contains('*') || pattern.contains('?') {
            match glob(pattern) {
                Ok(glob_iter) => match glob_iter.collect::<Result<Vec<_>, _>>() {
                    Ok(paths) => {
                        debug!("Glob pattern '{pattern}' matched {} files", paths.len());
                        paths
                    }
                    Err(e) => {
                        eprintln!("Error expanding glob pattern '{pattern}': {e}");
                        continue;
                    }
                },
                Err(e) => {
                    eprintln!("Invalid glob pattern '{pattern}': {e}");
                    continue;
                }
            }
        } else {
            vec![PathBuf::from(pattern)]
        };

        for path in paths {
            if !path.exists() {
                eprintln!("Warning: File does not exist: {path:?}");
                continue;
            }

            let valid_extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    let ext_lower = ext.to_ascii_lowercase();
                    ext_lower == "srt" || ext_lower == "json"
                })
                .unwrap_or(false);

            if !valid_extension {
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("none");
                eprintln!("Warning: Skipping file with unsupported extension '{ext}': {path:?}");
                continue;
            }
            valid_paths.push(path);
        }
    }
    valid_paths
}

fn read_input(path: &Path) -> Result<Input> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read SRT file: {path:?}"))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");
    Ok(Input::text(name, text))
}

fn parse_properties(values: &[&String]) -> Result<Vec<(String, String)>> {
    values
        .iter()
        .map(|value| {
            value
                .split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .with_context(|| format!("Invalid property '{value}', expected KEY=VALUE"))
        })
        .collect()
}

/// Configure and report one dataset
struct Run<'a> {
    millis_per_sample: i64,
    smoothing: i64,
    properties: &'a [(String, String)],
    json: bool,
    export_options: &'a ExportOptions,
}

impl Run<'_> {
    fn process(&self, mut dataset: Dataset, export_input: &Path) -> Result<()> {
        dataset
            .set_millis_per_sample(self.millis_per_sample)?
            .set_smoothing(self.smoothing)?
            .set_properties(self.properties.iter().cloned());

        for failure in dataset.failures() {
            eprintln!("Error: {failure}");
        }

        let metadata = dataset.metadata(None)?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&metadata.stats)?);
        } else {
            print_summary(&dataset, &metadata.stats, metadata.packets.len());
        }

        let report = export_to_csv(&dataset, export_input, self.export_options)?;
        if let Some(path) = report.csv_path {
            println!("Exported CSV to: {}", path.display());
        }
        let report = export_to_geojson(&dataset, export_input, self.export_options)?;
        if let Some(path) = report.geojson_path {
            println!("Exported GeoJSON to: {}", path.display());
        }
        Ok(())
    }
}

fn print_summary(dataset: &Dataset, stats: &StatsSummary, packets: usize) {
    match dataset.file_name() {
        FileName::Single(name) => println!("File: {name}"),
        FileName::Multiple(names) => println!("Files: {}", names.join(", ")),
    }
    for session in dataset.sessions() {
        let layout = session
            .layout
            .map(|l| l.name().to_string())
            .unwrap_or_else(|| "prepared".to_string());
        println!(
            "  {}: {} ({} packets, {} defects)",
            session.name,
            layout,
            session.packets.len(),
            session.defects.len()
        );
    }

    println!("Packets: {packets}");
    if let Some(date) = stats.date {
        println!("Date: {}", date.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("Duration: {:.1} s", stats.duration_seconds());
    match stats.distance_2d {
        Some(distance) => println!("Distance: {distance:.1} m"),
        None => println!("Distance: no GPS data"),
    }
    if let Some(speed) = stats.speed {
        println!(
            "Speed 2D: avg {:.1} km/h, max {:.1} km/h",
            speed.two_d.avg, speed.two_d.max
        );
    }
    for home in &stats.home {
        println!(
            "Home: {:.6}, {:.6} ({:?})",
            home.point.latitude, home.point.longitude, home.source
        );
    }
    for field in Field::ALL {
        if let Some(s) = stats.field(field) {
            println!(
                "{:<15} min {:>10.3}  max {:>10.3}  avg {:>10.3}",
                field.name(),
                s.min,
                s.max,
                s.avg
            );
        }
    }
}

fn main() -> Result<()> {
    let matches = build_command().get_matches();

    let debug = matches.get_flag("debug");
    init_logging(debug);

    let file_patterns: Vec<&String> = matches
        .get_many::<String>("files")
        .map(|values| values.collect())
        .unwrap_or_default();
    let property_values: Vec<&String> = matches
        .get_many::<String>("property")
        .map(|values| values.collect())
        .unwrap_or_default();
    let properties = parse_properties(&property_values)?;

    let export_options = ExportOptions {
        csv: matches.get_flag("csv"),
        geojson: matches.get_flag("geojson"),
        waypoints: matches.get_flag("waypoints"),
        raw_metadata: matches.get_flag("raw"),
        output_dir: matches.get_one::<String>("output-dir").cloned(),
    };
    let run = Run {
        millis_per_sample: matches.get_one::<i64>("ms-per-sample").copied().unwrap_or(0),
        smoothing: matches.get_one::<i64>("smoothing").copied().unwrap_or(0),
        properties: &properties,
        json: matches.get_flag("json"),
        export_options: &export_options,
    };

    debug!("Input patterns: {file_patterns:?}");
    let valid_paths = collect_paths(&file_patterns);
    debug!("Found {} valid files to process", valid_paths.len());

    if valid_paths.is_empty() {
        eprintln!("Error: No valid files found to process.");
        eprintln!("Supported extensions: .SRT, .JSON (case-insensitive)");
        eprintln!("Input patterns were: {file_patterns:?}");
        std::process::exit(1);
    }

    let mut processed_files = 0;

    if matches.get_flag("merge") {
        let inputs = valid_paths
            .iter()
            .map(|path| read_input(path))
            .collect::<Result<Vec<_>>>()?;
        let dataset = Dataset::from_inputs(inputs)?;
        processed_files = dataset.len();
        let export_input = valid_paths[0].with_file_name("merged.srt");
        run.process(dataset, &export_input)?;
    } else {
        for (index, path) in valid_paths.iter().enumerate() {
            if index > 0 {
                println!();
            }
            let result = read_input(path).and_then(|input| {
                let mut dataset = Dataset::new();
                dataset.register(input)?;
                run.process(dataset, path)
            });
            match result {
                Ok(()) => processed_files += 1,
                Err(e) => {
                    eprintln!("Error processing {}: {e:#}", path.display());
                    eprintln!("Continuing with next file...");
                }
            }
        }
    }

    if processed_files == 0 {
        eprintln!(
            "Error: No files were successfully processed out of {} files found.",
            valid_paths.len()
        );
        eprintln!("Use --debug flag for more detailed error information.");
        std::process::exit(1);
    }

    Ok(())
}
