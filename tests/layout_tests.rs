//! Per-layout parsing checks against recorded sample files

use approx::assert_relative_eq;
use srt_telemetry::{
    build_session, detect_format, Dataset, Field, Format, HomeSource, Layout, RawMetadata,
};

const MAVIC_PRO: &str = include_str!("fixtures/mavic_pro.SRT");
const OLD_FORMAT: &str = include_str!("fixtures/old_format.SRT");
const MAVIC_PRO_BUGGY: &str = include_str!("fixtures/mavic_pro_buggy.SRT");
const P4P_SAMPLE: &str = include_str!("fixtures/p4p_sample.SRT");
const P4_RTK: &str = include_str!("fixtures/p4_rtk.SRT");
const MAVIC_2_STYLE: &str = include_str!("fixtures/mavic_2_style.SRT");
const MAVIC_AIR: &str = include_str!("fixtures/mavic_air.SRT");
const MAVIC_PRO_BUGGY_UNDATED: &str = include_str!("fixtures/mavic_pro_buggy_undated.SRT");

const ALL_FIXTURES: [(&str, &str, Layout); 7] = [
    ("mavic_pro.SRT", MAVIC_PRO, Layout::MavicPro),
    ("old_format.SRT", OLD_FORMAT, Layout::Legacy),
    ("mavic_pro_buggy.SRT", MAVIC_PRO_BUGGY, Layout::MavicProBuggy),
    ("p4p_sample.SRT", P4P_SAMPLE, Layout::Phantom4Pro),
    ("p4_rtk.SRT", P4_RTK, Layout::Rtk),
    ("mavic_2_style.SRT", MAVIC_2_STYLE, Layout::Mavic2),
    ("mavic_air.SRT", MAVIC_AIR, Layout::MavicAir),
];

fn dataset(name: &str, text: &str) -> Dataset {
    Dataset::from_text(name, text).unwrap()
}

#[test]
fn test_every_layout_is_detected() {
    for (name, text, layout) in ALL_FIXTURES {
        assert_eq!(
            detect_format(text, name).unwrap(),
            Format::Srt(layout),
            "wrong layout for {name}"
        );
    }
}

#[test]
fn test_every_layout_yields_packets_and_duration() {
    for (name, text, layout) in ALL_FIXTURES {
        let session = build_session(name, text).unwrap();
        assert_eq!(session.layout, Some(layout));
        assert!(!session.packets.is_empty(), "{name} has no packets");

        let ds = dataset(name, text);
        let metadata = ds.metadata(None).unwrap();
        assert!(metadata.stats.duration_ms >= 0, "{name} has negative duration");
        assert_eq!(metadata.packets.len(), session.packets.len());
    }
}

#[test]
fn test_mavic_pro_exposure_and_home() {
    let ds = dataset("mavic_pro.SRT", MAVIC_PRO);
    let stats = &ds.metadata(None).unwrap().stats;

    assert_relative_eq!(stats.field(Field::FNumber).unwrap().avg, 2.2);
    assert_relative_eq!(stats.field(Field::Iso).unwrap().min, 100.0);
    assert_relative_eq!(stats.field(Field::Shutter).unwrap().max, 60.0);
    assert_eq!(stats.duration_ms, 3000);

    assert_eq!(stats.home.len(), 1);
    assert_eq!(stats.home[0].source, HomeSource::Recorded);
    assert_relative_eq!(stats.home[0].point.latitude, -20.2532);
    assert_relative_eq!(stats.home[0].point.longitude, 149.0251);

    let distance = stats.distance_2d.unwrap();
    assert!(distance > 0.0 && distance < 100.0, "distance {distance}");
}

#[test]
fn test_old_format_aperture_and_barometer() {
    let ds = dataset("old_format.SRT", OLD_FORMAT);
    let stats = &ds.metadata(None).unwrap().stats;

    assert_relative_eq!(stats.field(Field::FNumber).unwrap().avg, 2.8);
    let barometer = stats.field(Field::AltitudeBarometer).unwrap();
    assert_relative_eq!(barometer.min, 1.9);
    assert_relative_eq!(barometer.max, 2.1);
    assert_eq!(stats.extra_field("HS").map(|s| s.max), Some(0.5));
}

#[test]
fn test_buggy_file_survives_bad_frames() {
    let ds = dataset("mavic_pro_buggy.SRT", MAVIC_PRO_BUGGY);
    let session = ds.session("mavic_pro_buggy.SRT").unwrap();

    assert_eq!(session.packets.len(), 3);
    assert_eq!(session.skipped_frames(), 1);
    // (0,0) before lock is not a position
    assert_eq!(session.packets[0].position, None);

    let stats = &ds.metadata(None).unwrap().stats;
    assert_relative_eq!(stats.field(Field::Satellites).unwrap().max, 18.0);
    assert_relative_eq!(stats.field(Field::Iso).unwrap().avg, 100.0);
    assert_eq!(stats.home.len(), 1);
    assert_eq!(stats.home[0].source, HomeSource::FirstFix);
    assert_relative_eq!(stats.home[0].point.longitude, 149.0251);
}

#[test]
fn test_undated_last_frame_keeps_duration_and_speed() {
    let ds = dataset("mavic_pro_buggy_undated.SRT", MAVIC_PRO_BUGGY_UNDATED);
    let session = ds.session("mavic_pro_buggy_undated.SRT").unwrap();
    assert!(session.defects.is_empty(), "{:?}", session.defects);

    let metadata = ds.metadata(None).unwrap();
    let first = metadata.packets[0].timestamp_ms;
    assert_eq!(metadata.packets[2].timestamp_ms, first + 2000);
    assert_eq!(metadata.stats.duration_ms, 2000);

    let distance = metadata.stats.distance_2d.unwrap();
    let speed = metadata.stats.speed.unwrap();
    assert!(distance > 0.0);
    assert_relative_eq!(speed.two_d.avg, distance / 2.0 * 3.6, epsilon = 1e-9);
}

#[test]
fn test_phantom_4_pro_values() {
    let ds = dataset("p4p_sample.SRT", P4P_SAMPLE);
    let stats = &ds.metadata(None).unwrap().stats;

    assert_relative_eq!(stats.field(Field::Satellites).unwrap().max, 18.0);
    assert_relative_eq!(stats.field(Field::FNumber).unwrap().avg, 3.2);
    assert_relative_eq!(stats.field(Field::Shutter).unwrap().min, 800.0);
    assert_relative_eq!(stats.field(Field::Latitude).unwrap().min, 41.3880);
    assert!(stats.extra_field("H_S").is_some());
}

#[test]
fn test_rtk_values() {
    let ds = dataset("p4_rtk.SRT", P4_RTK);
    let metadata = ds.metadata(None).unwrap();
    let stats = &metadata.stats;

    assert_relative_eq!(stats.field(Field::Satellites).unwrap().max, 15.0);
    assert_relative_eq!(stats.field(Field::FNumber).unwrap().avg, 5.6);
    assert!(stats.field(Field::GimbalYaw).is_some());
    assert!(stats.field(Field::AircraftPitch).is_some());
    assert!(stats.extra_field("V_S").unwrap().min < 0.0);

    // RTK wins over the plain GPS tuple
    let first = metadata.packets[0].position.unwrap();
    assert_relative_eq!(first.latitude, 39.978612);
    assert_relative_eq!(first.longitude, 116.310234);
    assert_relative_eq!(metadata.packets[0].altitude_gps.unwrap(), 47.123);
}

#[test]
fn test_mavic_2_values() {
    let ds = dataset("mavic_2_style.SRT", MAVIC_2_STYLE);
    let metadata = ds.metadata(None).unwrap();
    let stats = &metadata.stats;

    assert_eq!(metadata.packets.len(), 6);
    assert_relative_eq!(stats.field(Field::FNumber).unwrap().avg, 2.2);
    assert_relative_eq!(stats.field(Field::Ev).unwrap().avg, 0.0);
    assert_relative_eq!(stats.field(Field::FocalLength).unwrap().max, 280.0);
    assert_relative_eq!(stats.field(Field::Shutter).unwrap().max, 500.0);
    assert_relative_eq!(stats.field(Field::AltitudeGps).unwrap().min, 98.465);
    assert_eq!(stats.duration_ms, 167);
}

#[test]
fn test_mavic_air_has_no_gps_stats() {
    let ds = dataset("mavic_air.SRT", MAVIC_AIR);
    let stats = &ds.metadata(None).unwrap().stats;

    assert_eq!(stats.distance_2d, None);
    assert_eq!(stats.distance_3d, None);
    assert_eq!(stats.speed, None);
    assert!(stats.home.is_empty());
    assert_eq!(stats.field(Field::Latitude), None);

    assert_relative_eq!(stats.field(Field::Iso).unwrap().max, 200.0);
    assert_relative_eq!(stats.field(Field::FNumber).unwrap().avg, 2.8);
    assert_relative_eq!(stats.field(Field::Ev).unwrap().min, -0.3);
}

#[test]
fn test_raw_metadata_keeps_timecode() {
    for (name, text, _) in ALL_FIXTURES {
        let ds = dataset(name, text);
        let RawMetadata::Single(frames) = ds.raw_metadata(None).unwrap() else {
            panic!("expected a single input for {name}");
        };
        assert!(!frames.is_empty());
        assert!(
            frames.iter().all(|frame| frame.contains_key("TIMECODE")),
            "{name} lost its timecode"
        );
    }
}
