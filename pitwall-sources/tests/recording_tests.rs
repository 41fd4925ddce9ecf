//! Integration tests for NDJSON recordings

use pitwall_core::units::Liters;
use pitwall_core::{TelemetrySnapshot, TelemetrySource};
use pitwall_sources::{DemoSource, RecordingSource, RecordingWriter};
use std::fs;
use tempfile::TempDir;

fn record_demo(path: &std::path::Path, count: usize) -> Vec<TelemetrySnapshot> {
    let mut demo = DemoSource::new();
    demo.start().unwrap();
    let mut writer = RecordingWriter::create(path).unwrap();
    let mut snapshots = Vec::new();
    for _ in 0..count {
        let snapshot = demo.read_snapshot().unwrap().unwrap();
        writer.write(&snapshot).unwrap();
        snapshots.push(snapshot);
    }
    writer.flush().unwrap();
    assert_eq!(writer.written(), count);
    snapshots
}

#[test]
fn test_recording_detect_requires_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.ndjson");
    let source = RecordingSource::new(&path);
    assert!(!source.detect());
    assert_eq!(source.name(), "Recording (session)");

    fs::write(&path, "").unwrap();
    assert!(source.detect());
}

#[test]
fn test_recording_start_fails_for_missing_file() {
    let dir = TempDir::new().unwrap();
    let mut source = RecordingSource::new(dir.path().join("missing.ndjson"));
    assert!(source.start().is_err());
    assert!(!source.is_active());
}

#[test]
fn test_recording_plays_back_in_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sessions").join("demo.ndjson");
    let recorded = record_demo(&path, 5);

    let mut source = RecordingSource::new(&path);
    source.start().unwrap();
    assert!(source.is_active());

    for expected in &recorded {
        let snapshot = source.read_snapshot().unwrap().unwrap();
        assert_eq!(snapshot.timestamp, expected.timestamp);
        assert_eq!(snapshot.track_id, expected.track_id);
        assert_eq!(snapshot.cars.len(), expected.cars.len());
        assert!((snapshot.fuel_left.0 - expected.fuel_left.0).abs() < 1e-3);
    }
    assert!(source.read_snapshot().unwrap().is_none());
    assert_eq!(source.played(), 5);
}

#[test]
fn test_recording_skips_blank_lines_and_defaults_fields() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sparse.ndjson");
    fs::write(
        &path,
        "{\"track_id\":\"Monza\",\"fuel_left\":42.5}\n\n   \n{\"track_id\":\"Monza\"}\n",
    )
    .unwrap();

    let mut source = RecordingSource::new(&path);
    source.start().unwrap();
    let first = source.read_snapshot().unwrap().unwrap();
    assert_eq!(first.track_id, "Monza");
    assert_eq!(first.fuel_left, Liters(42.5));
    let second = source.read_snapshot().unwrap().unwrap();
    assert_eq!(second.fuel_left, Liters(0.0));
    assert!(source.read_snapshot().unwrap().is_none());
}

#[test]
fn test_recording_reports_corrupt_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.ndjson");
    fs::write(&path, "{\"track_id\":\"Monza\"}\nnot json\n").unwrap();

    let mut source = RecordingSource::new(&path);
    source.start().unwrap();
    assert!(source.read_snapshot().unwrap().is_some());
    let err = source.read_snapshot().unwrap_err();
    assert!(err.to_string().contains("broken.ndjson:2"), "{err}");
}

#[test]
fn test_looping_recording_restarts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("loop.ndjson");
    let recorded = record_demo(&path, 2);

    let mut source = RecordingSource::new(&path).looping(true);
    source.start().unwrap();
    for _ in 0..2 {
        source.read_snapshot().unwrap().unwrap();
    }
    let again = source.read_snapshot().unwrap().unwrap();
    assert_eq!(again.timestamp, recorded[0].timestamp);
}

#[test]
fn test_writer_appends_to_existing_recording() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("append.ndjson");
    record_demo(&path, 2);
    record_demo(&path, 3);

    let lines = fs::read_to_string(&path).unwrap();
    assert_eq!(lines.lines().count(), 5);
}
