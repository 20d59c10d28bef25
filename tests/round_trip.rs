// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Save/load round trips through CSV track files and project documents.

use pyrotrack::io::csv_format::read_track_file;
use pyrotrack::io::decisions::{Decision, DecisionPort, NonInteractive, UnitDecision};
use pyrotrack::models::coordinates::CoordinateSystem;
use pyrotrack::models::project::VideoInfo;
use pyrotrack::models::scale::DisplayUnit;
use pyrotrack::models::track::{Point, TrackVisibilityMode};
use pyrotrack::{Diagnostics, Error, LoadStatus, SaveOutcome, Session};
use std::path::Path;

fn video() -> VideoInfo {
    VideoInfo::new("launch.mp4", 640, 100, 50, 25.0)
}

fn session_with_points(points: &[(u32, f64, f64, f64)]) -> Session {
    let mut session = Session::new();
    session.set_video(Some(video()));
    session.tracks_mut().create_new_track();
    for &(frame, time_ms, x, y) in points {
        assert!(session.tracks_mut().add_point(frame, time_ms, x, y));
    }
    session
}

fn load_csv(path: &Path) -> (Session, Diagnostics) {
    let mut session = Session::new();
    session.set_video(Some(video()));
    let mut diagnostics = Diagnostics::new();
    let status = session
        .load_tracks_csv(path, &mut NonInteractive::default(), &mut diagnostics)
        .unwrap();
    assert_eq!(status, LoadStatus::Loaded, "{:?}", diagnostics.warnings());
    (session, diagnostics)
}

fn assert_close(actual: (f64, f64), expected: (f64, f64)) {
    assert!(
        (actual.0 - expected.0).abs() < 1e-3 && (actual.1 - expected.1).abs() < 1e-3,
        "{actual:?} != {expected:?}"
    );
}

struct AlwaysMeters;

impl DecisionPort for AlwaysMeters {
    fn choose_save_units(&mut self, _display_in_meters: bool, _scale: f64) -> UnitDecision {
        UnitDecision::ProceedInMeters
    }

    fn confirm_overwrite(&mut self, _path: &Path) -> Decision {
        Decision::Proceed
    }

    fn confirm_metadata_mismatch(&mut self, _warnings: &[String]) -> Decision {
        Decision::Proceed
    }
}

#[test]
fn top_left_pixels_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracks.csv");
    let session = session_with_points(&[(0, 0.0, 10.0, 20.0)]);

    let outcome = session
        .save_tracks_csv(&path, &mut NonInteractive::default())
        .unwrap();
    assert_eq!(
        outcome,
        SaveOutcome::Saved {
            units: DisplayUnit::Pixels,
            point_count: 1
        }
    );

    let (loaded, diagnostics) = load_csv(&path);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics.warnings());
    assert_eq!(
        loaded.tracks().all_track_data(),
        vec![vec![Point::new(0, 0.0, 10.0, 20.0)]]
    );
}

#[test]
fn bottom_left_writes_flipped_y_and_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracks.csv");
    let mut session = session_with_points(&[(0, 0.0, 10.0, 20.0)]);
    session.transformer_mut().set_mode(CoordinateSystem::BottomLeft);

    session
        .write_tracks_csv(&path, DisplayUnit::Pixels)
        .unwrap();

    let file = read_track_file(&path).unwrap();
    assert_eq!(file.get("Coordinate System Mode"), Some("BOTTOM_LEFT"));
    assert_eq!(file.get("Coordinate System Height"), Some("100"));
    assert_close((file.rows[0].x, file.rows[0].y), (10.0, 80.0));

    let (loaded, _) = load_csv(&path);
    let point = loaded.tracks().all_track_data()[0][0];
    assert_close((point.x, point.y), (10.0, 20.0));
    assert_eq!(loaded.transformer().mode(), CoordinateSystem::BottomLeft);
}

#[test]
fn file_system_wins_over_live_system_on_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracks.csv");
    let mut session = session_with_points(&[(3, 120.0, 15.5, 42.25)]);
    session.transformer_mut().set_custom_origin(5.0, 50.0);
    session.write_tracks_csv(&path, DisplayUnit::Pixels).unwrap();

    // The reading session starts in Bottom-Left; the file recorded Custom.
    let mut reader = Session::new();
    reader.set_video(Some(video()));
    reader.transformer_mut().set_mode(CoordinateSystem::BottomLeft);
    let mut diagnostics = Diagnostics::new();
    reader
        .load_tracks_csv(&path, &mut NonInteractive::default(), &mut diagnostics)
        .unwrap();

    let point = reader.tracks().all_track_data()[0][0];
    assert_close((point.x, point.y), (15.5, 42.25));
    assert_eq!(reader.transformer().mode(), CoordinateSystem::Custom);
    assert_eq!(reader.transformer().current_origin_tl(), (5.0, 50.0));
}

#[test]
fn meters_round_trip_through_recorded_scale() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracks.csv");
    let mut session = session_with_points(&[(0, 0.0, 100.0, 200.0)]);
    session.scale_mut().set_scale(Some(0.002), false, None);
    session.scale_mut().set_display_in_meters(true);

    let outcome = session.save_tracks_csv(&path, &mut AlwaysMeters).unwrap();
    assert!(matches!(
        outcome,
        SaveOutcome::Saved {
            units: DisplayUnit::Meters,
            ..
        }
    ));

    let file = read_track_file(&path).unwrap();
    assert_eq!(file.get("Data Units"), Some("m"));
    assert_eq!(file.get("Scale Factor (m/px)"), Some("0.002"));
    assert_close((file.rows[0].x, file.rows[0].y), (0.2, 0.4));

    let mut reader = Session::new();
    reader.set_video(Some(VideoInfo::new("launch.mp4", 640, 480, 50, 25.0)));
    let mut diagnostics = Diagnostics::new();
    reader
        .load_tracks_csv(&path, &mut NonInteractive::default(), &mut diagnostics)
        .unwrap();
    let point = reader.tracks().all_track_data()[0][0];
    assert_close((point.x, point.y), (100.0, 200.0));
    assert_eq!(reader.scale().scale_m_per_px(), Some(0.002));
    assert!(reader.scale().display_in_meters());
}

#[test]
fn non_interactive_save_defaults_to_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracks.csv");
    let mut session = session_with_points(&[(0, 0.0, 100.0, 50.0)]);
    session.scale_mut().set_scale(Some(0.01), false, None);
    session.scale_mut().set_display_in_meters(true);

    let outcome = session
        .save_tracks_csv(&path, &mut NonInteractive::default())
        .unwrap();
    assert!(matches!(
        outcome,
        SaveOutcome::Saved {
            units: DisplayUnit::Pixels,
            ..
        }
    ));
    assert_eq!(read_track_file(&path).unwrap().get("Data Units"), Some("px"));
}

#[test]
fn meters_file_without_scale_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracks.csv");
    std::fs::write(
        &path,
        "# Data Units: m\n# Scale Factor (m/px): N/A\ntrack_id,frame_index,time_ms,x,y\n1,0,0,0.1,0.1\n",
    )
    .unwrap();

    let mut session = Session::new();
    let result = session.load_tracks_csv(
        &path,
        &mut NonInteractive::default(),
        &mut Diagnostics::new(),
    );
    assert!(matches!(result, Err(Error::MissingScale)));
}

#[test]
fn frame_equal_to_frame_count_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracks.csv");
    std::fs::write(
        &path,
        "track_id,frame_index,time_ms,x,y\n1,49,1960,1,1\n1,50,2000,2,2\n",
    )
    .unwrap();

    let mut session = Session::new();
    session.set_video(Some(video()));
    let mut diagnostics = Diagnostics::new();
    let status = session
        .load_tracks_csv(&path, &mut NonInteractive::default(), &mut diagnostics)
        .unwrap();

    assert_eq!(status, LoadStatus::Loaded);
    let frames: Vec<u32> = session.tracks().all_track_data()[0]
        .iter()
        .map(|p| p.frame_index)
        .collect();
    assert_eq!(frames, vec![49]);
    assert!(diagnostics
        .warnings()
        .iter()
        .any(|w| w.contains("Frame index out of video range")));
}

#[test]
fn format_error_leaves_tracks_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracks.csv");
    std::fs::write(&path, "track_id,frame_index,time_ms,x,y\n1,0,0,1,oops\n").unwrap();

    let mut session = session_with_points(&[(0, 0.0, 5.0, 5.0)]);
    let result = session.load_tracks_csv(
        &path,
        &mut NonInteractive::default(),
        &mut Diagnostics::new(),
    );
    assert!(matches!(result, Err(Error::Format { line: 2, .. })));
    assert_eq!(session.tracks().track_count(), 1);
}

#[test]
fn project_round_trip_in_json_and_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with_points(&[(0, 0.0, 10.0, 20.0), (4, 160.0, 12.5, 22.75)]);
    session.tracks_mut().create_new_track();
    session.tracks_mut().add_point(2, 80.0, 300.0, 60.0);
    session
        .tracks_mut()
        .set_track_visibility_mode(1, TrackVisibilityMode::Hidden);
    session.transformer_mut().set_custom_origin(320.0, 50.0);
    session.scale_mut().set_defined_scale_line(0.0, 0.0, 100.0, 0.0);
    session.scale_mut().set_scale(Some(0.05), true, None);
    session
        .tracks_mut()
        .add_measurement_line(Point::new(1, 40.0, 10.0, 10.0), Point::new(1, 40.0, 40.0, 50.0))
        .unwrap();

    for name in ["project.json", "project.yml"] {
        let path = dir.path().join(name);
        let outcome = session
            .save_project(&path, &mut NonInteractive::default())
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved { point_count: 3, .. }));

        let mut loaded = Session::new();
        loaded.set_video(Some(video()));
        let mut diagnostics = Diagnostics::new();
        let status = loaded.load_project(&path, &mut diagnostics).unwrap();

        assert_eq!(status, LoadStatus::Loaded, "{name}");
        assert!(diagnostics.is_empty(), "{name}: {:?}", diagnostics.warnings());
        assert_eq!(loaded.tracks().all_track_data(), session.tracks().all_track_data());
        assert_eq!(
            loaded.tracks().measurement_lines(),
            session.tracks().measurement_lines()
        );
        assert_eq!(
            loaded.tracks().track_visibility_mode(1),
            TrackVisibilityMode::Hidden
        );
        assert_eq!(loaded.transformer().metadata(), session.transformer().metadata());
        assert_eq!(loaded.scale().scale_m_per_px(), Some(0.05));
        assert_eq!(
            loaded.scale().defined_scale_line(),
            session.scale().defined_scale_line()
        );
    }
}

#[test]
fn project_mismatch_is_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project.json");
    let session = session_with_points(&[(0, 0.0, 10.0, 20.0)]);
    session
        .save_project(&path, &mut NonInteractive::default())
        .unwrap();

    let mut loaded = Session::new();
    loaded.set_video(Some(VideoInfo::new("other.mp4", 640, 100, 60, 25.0)));
    let mut diagnostics = Diagnostics::new();
    let status = loaded.load_project(&path, &mut diagnostics).unwrap();

    assert_eq!(status, LoadStatus::Loaded);
    assert_eq!(diagnostics.len(), 2, "{:?}", diagnostics.warnings());
    assert_eq!(loaded.tracks().track_count(), 1);
}
