// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Document context and the save/load pipelines.
//!
//! A [`Session`] exclusively owns the track store, the coordinate
//! transformer and the scale manager, and composes them when data crosses
//! the file boundary:
//!
//! - write: canonical pixels → display coordinate system → meters (optional)
//! - read: stored values → pixels (optional) → canonical, using the
//!   coordinate system the *file* recorded
//!
//! Live coordinate and scale settings are only updated from a file after its
//! tracks loaded successfully.

use crate::config::{self, NOT_AVAILABLE};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::io::csv_format::{self, TrackFile};
use crate::io::decisions::{Decision, DecisionPort, UnitDecision};
use crate::io::serialization;
use crate::models::coordinates::{CoordinateMetadata, CoordinateSystem, CoordinateTransformer};
use crate::models::project::{
    MetaValue, ProjectData, ProjectElement, ProjectInfo, ProjectMetadata, VideoInfo,
};
use crate::models::scale::{DisplayUnit, ScaleLine, ScaleManager};
use crate::models::track::{RawPoint, TrackVisibilityMode, VisualElement};
use crate::models::track_manager::{RawLine, TrackManager, TrackSettings, VideoBounds};
use crate::util::geometry::format_significant;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// UI preferences stored in project files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preferences {
    pub show_measurement_line_lengths: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            show_measurement_line_lengths: true,
        }
    }
}

/// Result of a save request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { units: DisplayUnit, point_count: usize },
    /// A confirmation was declined; nothing was written.
    Cancelled,
}

/// Result of a load request. Warnings go to the caller's [`Diagnostics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    /// A confirmation was declined; the session is unchanged.
    Cancelled,
    /// Track processing failed; tracks were reset and settings left alone.
    Failed,
}

/// Owns the managers for one tracking document.
#[derive(Debug, Default)]
pub struct Session {
    tracks: TrackManager,
    transformer: CoordinateTransformer,
    scale: ScaleManager,
    video: Option<VideoInfo>,
    preferences: Preferences,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracks(&self) -> &TrackManager {
        &self.tracks
    }

    pub fn tracks_mut(&mut self) -> &mut TrackManager {
        &mut self.tracks
    }

    pub fn transformer(&self) -> &CoordinateTransformer {
        &self.transformer
    }

    pub fn transformer_mut(&mut self) -> &mut CoordinateTransformer {
        &mut self.transformer
    }

    pub fn scale(&self) -> &ScaleManager {
        &self.scale
    }

    pub fn scale_mut(&mut self) -> &mut ScaleManager {
        &mut self.scale
    }

    pub fn video(&self) -> Option<&VideoInfo> {
        self.video.as_ref()
    }

    /// Set the active video context. Its height feeds the transformer.
    pub fn set_video(&mut self, video: Option<VideoInfo>) {
        if let Some(info) = &video {
            log::info!(
                "Video context: '{}' {}x{}, {} frames at {} fps",
                info.filename,
                info.width,
                info.height,
                info.frame_count,
                info.fps
            );
            if info.height > 0 {
                self.transformer.set_video_height(info.height);
            }
        }
        self.video = video;
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn preferences_mut(&mut self) -> &mut Preferences {
        &mut self.preferences
    }

    /// Track and measurement line visuals for `current_frame`.
    pub fn visual_elements(&self, current_frame: u32) -> Vec<VisualElement> {
        let mut elements = self.tracks.visual_elements(current_frame);
        elements.extend(self.tracks.measurement_line_visuals(
            current_frame,
            self.scale.scale_m_per_px(),
            self.preferences.show_measurement_line_lengths,
        ));
        elements
    }

    /// Clear tracks, coordinate and scale settings. The video context stays.
    pub fn reset(&mut self) {
        self.tracks.reset();
        self.transformer.reset();
        self.scale.reset();
        self.preferences = Preferences::default();
        if let Some(height) = self.video.as_ref().map(|v| v.height).filter(|h| *h > 0) {
            self.transformer.set_video_height(height);
        }
        log::info!("Session reset");
    }

    // --- CSV track files ---

    /// Save all tracks to a CSV file, asking `port` where a choice is needed.
    ///
    /// The unit question is only asked when meters are displayed and a scale
    /// is set; otherwise the file is written in pixels.
    pub fn save_tracks_csv(
        &self,
        path: &Path,
        port: &mut dyn DecisionPort,
    ) -> Result<SaveOutcome> {
        if path.exists() && port.confirm_overwrite(path) == Decision::Cancel {
            log::info!("Save to {} cancelled: file exists", path.display());
            return Ok(SaveOutcome::Cancelled);
        }

        let units = match (self.scale.display_in_meters(), self.scale.scale_m_per_px()) {
            (true, Some(scale)) => match port.choose_save_units(true, scale) {
                UnitDecision::ProceedInPixels => DisplayUnit::Pixels,
                UnitDecision::ProceedInMeters => DisplayUnit::Meters,
                UnitDecision::Cancel => {
                    log::info!("Save to {} cancelled at unit choice", path.display());
                    return Ok(SaveOutcome::Cancelled);
                }
            },
            _ => DisplayUnit::Pixels,
        };

        let point_count = self.write_tracks_csv(path, units)?;
        Ok(SaveOutcome::Saved { units, point_count })
    }

    /// Write all tracks to `path` in `units` without asking anything.
    ///
    /// Returns the number of rows written. Meters require a scale.
    pub fn write_tracks_csv(&self, path: &Path, units: DisplayUnit) -> Result<usize> {
        let scale = match units {
            DisplayUnit::Meters => Some(self.scale.scale_m_per_px().ok_or(Error::MissingScale)?),
            DisplayUnit::Pixels => None,
        };
        let rows = self.export_rows(scale);
        let metadata = self.csv_metadata(units);
        csv_format::write_track_file(path, &metadata, &rows, units)?;
        Ok(rows.len())
    }

    /// Canonical points converted to the display system and, with a scale, meters.
    fn export_rows(&self, scale_m_per_px: Option<f64>) -> Vec<RawPoint> {
        let mut rows = Vec::new();
        for (index, track) in self.tracks.tracks().iter().enumerate() {
            let track_id = (index + 1) as i64;
            for point in track.points() {
                let (mut x, mut y) = self.transformer.transform_point_for_display(point.x, point.y);
                if let Some(scale) = scale_m_per_px {
                    x *= scale;
                    y *= scale;
                }
                rows.push(RawPoint::new(
                    track_id,
                    i64::from(point.frame_index),
                    point.time_ms,
                    x,
                    y,
                ));
            }
        }
        rows
    }

    fn csv_metadata(&self, units: DisplayUnit) -> Vec<(String, String)> {
        fn pair(key: &str, value: impl ToString) -> (String, String) {
            (key.to_string(), value.to_string())
        }

        let video = self.video.clone().unwrap_or_default();
        let filename = if video.filename.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            video.filename.clone()
        };
        let coords = self.transformer.metadata();
        let scale = self
            .scale
            .scale_m_per_px()
            .map(|s| format_significant(s, config::SCALE_SIGNIFICANT_DIGITS))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        vec![
            pair(config::META_APP_NAME, config::APP_NAME),
            pair(config::META_APP_VERSION, config::APP_VERSION),
            pair(config::META_FILENAME, filename),
            pair(config::META_WIDTH, video.width),
            pair(config::META_HEIGHT, video.height),
            pair(config::META_FRAMES, video.frame_count),
            pair(config::META_FPS, video.fps),
            pair(config::META_DURATION, video.duration_ms),
            pair(config::META_COORD_SYSTEM_MODE, coords.mode),
            pair(config::META_COORD_ORIGIN_X_TL, coords.origin_x_tl),
            pair(config::META_COORD_ORIGIN_Y_TL, coords.origin_y_tl),
            pair(config::META_COORD_HEIGHT, coords.video_height),
            pair(config::META_SCALE_FACTOR_M_PER_PX, scale),
            pair(config::META_DATA_UNITS, units.as_str()),
        ]
    }

    /// Read a CSV track file and load it.
    pub fn load_tracks_csv(
        &mut self,
        path: &Path,
        port: &mut dyn DecisionPort,
        diagnostics: &mut Diagnostics,
    ) -> Result<LoadStatus> {
        let file = csv_format::read_track_file(path)?;
        self.load_track_file(&file, port, diagnostics)
    }

    /// Load parsed track-file contents, replacing all tracks.
    ///
    /// Stored values are converted back to canonical pixels using the unit,
    /// scale and coordinate system recorded in the file.
    pub fn load_track_file(
        &mut self,
        file: &TrackFile,
        port: &mut dyn DecisionPort,
        diagnostics: &mut Diagnostics,
    ) -> Result<LoadStatus> {
        for key in config::EXPECTED_CSV_METADATA_KEYS {
            if !file.contains_key(key) {
                diagnostics.warn(format!("Missing metadata key '{}'", key));
            }
        }
        let metadata = ProjectMetadata::from_text_pairs(&file.metadata);

        let mismatches = self.video_mismatches(&metadata);
        for message in &mismatches {
            diagnostics.warn(message.clone());
        }
        if !mismatches.is_empty() && port.confirm_metadata_mismatch(&mismatches) == Decision::Cancel
        {
            log::info!("Track file load cancelled after metadata mismatch");
            return Ok(LoadStatus::Cancelled);
        }

        let source = self.resolve_coordinates(&metadata, diagnostics);
        let scale = resolve_scale(&metadata, diagnostics);
        let units = match metadata.data_units.as_ref() {
            None => DisplayUnit::Pixels,
            Some(value) => match value.as_text().and_then(DisplayUnit::parse_label) {
                Some(units) => units,
                None => {
                    diagnostics.warn(format!(
                        "Unrecognized data units {:?}; assuming pixels",
                        value
                    ));
                    DisplayUnit::Pixels
                }
            },
        };
        let divisor = match units {
            DisplayUnit::Meters => Some(scale.ok_or(Error::MissingScale)?),
            DisplayUnit::Pixels => None,
        };

        let source_origin = source.effective_origin_tl();
        let raw_points: Vec<RawPoint> = file
            .rows
            .iter()
            .map(|row| {
                let (x, y) = match divisor {
                    Some(scale) => (row.x / scale, row.y / scale),
                    None => (row.x, row.y),
                };
                let (x_tl, y_tl) = self.transformer.transform_point_to_internal(
                    x,
                    y,
                    source.mode,
                    source_origin,
                    source.video_height,
                );
                RawPoint::new(row.track_id, row.frame_index, row.time_ms, x_tl, y_tl)
            })
            .collect();

        let bounds = self.validation_bounds(&metadata, diagnostics);
        let (success, warnings) = self.tracks.load_tracks_from_data(
            &raw_points,
            bounds.width,
            bounds.height,
            bounds.frame_count,
            bounds.fps,
        );
        diagnostics.extend_quiet(warnings);
        if !success {
            return Ok(LoadStatus::Failed);
        }

        self.apply_coordinates(source);
        if self.scale.scale_m_per_px() != scale {
            self.scale.set_scale(scale, false, None);
        }
        self.scale.set_display_in_meters(units == DisplayUnit::Meters);
        log::info!(
            "Loaded track file ({} system, {})",
            source.mode,
            units.as_str()
        );
        Ok(LoadStatus::Loaded)
    }

    // --- Project documents ---

    /// Snapshot the session as a project document. Points are canonical pixels.
    pub fn gather_project(&self) -> ProjectData {
        let video = self.video.clone().unwrap_or_default();
        let coords = self.transformer.metadata();
        let line = self.scale.defined_scale_line();
        let line_value = |pick: fn(&ScaleLine) -> f64| {
            line.as_ref()
                .map(|l| MetaValue::Number(pick(l)))
                .unwrap_or_else(|| MetaValue::from(NOT_AVAILABLE))
        };

        let metadata = ProjectMetadata {
            filename: Some(if video.filename.is_empty() {
                MetaValue::from(NOT_AVAILABLE)
            } else {
                MetaValue::from(video.filename.clone())
            }),
            width: Some(MetaValue::from(video.width)),
            height: Some(MetaValue::from(video.height)),
            frame_count: Some(MetaValue::from(video.frame_count)),
            fps: Some(MetaValue::from(video.fps)),
            duration_ms: Some(MetaValue::from(video.duration_ms)),
            coordinate_mode: Some(MetaValue::from(coords.mode.as_str())),
            origin_x_tl: Some(MetaValue::from(coords.origin_x_tl)),
            origin_y_tl: Some(MetaValue::from(coords.origin_y_tl)),
            coordinate_height: Some(MetaValue::from(coords.video_height)),
            scale_m_per_px: Some(
                self.scale
                    .scale_m_per_px()
                    .map(MetaValue::from)
                    .unwrap_or_else(|| MetaValue::from(NOT_AVAILABLE)),
            ),
            data_units: Some(MetaValue::from(config::UNITS_PIXELS)),
            display_in_meters: Some(MetaValue::from(self.scale.display_in_meters())),
            scale_line_p1x: Some(line_value(|l| l.p1x)),
            scale_line_p1y: Some(line_value(|l| l.p1y)),
            scale_line_p2x: Some(line_value(|l| l.p2x)),
            scale_line_p2y: Some(line_value(|l| l.p2y)),
            show_measurement_line_lengths: Some(MetaValue::from(
                self.preferences.show_measurement_line_lengths,
            )),
        };

        let track_count = self.tracks.track_count();
        let mut elements: Vec<ProjectElement> = self
            .tracks
            .tracks()
            .iter()
            .enumerate()
            .map(|(index, track)| ProjectElement::track(index + 1, track))
            .collect();
        elements.extend(
            self.tracks
                .measurement_lines()
                .iter()
                .enumerate()
                .map(|(index, line)| ProjectElement::measurement_line(track_count + index + 1, line)),
        );

        ProjectData {
            project_info: ProjectInfo::default(),
            metadata: Some(metadata),
            elements,
        }
    }

    /// Save the session as a project (JSON or YAML by extension).
    pub fn save_project(&self, path: &Path, port: &mut dyn DecisionPort) -> Result<SaveOutcome> {
        if path.exists() && port.confirm_overwrite(path) == Decision::Cancel {
            log::info!("Project save to {} cancelled: file exists", path.display());
            return Ok(SaveOutcome::Cancelled);
        }
        let data = self.gather_project();
        serialization::write_project(&data, path)?;
        let point_count = data
            .elements
            .iter()
            .filter(|e| e.is_track())
            .map(|e| e.data.len())
            .sum();
        Ok(SaveOutcome::Saved {
            units: DisplayUnit::Pixels,
            point_count,
        })
    }

    /// Read a project file and apply it.
    pub fn load_project(&mut self, path: &Path, diagnostics: &mut Diagnostics) -> Result<LoadStatus> {
        let data = serialization::read_project(path)?;
        self.apply_project(&data, diagnostics)
    }

    /// Apply a parsed project against the current video context.
    ///
    /// Mismatches with the live video and invalid metadata values are
    /// warnings. Settings are applied only if the tracks loaded.
    pub fn apply_project(
        &mut self,
        data: &ProjectData,
        diagnostics: &mut Diagnostics,
    ) -> Result<LoadStatus> {
        let metadata = data.metadata.as_ref().ok_or(Error::MissingMetadata)?;
        if data.project_info.app_name != config::APP_NAME {
            log::info!(
                "Project was written by '{}' {}",
                data.project_info.app_name,
                data.project_info.app_version
            );
        }

        for message in self.video_mismatches(metadata) {
            diagnostics.warn(message);
        }

        let coords = self.resolve_coordinates(metadata, diagnostics);
        let scale = resolve_scale(metadata, diagnostics);
        let line = resolve_scale_line(metadata, diagnostics);
        let display_in_meters = match metadata.display_in_meters.as_ref() {
            None => false,
            Some(value) => value.as_bool().unwrap_or_else(|| {
                diagnostics.warn(format!(
                    "Invalid '{}' value {:?}; using pixels",
                    config::META_DISPLAY_IN_METERS,
                    value
                ));
                false
            }),
        };
        let show_lengths = metadata
            .show_measurement_line_lengths
            .as_ref()
            .and_then(MetaValue::as_bool)
            .unwrap_or_else(|| {
                let default = Preferences::default().show_measurement_line_lengths;
                diagnostics.warn(format!(
                    "Setting '{}' missing or invalid in project. Defaulting to {}.",
                    config::META_SHOW_MEASUREMENT_LINE_LENGTHS,
                    default
                ));
                default
            });

        let elements = collect_project_elements(&data.elements, diagnostics);
        let video = self.validation_bounds(metadata, diagnostics);
        let bounds = VideoBounds {
            width: video.width,
            height: video.height,
            frame_count: video.frame_count,
            fps: video.fps,
        };
        let (success, warnings) = self.tracks.load_elements(
            &elements.points,
            &elements.settings,
            &elements.lines,
            bounds,
        );
        diagnostics.extend_quiet(warnings);
        if !success {
            log::error!("Project tracks failed to load; settings not applied");
            return Ok(LoadStatus::Failed);
        }

        self.apply_coordinates(coords);
        match line {
            Some(line) => {
                self.scale
                    .set_defined_scale_line(line.p1x, line.p1y, line.p2x, line.p2y);
                self.scale.set_scale(scale, true, None);
            }
            None => {
                self.scale.clear_defined_scale_line();
                self.scale.set_scale(scale, false, None);
            }
        }
        self.scale.set_display_in_meters(display_in_meters);
        self.preferences.show_measurement_line_lengths = show_lengths;

        log::info!(
            "Project applied: {} track(s), {} line(s), {} warning(s)",
            self.tracks.track_count(),
            self.tracks.line_count(),
            diagnostics.len()
        );
        Ok(LoadStatus::Loaded)
    }

    // --- Shared metadata handling ---

    /// Differences between recorded video properties and the live video.
    fn video_mismatches(&self, metadata: &ProjectMetadata) -> Vec<String> {
        let mut mismatches = Vec::new();
        let recorded_name = metadata.video_filename();
        let Some(video) = &self.video else {
            if let Some(name) = recorded_name {
                mismatches.push(format!(
                    "File metadata indicates video '{}', but no video is currently active.",
                    name
                ));
            }
            return mismatches;
        };

        if let Some(name) = recorded_name {
            if file_name(name) != file_name(&video.filename) {
                mismatches.push(format!(
                    "Saved video filename ('{}') differs from loaded ('{}').",
                    name, video.filename
                ));
            }
        }
        let checks = [
            ("width", &metadata.width, video.width),
            ("height", &metadata.height, video.height),
            ("frame count", &metadata.frame_count, video.frame_count),
        ];
        for (label, recorded, live) in checks {
            if let Some(value) = recorded.as_ref().and_then(MetaValue::as_u32) {
                if value != live {
                    mismatches.push(format!(
                        "Saved video {} ({}) mismatches loaded ({}).",
                        label, value, live
                    ));
                }
            }
        }
        mismatches
    }

    /// Coordinate system the metadata was written in, with fallbacks.
    fn resolve_coordinates(
        &self,
        metadata: &ProjectMetadata,
        diagnostics: &mut Diagnostics,
    ) -> CoordinateMetadata {
        let mode = match metadata.coordinate_mode.as_ref() {
            None => CoordinateSystem::TopLeft,
            Some(value) => match value.as_text().map(str::parse::<CoordinateSystem>) {
                Some(Ok(mode)) => mode,
                _ => {
                    diagnostics.warn(format!(
                        "Unrecognized coordinate system {:?}; using {}",
                        value,
                        CoordinateSystem::TopLeft
                    ));
                    CoordinateSystem::TopLeft
                }
            },
        };

        let mut origin = |value: &Option<MetaValue>, label: &str| match value {
            None => 0.0,
            Some(v) => v.as_f64().filter(|f| f.is_finite()).unwrap_or_else(|| {
                diagnostics.warn(format!("Invalid custom origin {} {:?}; using 0", label, v));
                0.0
            }),
        };
        let origin_x_tl = origin(&metadata.origin_x_tl, "X");
        let origin_y_tl = origin(&metadata.origin_y_tl, "Y");

        let positive = |value: &Option<MetaValue>| {
            value
                .as_ref()
                .and_then(MetaValue::as_u32)
                .filter(|h| *h > 0)
        };
        let video_height = match positive(&metadata.coordinate_height)
            .or_else(|| positive(&metadata.height))
        {
            Some(height) => height,
            None => {
                let live = self
                    .video
                    .as_ref()
                    .map(|v| v.height)
                    .filter(|h| *h > 0)
                    .unwrap_or_else(|| self.transformer.video_height());
                if live > 0 {
                    diagnostics.warn(format!(
                        "No valid video height recorded; using current height ({}px) for the coordinate context.",
                        live
                    ));
                } else if mode == CoordinateSystem::BottomLeft {
                    diagnostics.warn(
                        "No valid video height recorded or available; Bottom-Left origin falls back to Top-Left.",
                    );
                }
                live
            }
        };

        CoordinateMetadata {
            mode,
            origin_x_tl,
            origin_y_tl,
            video_height,
        }
    }

    /// Make the transformer match recorded settings, including the stored origin.
    fn apply_coordinates(&mut self, coords: CoordinateMetadata) {
        if coords.video_height > 0 {
            self.transformer.set_video_height(coords.video_height);
        }
        self.transformer
            .store_custom_origin(coords.origin_x_tl, coords.origin_y_tl);
        self.transformer.set_mode(coords.mode);
    }

    /// Video properties to validate loaded points against.
    ///
    /// The live video wins; without one the recorded properties are used.
    fn validation_bounds(
        &self,
        metadata: &ProjectMetadata,
        diagnostics: &mut Diagnostics,
    ) -> VideoInfo {
        if let Some(video) = self.video.as_ref().filter(|v| v.is_usable()) {
            return video.clone();
        }
        match VideoInfo::from_metadata(metadata) {
            Some(video) => video,
            None => {
                diagnostics.warn(
                    "Video context for point validation is invalid (dimensions/frames are zero). Points cannot be validated.",
                );
                VideoInfo::default()
            }
        }
    }
}

/// Recorded scale factor; `N/A` and invalid values mean no scale.
fn resolve_scale(metadata: &ProjectMetadata, diagnostics: &mut Diagnostics) -> Option<f64> {
    let value = metadata.scale_m_per_px.as_ref()?;
    if value.is_not_available() {
        return None;
    }
    let scale = value.as_f64().filter(|s| s.is_finite() && *s > 0.0);
    if scale.is_none() {
        diagnostics.warn(format!("Invalid scale factor {:?}. Scale not set.", value));
    }
    scale
}

/// Recorded defined scale line, if all four coordinates are present.
fn resolve_scale_line(
    metadata: &ProjectMetadata,
    diagnostics: &mut Diagnostics,
) -> Option<ScaleLine> {
    let values = [
        &metadata.scale_line_p1x,
        &metadata.scale_line_p1y,
        &metadata.scale_line_p2x,
        &metadata.scale_line_p2y,
    ];
    if values
        .iter()
        .any(|v| v.as_ref().map_or(true, MetaValue::is_not_available))
    {
        return None;
    }
    let coords: Option<Vec<f64>> = values
        .iter()
        .map(|v| v.as_ref().and_then(MetaValue::as_f64))
        .collect();
    match coords.as_deref() {
        Some(&[p1x, p1y, p2x, p2y]) => Some(ScaleLine::new(p1x, p1y, p2x, p2y)),
        _ => {
            diagnostics.warn("Invalid scale line coordinate format. Defined scale line ignored.");
            None
        }
    }
}

/// Project elements split into loader input.
#[derive(Debug, Default)]
struct CollectedElements {
    points: Vec<RawPoint>,
    settings: BTreeMap<i64, TrackSettings>,
    lines: Vec<RawLine>,
}

/// Sort project elements into track points, track settings and lines.
///
/// Elements with unknown types, invalid or duplicate ids are skipped, as
/// are individual points with missing or non-numeric fields.
fn collect_project_elements(
    elements: &[ProjectElement],
    diagnostics: &mut Diagnostics,
) -> CollectedElements {
    let mut collected = CollectedElements::default();
    let mut seen = BTreeSet::new();

    for element in elements {
        let is_track = element.is_track();
        if !is_track && !element.is_measurement_line() {
            diagnostics.warn(format!(
                "Skipping element ID {} ('{}'): unsupported type '{}'.",
                element.id, element.name, element.kind
            ));
            continue;
        }
        if element.id <= 0 {
            diagnostics.warn(format!(
                "Skipping element '{}' due to invalid ID {}.",
                element.name, element.id
            ));
            continue;
        }
        if !seen.insert(element.id) {
            diagnostics.warn(format!(
                "Skipping element ID {} ('{}'): duplicate ID.",
                element.id, element.name
            ));
            continue;
        }

        let visibility = element
            .visibility_mode
            .parse::<TrackVisibilityMode>()
            .unwrap_or_else(|_| {
                diagnostics.warn(format!(
                    "Element ID {}: invalid visibility mode '{}'. Using {}.",
                    element.id,
                    element.visibility_mode,
                    TrackVisibilityMode::default()
                ));
                TrackVisibilityMode::default()
            });

        let mut points = Vec::with_capacity(element.data.len());
        for point in &element.data {
            match point.to_raw(element.id) {
                Some(raw) => points.push(raw),
                None => diagnostics.warn(format!(
                    "Point in Element ID {}: Contains invalid or missing coordinate/frame/time data. Skipped.",
                    element.id
                )),
            }
        }

        if !is_track {
            collected.lines.push(RawLine {
                line_id: element.id,
                visibility,
                points,
            });
            continue;
        }

        let analysis_state = match &element.analysis_state {
            None => None,
            Some(state) if state.is_object() => Some(state.clone()),
            Some(_) => {
                diagnostics.warn(format!(
                    "Track ID {} had invalid 'analysis_state'. Using default.",
                    element.id
                ));
                None
            }
        };
        collected.settings.insert(
            element.id,
            TrackSettings {
                visibility,
                analysis_state,
            },
        );
        collected.points.extend(points);
    }
    collected
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::decisions::NonInteractive;
    use crate::models::track::Point;

    /// Port with scripted answers that records what it was asked.
    #[derive(Default)]
    struct Scripted {
        units: Option<UnitDecision>,
        mismatch: Option<Decision>,
        asked_units: bool,
        asked_mismatch: bool,
    }

    impl DecisionPort for Scripted {
        fn choose_save_units(&mut self, _display_in_meters: bool, _scale: f64) -> UnitDecision {
            self.asked_units = true;
            self.units.unwrap_or(UnitDecision::ProceedInPixels)
        }

        fn confirm_overwrite(&mut self, _path: &Path) -> Decision {
            Decision::Proceed
        }

        fn confirm_metadata_mismatch(&mut self, _warnings: &[String]) -> Decision {
            self.asked_mismatch = true;
            self.mismatch.unwrap_or(Decision::Proceed)
        }
    }

    fn session_with_point(x: f64, y: f64) -> Session {
        let mut session = Session::new();
        session.set_video(Some(VideoInfo::new("clip.mp4", 640, 480, 100, 25.0)));
        session.tracks_mut().create_new_track();
        session.tracks_mut().add_point(0, 0.0, x, y);
        session
    }

    #[test]
    fn test_units_only_asked_when_displaying_meters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        let mut session = session_with_point(10.0, 20.0);

        let mut port = Scripted::default();
        session.save_tracks_csv(&path, &mut port).unwrap();
        assert!(!port.asked_units);

        session.scale_mut().set_scale(Some(0.5), false, None);
        session.scale_mut().set_display_in_meters(true);
        let mut port = Scripted {
            units: Some(UnitDecision::ProceedInMeters),
            ..Default::default()
        };
        let outcome = session.save_tracks_csv(&path, &mut port).unwrap();
        assert!(port.asked_units);
        assert_eq!(
            outcome,
            SaveOutcome::Saved {
                units: DisplayUnit::Meters,
                point_count: 1
            }
        );

        let mut port = Scripted {
            units: Some(UnitDecision::Cancel),
            ..Default::default()
        };
        assert_eq!(
            session.save_tracks_csv(&path, &mut port).unwrap(),
            SaveOutcome::Cancelled
        );
    }

    #[test]
    fn test_overwrite_refused_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "keep").unwrap();
        let session = session_with_point(1.0, 1.0);

        let outcome = session
            .save_tracks_csv(&path, &mut NonInteractive::default())
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Cancelled);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep");
    }

    #[test]
    fn test_meters_without_scale_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with_point(1.0, 1.0);
        let result = session.write_tracks_csv(&dir.path().join("t.csv"), DisplayUnit::Meters);
        assert!(matches!(result, Err(Error::MissingScale)));
    }

    #[test]
    fn test_metadata_mismatch_can_cancel_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        let source = session_with_point(10.0, 20.0);
        source.write_tracks_csv(&path, DisplayUnit::Pixels).unwrap();

        let mut target = Session::new();
        target.set_video(Some(VideoInfo::new("other.mp4", 640, 480, 100, 25.0)));
        let mut port = Scripted {
            mismatch: Some(Decision::Cancel),
            ..Default::default()
        };
        let mut diagnostics = Diagnostics::new();
        let status = target
            .load_tracks_csv(&path, &mut port, &mut diagnostics)
            .unwrap();

        assert!(port.asked_mismatch);
        assert_eq!(status, LoadStatus::Cancelled);
        assert_eq!(target.tracks().track_count(), 0);
        assert!(diagnostics.warnings()[0].contains("other.mp4"));
    }

    #[test]
    fn test_load_with_every_point_dropped_still_succeeds() {
        let mut session = Session::new();
        session.set_video(Some(VideoInfo::new("clip.mp4", 10, 10, 1, 0.0)));
        let file = TrackFile {
            metadata: vec![
                ("Coordinate System Mode".to_string(), "BOTTOM_LEFT".to_string()),
                ("Data Units".to_string(), "px".to_string()),
            ],
            rows: vec![RawPoint::new(1, 5, 0.0, 1.0, 1.0)],
        };
        let mut diagnostics = Diagnostics::new();
        let status = session
            .load_track_file(&file, &mut NonInteractive::default(), &mut diagnostics)
            .unwrap();

        // Every point was dropped, but processing itself succeeded.
        assert_eq!(status, LoadStatus::Loaded);
        assert_eq!(session.tracks().track_count(), 0);
        assert!(diagnostics
            .warnings()
            .iter()
            .any(|w| w.contains("Missing metadata key 'FPS'")));
    }

    #[test]
    fn test_gather_project_records_settings() {
        let mut session = session_with_point(5.0, 6.0);
        session.transformer_mut().set_custom_origin(1.0, 2.0);
        session.scale_mut().set_defined_scale_line(0.0, 0.0, 10.0, 0.0);
        session.scale_mut().set_scale(Some(0.1), true, None);
        session
            .tracks_mut()
            .set_track_visibility_mode(0, TrackVisibilityMode::AlwaysVisible);

        let data = session.gather_project();
        let meta = data.metadata.unwrap();
        assert_eq!(meta.coordinate_mode, Some(MetaValue::from("CUSTOM")));
        assert_eq!(meta.scale_m_per_px, Some(MetaValue::Number(0.1)));
        assert_eq!(meta.scale_line_p2x, Some(MetaValue::Number(10.0)));
        assert_eq!(meta.data_units, Some(MetaValue::from("px")));
        assert_eq!(data.elements.len(), 1);
        assert_eq!(data.elements[0].visibility_mode, "ALWAYS_VISIBLE");
        assert_eq!(
            data.elements[0].data[0].to_raw(1),
            Some(RawPoint::new(1, 0, 0.0, 5.0, 6.0))
        );
    }

    #[test]
    fn test_apply_project_requires_metadata() {
        let mut session = Session::new();
        let result = session.apply_project(&ProjectData::default(), &mut Diagnostics::new());
        assert!(matches!(result, Err(Error::MissingMetadata)));
    }

    #[test]
    fn test_apply_project_restores_settings_and_tracks() {
        let mut source = session_with_point(5.0, 6.0);
        source.transformer_mut().set_custom_origin(1.0, 2.0);
        source.transformer_mut().set_mode(CoordinateSystem::BottomLeft);
        source.scale_mut().set_defined_scale_line(0.0, 0.0, 10.0, 0.0);
        source.scale_mut().set_scale(Some(0.1), true, None);
        source.scale_mut().set_display_in_meters(true);
        source.preferences_mut().show_measurement_line_lengths = false;
        let data = source.gather_project();

        let mut target = Session::new();
        target.set_video(Some(VideoInfo::new("clip.mp4", 640, 480, 100, 25.0)));
        let mut diagnostics = Diagnostics::new();
        let status = target.apply_project(&data, &mut diagnostics).unwrap();

        assert_eq!(status, LoadStatus::Loaded);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics.warnings());
        assert_eq!(target.transformer().metadata(), source.transformer().metadata());
        assert_eq!(target.scale().scale_m_per_px(), Some(0.1));
        assert!(target.scale().has_defined_scale_line());
        assert!(target.scale().display_in_meters());
        assert!(!target.preferences().show_measurement_line_lengths);
        assert_eq!(target.tracks().all_track_data(), source.tracks().all_track_data());
    }

    #[test]
    fn test_apply_project_skips_bad_elements() {
        let mut data = session_with_point(5.0, 6.0).gather_project();
        let mut other = data.elements[0].clone();
        other.kind = "ANNOTATION".to_string();
        data.elements.push(other);
        let mut duplicate = data.elements[0].clone();
        duplicate.visibility_mode = "SOMETIMES".to_string();
        data.elements.push(duplicate);
        let mut bad_mode = data.elements[0].clone();
        bad_mode.id = 9;
        bad_mode.visibility_mode = "SOMETIMES".to_string();
        data.elements.push(bad_mode);

        let mut target = Session::new();
        target.set_video(Some(VideoInfo::new("clip.mp4", 640, 480, 100, 25.0)));
        let mut diagnostics = Diagnostics::new();
        target.apply_project(&data, &mut diagnostics).unwrap();

        assert_eq!(target.tracks().track_count(), 2);
        assert_eq!(diagnostics.len(), 3, "{:?}", diagnostics.warnings());
        assert_eq!(
            target.tracks().track_visibility_mode(1),
            TrackVisibilityMode::Incremental
        );
    }

    fn clip_session() -> Session {
        let mut session = Session::new();
        session.set_video(Some(VideoInfo::new("clip.mp4", 640, 480, 100, 25.0)));
        session
    }

    #[test]
    fn test_apply_project_skips_only_bad_points() {
        let data: ProjectData = serde_json::from_str(
            r#"{"metadata": {"Show Measurement Line Lengths": true, "Coordinate System Height": 480},
                "elements": [{"id": 1, "type": "TRACK", "data": [
                    {"frame_index": -1, "time_ms": 0.0, "x": 1.0, "y": 1.0},
                    {"frame_index": 0, "time_ms": 0.0, "x": 10.0, "y": 20.0}
                ]}]}"#,
        )
        .unwrap();

        let mut target = clip_session();
        let mut diagnostics = Diagnostics::new();
        let status = target.apply_project(&data, &mut diagnostics).unwrap();

        assert_eq!(status, LoadStatus::Loaded);
        assert_eq!(target.tracks().all_track_data(), vec![vec![Point::new(0, 0.0, 10.0, 20.0)]]);
        assert_eq!(diagnostics.len(), 1, "{:?}", diagnostics.warnings());
        assert!(diagnostics.warnings()[0].contains("Element ID 1"));
    }

    #[test]
    fn test_malformed_points_are_warnings() {
        let data: ProjectData = serde_json::from_str(
            r#"{"metadata": {"Show Measurement Line Lengths": true, "Coordinate System Height": 480},
                "elements": [{"id": 1, "type": "TRACK", "data": [
                    {"frame_index": 1.5, "time_ms": 0.0, "x": 1.0, "y": 1.0},
                    {"frame_index": 2, "x": 1.0, "y": 1.0},
                    {"frame_index": 3, "time_ms": 0.0, "x": "left", "y": 1.0},
                    {"frame_index": 4, "time_ms": 160.0, "x": 3.0, "y": 4.0}
                ]}]}"#,
        )
        .unwrap();

        let mut target = clip_session();
        let mut diagnostics = Diagnostics::new();
        let status = target.apply_project(&data, &mut diagnostics).unwrap();

        assert_eq!(status, LoadStatus::Loaded);
        assert_eq!(target.tracks().track_count(), 1);
        assert_eq!(target.tracks().all_track_data()[0].len(), 1);
        assert_eq!(diagnostics.len(), 3, "{:?}", diagnostics.warnings());
    }

    #[test]
    fn test_apply_project_stores_recorded_origin() {
        let data = session_with_point(5.0, 6.0).gather_project();

        let mut target = clip_session();
        target.transformer_mut().set_custom_origin(5.0, 5.0);
        target.apply_project(&data, &mut Diagnostics::new()).unwrap();

        let coords = target.transformer().metadata();
        assert_eq!(coords.mode, CoordinateSystem::TopLeft);
        assert_eq!((coords.origin_x_tl, coords.origin_y_tl), (0.0, 0.0));
    }

    #[test]
    fn test_project_round_trips_lines_and_analysis_state() {
        let mut source = session_with_point(5.0, 6.0);
        let state = serde_json::json!({
            "fit_settings": {"g_value_ms2": 9.81},
            "fit_results": {"coefficients_poly2": null}
        });
        source.tracks_mut().set_track_analysis_state(0, Some(state.clone()));
        source
            .tracks_mut()
            .add_measurement_line(Point::new(3, 120.0, 0.0, 0.0), Point::new(3, 120.0, 30.0, 40.0))
            .unwrap();
        source
            .tracks_mut()
            .set_line_visibility_mode(0, TrackVisibilityMode::AlwaysVisible);

        let data = source.gather_project();
        assert_eq!(data.elements.len(), 2);
        assert_eq!(data.elements[1].id, 2);
        assert_eq!(data.elements[1].kind, "MEASUREMENT_LINE");

        let text = serde_json::to_string(&data).unwrap();
        let reread: ProjectData = serde_json::from_str(&text).unwrap();
        let mut target = clip_session();
        let mut diagnostics = Diagnostics::new();
        target.apply_project(&reread, &mut diagnostics).unwrap();

        assert!(diagnostics.is_empty(), "{:?}", diagnostics.warnings());
        assert_eq!(target.tracks().track_count(), 1);
        assert_eq!(target.tracks().track_analysis_state(0), Some(&state));
        assert_eq!(target.tracks().measurement_lines(), source.tracks().measurement_lines());

        let visuals = target.visual_elements(3);
        assert!(visuals
            .iter()
            .any(|v| matches!(v, VisualElement::LengthLabel { text, .. } if text == "50.0 px")));
    }

    #[test]
    fn test_non_object_analysis_state_is_dropped() {
        let mut data = session_with_point(5.0, 6.0).gather_project();
        data.elements[0].analysis_state = Some(serde_json::json!([1, 2]));

        let mut target = clip_session();
        let mut diagnostics = Diagnostics::new();
        target.apply_project(&data, &mut diagnostics).unwrap();

        assert_eq!(target.tracks().track_count(), 1);
        assert_eq!(target.tracks().track_analysis_state(0), None);
        assert!(diagnostics.warnings()[0].contains("analysis_state"));
    }
}
