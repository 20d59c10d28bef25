// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Canonical track storage.
//!
//! [`TrackManager`] owns every track's points in canonical Top-Left pixel
//! space, the per-track visibility, and the active-track selection. It
//! derives drawable [`VisualElement`]s and answers hit-test queries, but
//! knows nothing about coordinate systems or units.
//!
//! Track ids are positional and 1-based: the track at index `i` has id
//! `i + 1`, and deleting a track renumbers every later one. Measurement
//! lines are kept in their own list with the same id scheme; they are
//! drawn but never hit-tested or selected.

use crate::config::{CLICK_TOLERANCE_SQ, COORD_DECIMALS};
use crate::models::events::{Notifier, TrackEvent};
use crate::models::measurement::MeasurementLine;
use crate::models::track::{
    LineStyle, MarkerStyle, Point, RawPoint, Track, TrackSummary, TrackVisibilityMode,
    VisualElement,
};
use crate::util::geometry::{distance_sq, round_to};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

/// Video properties that loaded points are validated against.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VideoBounds {
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
    /// Frames per second; timestamps are only checked when positive
    pub fps: f64,
}

/// Per-track settings restored with a project, keyed by source track id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackSettings {
    pub visibility: TrackVisibilityMode,
    pub analysis_state: Option<serde_json::Value>,
}

/// A measurement line as read from a project, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLine {
    pub line_id: i64,
    pub visibility: TrackVisibilityMode,
    pub points: Vec<RawPoint>,
}

/// Owns all tracks, measurement lines and the active selection.
#[derive(Debug, Default)]
pub struct TrackManager {
    tracks: Vec<Track>,
    lines: Vec<MeasurementLine>,
    active_index: Option<usize>,
    notifier: Notifier<TrackEvent>,
}

impl TrackManager {
    pub fn new() -> Self {
        log::debug!("TrackManager initialized");
        Self::default()
    }

    /// Register a change listener.
    pub fn subscribe(&mut self, listener: impl FnMut(TrackEvent) + 'static) {
        self.notifier.subscribe(listener);
    }

    /// Remove every track and line, and clear the selection.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.lines.clear();
        self.active_index = None;
        log::info!("TrackManager reset");
        self.notifier.emit_all(&[
            TrackEvent::TrackListChanged,
            TrackEvent::ActiveTrackDataChanged,
            TrackEvent::LineListChanged,
            TrackEvent::VisualsNeedUpdate,
        ]);
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Read-only view of the tracks, in id order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Append an empty, incrementally visible track and make it active.
    ///
    /// Returns the new track's id.
    pub fn create_new_track(&mut self) -> usize {
        self.tracks.push(Track::new());
        let index = self.tracks.len() - 1;
        let mut events = vec![TrackEvent::TrackListChanged];
        events.extend(self.change_active(Some(index)));
        log::info!("Created track {}", index + 1);
        self.notifier.emit_all(&events);
        index + 1
    }

    /// Delete the track at `index`, renumbering later tracks.
    pub fn delete_track(&mut self, index: usize) -> bool {
        if index >= self.tracks.len() {
            log::error!(
                "Cannot delete track: index {} out of bounds ({} tracks)",
                index,
                self.tracks.len()
            );
            return false;
        }

        let removed = self.tracks.remove(index);
        let was_visible = removed.visibility != TrackVisibilityMode::Hidden;

        let mut active_changed = false;
        match self.active_index {
            Some(active) if active == index => {
                self.active_index = None;
                active_changed = true;
            }
            Some(active) if active > index => {
                self.active_index = Some(active - 1);
                active_changed = true;
            }
            _ => {}
        }

        let mut events = vec![TrackEvent::TrackListChanged];
        if active_changed {
            events.push(TrackEvent::ActiveTrackDataChanged);
        }
        if was_visible {
            events.push(TrackEvent::VisualsNeedUpdate);
        }
        log::info!("Deleted track {} ({} points)", index + 1, removed.len());
        self.notifier.emit_all(&events);
        true
    }

    /// Select the active track. Out-of-range indices deselect.
    pub fn set_active_track(&mut self, index: Option<usize>) {
        let events = self.change_active(index);
        self.notifier.emit_all(&events);
    }

    /// Apply an active-track change and return the events it warrants.
    fn change_active(&mut self, index: Option<usize>) -> Vec<TrackEvent> {
        let new_active = match index {
            Some(i) if i < self.tracks.len() => Some(i),
            Some(i) => {
                log::warn!("set_active_track: invalid index {}; deselecting", i);
                None
            }
            None => None,
        };
        if new_active == self.active_index {
            return Vec::new();
        }

        let old_visible = self.is_track_shown(self.active_index);
        self.active_index = new_active;
        let new_visible = self.is_track_shown(new_active);
        log::debug!("Active track set to {:?}", new_active);

        let mut events = vec![TrackEvent::ActiveTrackDataChanged];
        if old_visible || new_visible {
            events.push(TrackEvent::VisualsNeedUpdate);
        }
        events
    }

    fn is_track_shown(&self, index: Option<usize>) -> bool {
        index.is_some_and(|i| self.track_visibility_mode(i) != TrackVisibilityMode::Hidden)
    }

    pub fn active_track_index(&self) -> Option<usize> {
        self.active_index
    }

    /// Id of the active track, if any.
    pub fn active_track_id(&self) -> Option<usize> {
        self.active_index.map(|i| i + 1)
    }

    pub fn set_track_visibility_mode(&mut self, index: usize, mode: TrackVisibilityMode) {
        let Some(track) = self.tracks.get_mut(index) else {
            return;
        };
        if track.visibility == mode {
            return;
        }
        let old_mode = track.visibility;
        track.visibility = mode;
        log::debug!("Visibility for track {} set to {}", index + 1, mode);

        let mut events = Vec::new();
        if old_mode != TrackVisibilityMode::Hidden || mode != TrackVisibilityMode::Hidden {
            events.push(TrackEvent::VisualsNeedUpdate);
        }
        events.push(TrackEvent::TrackListChanged);
        self.notifier.emit_all(&events);
    }

    /// Visibility of the track at `index`; invalid indices read as hidden.
    pub fn track_visibility_mode(&self, index: usize) -> TrackVisibilityMode {
        self.tracks
            .get(index)
            .map(|t| t.visibility)
            .unwrap_or(TrackVisibilityMode::Hidden)
    }

    pub fn set_all_tracks_visibility(&mut self, mode: TrackVisibilityMode) {
        let mut changed_any = false;
        let mut needs_visual_update = false;
        for track in self.tracks.iter_mut() {
            if track.visibility != mode {
                let old_mode = track.visibility;
                track.visibility = mode;
                changed_any = true;
                if old_mode != TrackVisibilityMode::Hidden || mode != TrackVisibilityMode::Hidden {
                    needs_visual_update = true;
                }
            }
        }

        let mut events = Vec::new();
        if changed_any {
            events.push(TrackEvent::TrackListChanged);
        }
        if needs_visual_update {
            events.push(TrackEvent::VisualsNeedUpdate);
        }
        self.notifier.emit_all(&events);
    }

    /// Add or replace the active track's point at `frame_index`.
    ///
    /// Returns `false` when no track is active.
    pub fn add_point(&mut self, frame_index: u32, time_ms: f64, x: f64, y: f64) -> bool {
        let Some(active) = self.active_index else {
            log::warn!("add_point: no active track selected");
            return false;
        };
        let Some(track) = self.tracks.get_mut(active) else {
            return false;
        };

        let point = Point::new(
            frame_index,
            time_ms,
            round_to(x, COORD_DECIMALS),
            round_to(y, COORD_DECIMALS),
        );
        match track.upsert(point) {
            Some(_) => log::debug!("Track {}: replaced point at frame {}", active + 1, frame_index),
            None => log::debug!("Track {}: added point at frame {}", active + 1, frame_index),
        }
        if track.invalidate_fit() {
            log::info!("Track {}: fit cleared after point change", active + 1);
        }

        let mut events = vec![TrackEvent::ActiveTrackDataChanged, TrackEvent::TrackListChanged];
        if track.visibility != TrackVisibilityMode::Hidden {
            events.push(TrackEvent::VisualsNeedUpdate);
        }
        self.notifier.emit_all(&events);
        true
    }

    /// Remove the point at `frame_index` from the track at `track_index`.
    pub fn delete_point(&mut self, track_index: usize, frame_index: u32) -> bool {
        let Some(track) = self.tracks.get_mut(track_index) else {
            log::error!("delete_point: invalid track index {}", track_index);
            return false;
        };
        if track.remove(frame_index).is_none() {
            log::warn!(
                "delete_point: track {} has no point at frame {}",
                track_index + 1,
                frame_index
            );
            return false;
        }
        log::info!("Deleted point of track {} at frame {}", track_index + 1, frame_index);
        if track.invalidate_fit() {
            log::info!("Track {}: fit cleared after point deletion", track_index + 1);
        }

        let hidden = track.visibility == TrackVisibilityMode::Hidden;
        let mut events = Vec::new();
        if self.active_index == Some(track_index) {
            events.push(TrackEvent::ActiveTrackDataChanged);
        }
        events.push(TrackEvent::TrackListChanged);
        if !hidden {
            events.push(TrackEvent::VisualsNeedUpdate);
        }
        self.notifier.emit_all(&events);
        true
    }

    /// The active track's point at `frame_index`.
    pub fn point_for_active_track(&self, frame_index: u32) -> Option<Point> {
        let track = self.tracks.get(self.active_index?)?;
        track.point_at(frame_index).copied()
    }

    /// Copy of the active track's points, empty when nothing is active.
    pub fn active_track_points(&self) -> Vec<Point> {
        self.active_index
            .and_then(|i| self.tracks.get(i))
            .map(|t| t.points().to_vec())
            .unwrap_or_default()
    }

    /// Index of the track owning the closest visible point within tolerance.
    pub fn find_closest_visible_track(&self, x: f64, y: f64, current_frame: u32) -> Option<usize> {
        self.find_closest_visible_point(x, y, current_frame)
            .map(|(index, _)| index)
    }

    /// Closest visible point within tolerance, with its track index.
    ///
    /// Hidden tracks are skipped. Among equal distances the first one
    /// encountered in track/frame order wins.
    pub fn find_closest_visible_point(
        &self,
        x: f64,
        y: f64,
        current_frame: u32,
    ) -> Option<(usize, Point)> {
        let mut min_dist_sq = CLICK_TOLERANCE_SQ;
        let mut closest = None;
        for (index, track) in self.tracks.iter().enumerate() {
            if track.visibility == TrackVisibilityMode::Hidden {
                continue;
            }
            for point in track.visible_points(current_frame) {
                let dist_sq = distance_sq(x, y, point.x, point.y);
                if dist_sq < min_dist_sq {
                    min_dist_sq = dist_sq;
                    closest = Some((index, *point));
                }
            }
        }
        closest
    }

    /// Markers and connecting lines to draw for `current_frame`.
    ///
    /// Lines join consecutive visible points of a track, bridging frame gaps.
    pub fn visual_elements(&self, current_frame: u32) -> Vec<VisualElement> {
        let mut elements = Vec::new();
        for (index, track) in self.tracks.iter().enumerate() {
            if track.visibility == TrackVisibilityMode::Hidden {
                continue;
            }
            let track_id = index + 1;
            let is_active = self.active_index == Some(index);
            let line_style = if is_active {
                LineStyle::Active
            } else {
                LineStyle::Inactive
            };

            let mut previous: Option<(f64, f64)> = None;
            for point in track.visible_points(current_frame) {
                let pos = (point.x, point.y);
                elements.push(VisualElement::Marker {
                    pos,
                    style: MarkerStyle::select(is_active, point.frame_index == current_frame),
                    track_id,
                    frame_index: point.frame_index,
                });
                if let Some(p1) = previous {
                    elements.push(VisualElement::Line {
                        p1,
                        p2: pos,
                        style: line_style,
                        track_id,
                    });
                }
                previous = Some(pos);
            }
        }
        elements
    }

    /// Analysis state stored with the track at `index`.
    pub fn track_analysis_state(&self, index: usize) -> Option<&serde_json::Value> {
        self.tracks.get(index)?.analysis_state.as_ref()
    }

    /// Replace the analysis state of the track at `index`.
    pub fn set_track_analysis_state(
        &mut self,
        index: usize,
        state: Option<serde_json::Value>,
    ) -> bool {
        let Some(track) = self.tracks.get_mut(index) else {
            log::error!("set_track_analysis_state: invalid track index {}", index);
            return false;
        };
        track.analysis_state = state;
        log::debug!("Analysis state updated for track {}", index + 1);
        true
    }

    pub fn measurement_lines(&self) -> &[MeasurementLine] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Append a measurement line between two points on the same frame.
    ///
    /// Returns the new line's id, or `None` when the frames differ.
    pub fn add_measurement_line(&mut self, p1: Point, p2: Point) -> Option<usize> {
        let round = |p: Point| {
            Point::new(
                p.frame_index,
                p.time_ms,
                round_to(p.x, COORD_DECIMALS),
                round_to(p.y, COORD_DECIMALS),
            )
        };
        let Some(line) = MeasurementLine::new(round(p1), round(p2), TrackVisibilityMode::default())
        else {
            log::warn!(
                "Measurement line points must be on the same frame (got {} and {}); ignored",
                p1.frame_index,
                p2.frame_index
            );
            return None;
        };
        self.lines.push(line);
        let line_id = self.lines.len();
        log::info!("Created measurement line {} on frame {}", line_id, line.frame_index());
        self.notifier
            .emit_all(&[TrackEvent::LineListChanged, TrackEvent::VisualsNeedUpdate]);
        Some(line_id)
    }

    /// Delete the line at `index`, renumbering later lines.
    pub fn delete_measurement_line(&mut self, index: usize) -> bool {
        if index >= self.lines.len() {
            log::error!("Cannot delete measurement line: index {} out of bounds", index);
            return false;
        }
        let removed = self.lines.remove(index);
        log::info!("Deleted measurement line {}", index + 1);
        let mut events = vec![TrackEvent::LineListChanged];
        if removed.visibility != TrackVisibilityMode::Hidden {
            events.push(TrackEvent::VisualsNeedUpdate);
        }
        self.notifier.emit_all(&events);
        true
    }

    pub fn set_line_visibility_mode(&mut self, index: usize, mode: TrackVisibilityMode) {
        let Some(line) = self.lines.get_mut(index) else {
            return;
        };
        if line.visibility == mode {
            return;
        }
        let old_mode = line.visibility;
        line.visibility = mode;

        let mut events = vec![TrackEvent::LineListChanged];
        if old_mode != TrackVisibilityMode::Hidden || mode != TrackVisibilityMode::Hidden {
            events.push(TrackEvent::VisualsNeedUpdate);
        }
        self.notifier.emit_all(&events);
    }

    /// Measurement lines to draw for `current_frame`, with optional length labels.
    pub fn measurement_line_visuals(
        &self,
        current_frame: u32,
        scale_m_per_px: Option<f64>,
        show_lengths: bool,
    ) -> Vec<VisualElement> {
        let mut elements = Vec::new();
        for (index, line) in self.lines.iter().enumerate() {
            if !line.is_visible_at(current_frame) {
                continue;
            }
            let [a, b] = line.points();
            let (p1, p2) = ((a.x, a.y), (b.x, b.y));
            let line_id = index + 1;
            elements.push(VisualElement::MeasurementLine { p1, p2, line_id });
            if show_lengths {
                elements.push(VisualElement::LengthLabel {
                    text: line.length_label(scale_m_per_px),
                    p1,
                    p2,
                    line_id,
                });
            }
        }
        elements
    }

    /// Per-track id, point count and frame span.
    pub fn track_summary(&self) -> Vec<TrackSummary> {
        self.tracks
            .iter()
            .enumerate()
            .map(|(index, track)| TrackSummary {
                track_id: index + 1,
                point_count: track.len(),
                start_frame: track.first_frame().map_or(-1, i64::from),
                end_frame: track.last_frame().map_or(-1, i64::from),
            })
            .collect()
    }

    /// Independent copy of every track's points.
    pub fn all_track_data(&self) -> Vec<Vec<Point>> {
        self.tracks.iter().map(|t| t.points().to_vec()).collect()
    }

    /// Replace all tracks with validated points from a file.
    ///
    /// Returns whether the load succeeded and the warnings collected on the
    /// way. Invalid points are dropped with a warning; timestamp mismatches
    /// only warn. Measurement lines are left alone.
    pub fn load_tracks_from_data(
        &mut self,
        raw_points: &[RawPoint],
        video_width: u32,
        video_height: u32,
        video_frame_count: u32,
        video_fps: f64,
    ) -> (bool, Vec<String>) {
        let bounds = VideoBounds {
            width: video_width,
            height: video_height,
            frame_count: video_frame_count,
            fps: video_fps,
        };
        self.load_validated(raw_points, &BTreeMap::new(), None, bounds)
    }

    /// Replace tracks and measurement lines from a project.
    ///
    /// `settings` restores per-track visibility and analysis state by
    /// source track id; tracks without an entry load incremental.
    pub fn load_elements(
        &mut self,
        raw_points: &[RawPoint],
        settings: &BTreeMap<i64, TrackSettings>,
        lines: &[RawLine],
        bounds: VideoBounds,
    ) -> (bool, Vec<String>) {
        self.load_validated(raw_points, settings, Some(lines), bounds)
    }

    fn load_validated(
        &mut self,
        raw_points: &[RawPoint],
        settings: &BTreeMap<i64, TrackSettings>,
        lines: Option<&[RawLine]>,
        bounds: VideoBounds,
    ) -> (bool, Vec<String>) {
        let mut warnings = Vec::new();
        let built = panic::catch_unwind(AssertUnwindSafe(|| {
            let tracks = build_tracks(raw_points, settings, bounds, &mut warnings);
            let lines = lines.map(|raw| build_lines(raw, bounds, &mut warnings));
            (tracks, lines)
        }));

        self.tracks.clear();
        self.active_index = None;
        let replaces_lines = lines.is_some();
        if replaces_lines {
            self.lines.clear();
        }

        let success = match built {
            Ok((tracks, lines)) => {
                let point_count: usize = tracks.iter().map(Track::len).sum();
                self.tracks = tracks;
                if let Some(lines) = lines {
                    self.lines = lines;
                }
                if !self.tracks.is_empty() {
                    self.active_index = Some(0);
                }
                log::info!(
                    "Loaded {} track(s) with {} point(s) and {} line(s); {} warning(s)",
                    self.tracks.len(),
                    point_count,
                    self.lines.len(),
                    warnings.len()
                );
                true
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("Track load failed, state reset: {}", message);
                warnings.push(format!("Error processing track data: {}", message));
                false
            }
        };

        let mut events = vec![
            TrackEvent::TrackListChanged,
            TrackEvent::ActiveTrackDataChanged,
        ];
        if replaces_lines {
            events.push(TrackEvent::LineListChanged);
        }
        events.push(TrackEvent::VisualsNeedUpdate);
        self.notifier.emit_all(&events);
        (success, warnings)
    }
}

fn warn(warnings: &mut Vec<String>, message: String) {
    log::warn!("{}", message);
    warnings.push(message);
}

/// Range-check one raw point against the video.
///
/// Out-of-range frames and coordinates drop the point; a timestamp more
/// than half a frame off the frame's nominal time only warns.
fn validate_point(
    raw: &RawPoint,
    label: &str,
    bounds: VideoBounds,
    warnings: &mut Vec<String>,
) -> Option<Point> {
    let description = format!("{} (ID {}, F{})", label, raw.track_id, raw.frame_index);
    let frame_index = match u32::try_from(raw.frame_index) {
        Ok(frame) if frame < bounds.frame_count => frame,
        _ => {
            warn(
                warnings,
                format!(
                    "{}: Frame index out of video range [0, {}). Skipped.",
                    description, bounds.frame_count
                ),
            );
            return None;
        }
    };
    if !(raw.x >= 0.0 && raw.x < f64::from(bounds.width)) {
        warn(
            warnings,
            format!(
                "{}: X-coordinate ({:.2}) out of video width [0, {}). Skipped.",
                description, raw.x, bounds.width
            ),
        );
        return None;
    }
    if !(raw.y >= 0.0 && raw.y < f64::from(bounds.height)) {
        warn(
            warnings,
            format!(
                "{}: Y-coordinate ({:.2}) out of video height [0, {}). Skipped.",
                description, raw.y, bounds.height
            ),
        );
        return None;
    }
    if bounds.fps > 0.0 {
        let expected_ms = f64::from(frame_index) / bounds.fps * 1000.0;
        let tolerance_ms = 500.0 / bounds.fps;
        if (raw.time_ms - expected_ms).abs() > tolerance_ms {
            warn(
                warnings,
                format!(
                    "{}: Time ({:.1}ms) seems inconsistent with frame index and FPS (expected ~{:.1}ms). Using file time.",
                    description, raw.time_ms, expected_ms
                ),
            );
        }
    }

    Some(Point::new(
        frame_index,
        raw.time_ms,
        round_to(raw.x, COORD_DECIMALS),
        round_to(raw.y, COORD_DECIMALS),
    ))
}

/// Validate raw points and group them into tracks ordered by source id.
fn build_tracks(
    raw_points: &[RawPoint],
    settings: &BTreeMap<i64, TrackSettings>,
    bounds: VideoBounds,
    warnings: &mut Vec<String>,
) -> Vec<Track> {
    let mut grouped: BTreeMap<i64, Vec<Point>> = BTreeMap::new();
    let mut skipped = 0usize;

    for raw in raw_points {
        if raw.track_id <= 0 {
            warn(
                warnings,
                format!(
                    "Point (ID {}, F{}): Track ID must be positive. Skipped.",
                    raw.track_id, raw.frame_index
                ),
            );
            skipped += 1;
            continue;
        }
        // Register the id so a track whose points are all rejected is reported.
        let bucket = grouped.entry(raw.track_id).or_default();
        match validate_point(raw, "Point", bounds, warnings) {
            Some(point) => bucket.push(point),
            None => skipped += 1,
        }
    }

    let mut tracks = Vec::with_capacity(grouped.len());
    for (source_id, points) in grouped {
        if points.is_empty() {
            warn(
                warnings,
                format!(
                    "Track ID {} from file is empty after validation. Skipped.",
                    source_id
                ),
            );
            continue;
        }
        let supplied = points.len();
        let restored = settings.get(&source_id);
        let mode = restored.map(|s| s.visibility).unwrap_or_default();
        let mut track = Track::from_points(points, mode);
        track.analysis_state = restored.and_then(|s| s.analysis_state.clone());
        if track.len() < supplied {
            warn(
                warnings,
                format!(
                    "Track ID {}: {} duplicate frame(s); the last point for each frame was kept.",
                    source_id,
                    supplied - track.len()
                ),
            );
        }
        tracks.push(track);
    }

    if skipped > 0 {
        log::info!("{} point(s) skipped during validation", skipped);
    }
    tracks
}

/// Validate measurement lines. A line needs exactly two valid points on one frame.
fn build_lines(
    raw_lines: &[RawLine],
    bounds: VideoBounds,
    warnings: &mut Vec<String>,
) -> Vec<MeasurementLine> {
    let mut lines = Vec::with_capacity(raw_lines.len());
    for raw in raw_lines {
        let mut points: Vec<Point> = raw
            .points
            .iter()
            .filter_map(|p| validate_point(p, "Line point", bounds, warnings))
            .collect();
        if points.len() != 2 {
            warn(
                warnings,
                format!(
                    "Line ID {}: Measurement Line must have exactly 2 valid points. Found {}. Skipped.",
                    raw.line_id,
                    points.len()
                ),
            );
            continue;
        }
        points.sort_by_key(|p| p.frame_index);
        match MeasurementLine::new(points[0], points[1], raw.visibility) {
            Some(line) => lines.push(line),
            None => warn(
                warnings,
                format!(
                    "Line ID {}: Measurement Line points must be on the same frame. Found frames {} and {}. Skipped.",
                    raw.line_id, points[0].frame_index, points[1].frame_index
                ),
            ),
        }
    }
    lines
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unexpected internal error".to_string()
    }
}
