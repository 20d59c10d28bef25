// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Track data structures.
//!
//! This module defines points, tracks, per-track visibility and the visual
//! element descriptors derived from them for drawing.

use crate::config;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One observation: frame, timestamp and canonical Top-Left pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub frame_index: u32,
    pub time_ms: f64,
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(frame_index: u32, time_ms: f64, x: f64, y: f64) -> Self {
        Self {
            frame_index,
            time_ms,
            x,
            y,
        }
    }
}

/// A point as read from a file, before validation.
///
/// `track_id` is the id recorded in the source; ids need not be contiguous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPoint {
    pub track_id: i64,
    pub frame_index: i64,
    pub time_ms: f64,
    pub x: f64,
    pub y: f64,
}

impl RawPoint {
    pub fn new(track_id: i64, frame_index: i64, time_ms: f64, x: f64, y: f64) -> Self {
        Self {
            track_id,
            frame_index,
            time_ms,
            x,
            y,
        }
    }
}

/// Which points of a track are drawn and hit-tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackVisibilityMode {
    Hidden,
    /// Points up to and including the current frame
    #[default]
    Incremental,
    AlwaysVisible,
}

impl TrackVisibilityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hidden => "HIDDEN",
            Self::Incremental => "INCREMENTAL",
            Self::AlwaysVisible => "ALWAYS_VISIBLE",
        }
    }

    /// Whether a point on `frame_index` is visible when `current_frame` is shown.
    pub fn shows(&self, frame_index: u32, current_frame: u32) -> bool {
        match self {
            Self::Hidden => false,
            Self::Incremental => frame_index <= current_frame,
            Self::AlwaysVisible => true,
        }
    }
}

impl fmt::Display for TrackVisibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackVisibilityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIDDEN" => Ok(Self::Hidden),
            "INCREMENTAL" => Ok(Self::Incremental),
            "ALWAYS_VISIBLE" => Ok(Self::AlwaysVisible),
            _ => Err(format!("Unrecognized visibility mode '{}'", s)),
        }
    }
}

const FIT_RESULTS: &str = "fit_results";
const FIT_COEFFICIENTS: &str = "coefficients_poly2";
const FIT_R_SQUARED: &str = "r_squared";
const FIT_DERIVED_SCALE: &str = "derived_scale_m_per_px";

/// A tracked feature: points sorted by frame, at most one per frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Track {
    points: Vec<Point>,
    pub visibility: TrackVisibilityMode,
    /// Fit settings and results kept with the track, stored as-is
    pub analysis_state: Option<serde_json::Value>,
}

impl Track {
    /// Create an empty, incrementally visible track.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a track from unordered points. Later duplicates of a frame win.
    pub fn from_points(points: Vec<Point>, visibility: TrackVisibilityMode) -> Self {
        let mut track = Self {
            points: Vec::with_capacity(points.len()),
            visibility,
            analysis_state: None,
        };
        for point in points {
            track.upsert(point);
        }
        track
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Insert or replace the point at its frame, keeping frame order.
    ///
    /// Returns the replaced point, if any.
    pub fn upsert(&mut self, point: Point) -> Option<Point> {
        if let Some(existing) = self
            .points
            .iter_mut()
            .find(|p| p.frame_index == point.frame_index)
        {
            return Some(std::mem::replace(existing, point));
        }
        self.points.push(point);
        self.points.sort_by_key(|p| p.frame_index);
        None
    }

    /// Remove the point at `frame_index`.
    pub fn remove(&mut self, frame_index: u32) -> Option<Point> {
        let position = self.points.iter().position(|p| p.frame_index == frame_index)?;
        Some(self.points.remove(position))
    }

    pub fn point_at(&self, frame_index: u32) -> Option<&Point> {
        self.points.iter().find(|p| p.frame_index == frame_index)
    }

    pub fn first_frame(&self) -> Option<u32> {
        self.points.first().map(|p| p.frame_index)
    }

    pub fn last_frame(&self) -> Option<u32> {
        self.points.last().map(|p| p.frame_index)
    }

    /// Clear fit results derived from the points, keeping the fit settings.
    ///
    /// Returns whether a fit was cleared.
    pub fn invalidate_fit(&mut self) -> bool {
        let Some(results) = self
            .analysis_state
            .as_mut()
            .and_then(|state| state.get_mut(FIT_RESULTS))
            .and_then(serde_json::Value::as_object_mut)
        else {
            return false;
        };
        if results.get(FIT_COEFFICIENTS).map_or(true, serde_json::Value::is_null) {
            return false;
        }
        for key in [FIT_COEFFICIENTS, FIT_R_SQUARED, FIT_DERIVED_SCALE] {
            results.insert(key.to_string(), serde_json::Value::Null);
        }
        true
    }

    /// Points visible at `current_frame` under this track's visibility mode.
    pub fn visible_points(&self, current_frame: u32) -> impl Iterator<Item = &Point> + '_ {
        let mode = self.visibility;
        self.points
            .iter()
            .filter(move |p| mode.shows(p.frame_index, current_frame))
    }
}

/// Summary row for a track list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackSummary {
    pub track_id: usize,
    pub point_count: usize,
    /// First frame, or -1 for an empty track
    pub start_frame: i64,
    /// Last frame, or -1 for an empty track
    pub end_frame: i64,
}

/// Marker style: active/inactive track × current/other frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStyle {
    ActiveCurrent,
    ActiveOther,
    InactiveCurrent,
    InactiveOther,
}

impl MarkerStyle {
    pub fn select(is_active: bool, is_current_frame: bool) -> Self {
        match (is_active, is_current_frame) {
            (true, true) => Self::ActiveCurrent,
            (true, false) => Self::ActiveOther,
            (false, true) => Self::InactiveCurrent,
            (false, false) => Self::InactiveOther,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActiveCurrent => config::STYLE_MARKER_ACTIVE_CURRENT,
            Self::ActiveOther => config::STYLE_MARKER_ACTIVE_OTHER,
            Self::InactiveCurrent => config::STYLE_MARKER_INACTIVE_CURRENT,
            Self::InactiveOther => config::STYLE_MARKER_INACTIVE_OTHER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Active,
    Inactive,
}

impl LineStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => config::STYLE_LINE_ACTIVE,
            Self::Inactive => config::STYLE_LINE_INACTIVE,
        }
    }
}

/// Something to draw, in canonical pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum VisualElement {
    Marker {
        pos: (f64, f64),
        style: MarkerStyle,
        track_id: usize,
        frame_index: u32,
    },
    Line {
        p1: (f64, f64),
        p2: (f64, f64),
        style: LineStyle,
        track_id: usize,
    },
    MeasurementLine {
        p1: (f64, f64),
        p2: (f64, f64),
        line_id: usize,
    },
    /// Length text placed along a measurement line
    LengthLabel {
        text: String,
        p1: (f64, f64),
        p2: (f64, f64),
        line_id: usize,
    },
}
