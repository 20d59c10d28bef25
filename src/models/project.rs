// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Project document.
//!
//! A project file has three sections: `project_info` (application
//! identity), `metadata` (everything a CSV track file records plus UI
//! preferences and the defined scale line) and `elements` (tracks and
//! measurement lines, in canonical Top-Left pixels).
//!
//! Metadata values and element points are read leniently: a value of the
//! wrong type is kept as-is and reported as a warning when the project is
//! applied, rather than failing the whole document.

use crate::config;
use crate::models::measurement::MeasurementLine;
use crate::models::track::{Point, RawPoint, Track, TrackVisibilityMode};
use serde::{Deserialize, Serialize};

/// Properties of the video a session is working against.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoInfo {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
    pub fps: f64,
    pub duration_ms: f64,
}

impl VideoInfo {
    pub fn new(filename: impl Into<String>, width: u32, height: u32, frame_count: u32, fps: f64) -> Self {
        let duration_ms = if fps > 0.0 {
            f64::from(frame_count) / fps * 1000.0
        } else {
            0.0
        };
        Self {
            filename: filename.into(),
            width,
            height,
            frame_count,
            fps,
            duration_ms,
        }
    }

    /// Whether points can be validated against this video.
    pub fn is_usable(&self) -> bool {
        self.width > 0 && self.height > 0 && self.frame_count > 0
    }
}

/// A metadata value of whatever type the document stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl MetaValue {
    /// The `N/A` sentinel (or an empty string).
    pub fn is_not_available(&self) -> bool {
        match self {
            Self::Text(s) => {
                let s = s.trim();
                s.is_empty() || s.eq_ignore_ascii_case(config::NOT_AVAILABLE)
            }
            _ => false,
        }
    }

    /// Numeric value; numeric strings are accepted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    /// Numeric value without string coercion.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whole numeric value; `3.0` counts, `3.5` and strings do not.
    pub fn as_whole(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }

    /// Non-negative whole value that fits a `u32`.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Integer(i) => u32::try_from(*i).ok(),
            Self::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n <= f64::from(u32::MAX) => {
                Some(*n as u32)
            }
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean value; `"true"`/`"false"` strings are accepted.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for MetaValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Application identity recorded in a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub app_name: String,
    pub app_version: String,
}

impl Default for ProjectInfo {
    fn default() -> Self {
        Self {
            app_name: config::APP_NAME.to_string(),
            app_version: config::APP_VERSION.to_string(),
        }
    }
}

/// The `metadata` section. Every field is optional on read.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectMetadata {
    #[serde(rename = "Video Filename")]
    pub filename: Option<MetaValue>,
    #[serde(rename = "Frame Width")]
    pub width: Option<MetaValue>,
    #[serde(rename = "Frame Height")]
    pub height: Option<MetaValue>,
    #[serde(rename = "Frame Count")]
    pub frame_count: Option<MetaValue>,
    #[serde(rename = "FPS")]
    pub fps: Option<MetaValue>,
    #[serde(rename = "Duration (ms)")]
    pub duration_ms: Option<MetaValue>,
    #[serde(rename = "Coordinate System Mode")]
    pub coordinate_mode: Option<MetaValue>,
    #[serde(rename = "Coordinate Origin X (TL)")]
    pub origin_x_tl: Option<MetaValue>,
    #[serde(rename = "Coordinate Origin Y (TL)")]
    pub origin_y_tl: Option<MetaValue>,
    #[serde(rename = "Coordinate System Height")]
    pub coordinate_height: Option<MetaValue>,
    #[serde(rename = "Scale Factor (m/px)")]
    pub scale_m_per_px: Option<MetaValue>,
    #[serde(rename = "Data Units")]
    pub data_units: Option<MetaValue>,
    #[serde(rename = "display_in_meters")]
    pub display_in_meters: Option<MetaValue>,
    #[serde(rename = "Scale Line P1 X (Scene px)")]
    pub scale_line_p1x: Option<MetaValue>,
    #[serde(rename = "Scale Line P1 Y (Scene px)")]
    pub scale_line_p1y: Option<MetaValue>,
    #[serde(rename = "Scale Line P2 X (Scene px)")]
    pub scale_line_p2x: Option<MetaValue>,
    #[serde(rename = "Scale Line P2 Y (Scene px)")]
    pub scale_line_p2y: Option<MetaValue>,
    #[serde(rename = "Show Measurement Line Lengths")]
    pub show_measurement_line_lengths: Option<MetaValue>,
}

impl ProjectMetadata {
    /// Build metadata from CSV `key: value` pairs. The first entry for a key
    /// wins; unknown keys are ignored.
    pub fn from_text_pairs(pairs: &[(String, String)]) -> Self {
        let mut metadata = Self::default();
        for (key, value) in pairs {
            match metadata.slot_mut(key) {
                Some(slot) if slot.is_none() => *slot = Some(MetaValue::Text(value.clone())),
                Some(_) => log::debug!("Duplicate metadata key '{}' ignored", key),
                None => log::debug!("Unknown metadata key '{}' ignored", key),
            }
        }
        metadata
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Option<MetaValue>> {
        let slot = match key {
            config::META_FILENAME => &mut self.filename,
            config::META_WIDTH => &mut self.width,
            config::META_HEIGHT => &mut self.height,
            config::META_FRAMES => &mut self.frame_count,
            config::META_FPS => &mut self.fps,
            config::META_DURATION => &mut self.duration_ms,
            config::META_COORD_SYSTEM_MODE => &mut self.coordinate_mode,
            config::META_COORD_ORIGIN_X_TL => &mut self.origin_x_tl,
            config::META_COORD_ORIGIN_Y_TL => &mut self.origin_y_tl,
            config::META_COORD_HEIGHT => &mut self.coordinate_height,
            config::META_SCALE_FACTOR_M_PER_PX => &mut self.scale_m_per_px,
            config::META_DATA_UNITS => &mut self.data_units,
            config::META_DISPLAY_IN_METERS => &mut self.display_in_meters,
            config::META_SCALE_LINE_P1X => &mut self.scale_line_p1x,
            config::META_SCALE_LINE_P1Y => &mut self.scale_line_p1y,
            config::META_SCALE_LINE_P2X => &mut self.scale_line_p2x,
            config::META_SCALE_LINE_P2Y => &mut self.scale_line_p2y,
            config::META_SHOW_MEASUREMENT_LINE_LENGTHS => &mut self.show_measurement_line_lengths,
            _ => return None,
        };
        Some(slot)
    }

    /// Recorded video filename, unless absent or `N/A`.
    pub fn video_filename(&self) -> Option<&str> {
        self.filename
            .as_ref()
            .filter(|v| !v.is_not_available())
            .and_then(MetaValue::as_text)
    }
}

impl VideoInfo {
    /// Video properties recorded in metadata, if they describe a usable video.
    pub fn from_metadata(metadata: &ProjectMetadata) -> Option<Self> {
        let whole = |value: &Option<MetaValue>| value.as_ref().and_then(MetaValue::as_u32).unwrap_or(0);
        let fps = metadata
            .fps
            .as_ref()
            .and_then(MetaValue::as_f64)
            .filter(|f| f.is_finite() && *f > 0.0)
            .unwrap_or(0.0);
        let mut video = Self::new(
            metadata.video_filename().unwrap_or_default(),
            whole(&metadata.width),
            whole(&metadata.height),
            whole(&metadata.frame_count),
            fps,
        );
        if let Some(duration) = metadata.duration_ms.as_ref().and_then(MetaValue::as_f64) {
            video.duration_ms = duration;
        }
        video.is_usable().then_some(video)
    }
}

/// Element type tag written for tracks.
pub const ELEMENT_TYPE_TRACK: &str = "TRACK";
/// Element type tag written for measurement lines.
pub const ELEMENT_TYPE_MEASUREMENT_LINE: &str = "MEASUREMENT_LINE";

/// One element point as stored. Fields stay loosely typed until the
/// element is applied, so a single bad point does not reject the file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectPoint {
    pub frame_index: Option<MetaValue>,
    pub time_ms: Option<MetaValue>,
    pub x: Option<MetaValue>,
    pub y: Option<MetaValue>,
}

impl ProjectPoint {
    /// Typed point for the element `element_id`, if every field is numeric
    /// and the frame index is a non-negative whole number.
    pub fn to_raw(&self, element_id: i64) -> Option<RawPoint> {
        let number = |value: &Option<MetaValue>| {
            value
                .as_ref()
                .and_then(MetaValue::as_number)
                .filter(|n| n.is_finite())
        };
        let frame_index = self
            .frame_index
            .as_ref()
            .and_then(MetaValue::as_whole)
            .filter(|f| *f >= 0)?;
        Some(RawPoint::new(
            element_id,
            frame_index,
            number(&self.time_ms)?,
            number(&self.x)?,
            number(&self.y)?,
        ))
    }
}

impl From<&Point> for ProjectPoint {
    fn from(point: &Point) -> Self {
        Self {
            frame_index: Some(MetaValue::from(point.frame_index)),
            time_ms: Some(MetaValue::from(point.time_ms)),
            x: Some(MetaValue::from(point.x)),
            y: Some(MetaValue::from(point.y)),
        }
    }
}

/// One serialized track or measurement line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectElement {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_visibility_name")]
    pub visibility_mode: String,
    #[serde(default)]
    pub data: Vec<ProjectPoint>,
    /// Opaque analysis settings and results, tracks only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_state: Option<serde_json::Value>,
}

fn default_visibility_name() -> String {
    TrackVisibilityMode::default().as_str().to_string()
}

impl ProjectElement {
    /// Serialize a track under the given 1-based id.
    pub fn track(id: usize, track: &Track) -> Self {
        Self {
            id: id as i64,
            kind: ELEMENT_TYPE_TRACK.to_string(),
            name: format!("Track {}", id),
            visibility_mode: track.visibility.as_str().to_string(),
            data: track.points().iter().map(ProjectPoint::from).collect(),
            analysis_state: track.analysis_state.clone(),
        }
    }

    /// Serialize a measurement line under the given element id.
    pub fn measurement_line(id: usize, line: &MeasurementLine) -> Self {
        Self {
            id: id as i64,
            kind: ELEMENT_TYPE_MEASUREMENT_LINE.to_string(),
            name: format!("Line {}", id),
            visibility_mode: line.visibility.as_str().to_string(),
            data: line.points().iter().map(ProjectPoint::from).collect(),
            analysis_state: None,
        }
    }

    pub fn is_track(&self) -> bool {
        self.kind.trim().eq_ignore_ascii_case(ELEMENT_TYPE_TRACK)
    }

    pub fn is_measurement_line(&self) -> bool {
        self.kind
            .trim()
            .eq_ignore_ascii_case(ELEMENT_TYPE_MEASUREMENT_LINE)
    }
}

/// Complete project document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectData {
    #[serde(default)]
    pub project_info: ProjectInfo,
    /// Absent in malformed documents; applying such a project fails.
    #[serde(default)]
    pub metadata: Option<ProjectMetadata>,
    #[serde(default)]
    pub elements: Vec<ProjectElement>,
}
