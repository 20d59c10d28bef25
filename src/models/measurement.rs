// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Measurement lines.
//!
//! A measurement line is two points on the same frame, in canonical pixels.
//! Its length is shown in meters when a scale is set, otherwise in pixels.

use crate::config::{
    LENGTH_UNIT_PREFIXES, SCIENTIFIC_NOTATION_LOWER_THRESHOLD,
    SCIENTIFIC_NOTATION_UPPER_THRESHOLD,
};
use crate::models::track::{Point, TrackVisibilityMode};
use crate::util::geometry::distance;

/// Two-point line drawn on a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementLine {
    p1: Point,
    p2: Point,
    pub visibility: TrackVisibilityMode,
}

impl MeasurementLine {
    /// Build a line. Both points must be on the same frame.
    pub fn new(p1: Point, p2: Point, visibility: TrackVisibilityMode) -> Option<Self> {
        if p1.frame_index != p2.frame_index {
            return None;
        }
        Some(Self { p1, p2, visibility })
    }

    pub fn points(&self) -> [Point; 2] {
        [self.p1, self.p2]
    }

    /// Frame the line was defined on.
    pub fn frame_index(&self) -> u32 {
        self.p1.frame_index
    }

    pub fn pixel_length(&self) -> f64 {
        distance(self.p1.x, self.p1.y, self.p2.x, self.p2.y)
    }

    /// Whether the line is drawn when `current_frame` is shown.
    pub fn is_visible_at(&self, current_frame: u32) -> bool {
        self.visibility.shows(self.frame_index(), current_frame)
    }

    /// Length text: meters with a unit prefix when scaled, else pixels.
    pub fn length_label(&self, scale_m_per_px: Option<f64>) -> String {
        let length_px = self.pixel_length();
        match scale_m_per_px {
            Some(scale) => format_length(length_px * scale),
            None => format!("{:.1} px", length_px),
        }
    }
}

/// Format a length in meters with the most fitting unit prefix.
pub fn format_length(length_m: f64) -> String {
    if length_m == 0.0 {
        return "0 m".to_string();
    }
    let magnitude = length_m.abs();
    if magnitude >= SCIENTIFIC_NOTATION_UPPER_THRESHOLD
        || magnitude <= SCIENTIFIC_NOTATION_LOWER_THRESHOLD
    {
        return format!("{:.2e}", length_m);
    }

    for (factor, unit) in LENGTH_UNIT_PREFIXES {
        if magnitude < factor * 0.99 {
            continue;
        }
        let value = length_m / factor;
        let mut precision = if factor >= 1.0 {
            if value.abs() < 10.0 {
                2
            } else if value.abs() < 100.0 {
                1
            } else {
                0
            }
        } else if factor >= 1e-3 {
            if value.abs() < 100.0 {
                1
            } else {
                0
            }
        } else {
            0
        };
        // Whole numbers of ten or more read better without decimals
        if precision > 0 && value == value.floor() && value.abs() >= 10.0 {
            precision = 0;
        }
        return format!("{:.*} {}", precision, value, unit);
    }
    format!("{:.3} m", length_m)
}
