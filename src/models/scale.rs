// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Pixel to metric scale management.
//!
//! The scale factor (meters per pixel) is the single source of truth for
//! unit conversion. The "defined scale line" records how a scale was derived
//! and is kept separately from the value so either can be cleared on its own.

use crate::config::{COORD_DECIMALS, UNITS_METERS, UNITS_PIXELS};
use crate::models::events::{Notifier, ScaleEvent};
use crate::util::geometry::{distance, round_to};

const METER_DISPLAY_DECIMALS: i32 = 4;
const PIXEL_VALUE_DISPLAY_DECIMALS: i32 = 3;
const PIXEL_COORD_DISPLAY_DECIMALS: i32 = 2;

/// Two-point segment, in canonical scene pixels, used to derive a scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLine {
    pub p1x: f64,
    pub p1y: f64,
    pub p2x: f64,
    pub p2y: f64,
}

impl ScaleLine {
    pub fn new(p1x: f64, p1y: f64, p2x: f64, p2y: f64) -> Self {
        Self {
            p1x: round_to(p1x, COORD_DECIMALS),
            p1y: round_to(p1y, COORD_DECIMALS),
            p2x: round_to(p2x, COORD_DECIMALS),
            p2y: round_to(p2y, COORD_DECIMALS),
        }
    }

    /// Length of the line in pixels.
    pub fn pixel_length(&self) -> f64 {
        distance(self.p1x, self.p1y, self.p2x, self.p2y)
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.p1x, self.p1y, self.p2x, self.p2y]
    }
}

/// Unit used for displayed or saved values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayUnit {
    Pixels,
    Meters,
}

impl DisplayUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pixels => UNITS_PIXELS,
            Self::Meters => UNITS_METERS,
        }
    }

    /// Parse a unit label (`px`/`pixels`, `m`/`meters`), ignoring case.
    pub fn parse_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "px" | "pixel" | "pixels" => Some(Self::Pixels),
            "m" | "meter" | "meters" | "metre" | "metres" => Some(Self::Meters),
            _ => None,
        }
    }
}

/// Holds the scale factor, display unit preference and scale provenance.
#[derive(Debug, Default)]
pub struct ScaleManager {
    scale_m_per_px: Option<f64>,
    scale_std_dev: Option<f64>,
    display_in_meters: bool,
    defined_line: Option<ScaleLine>,
    notifier: Notifier<ScaleEvent>,
}

impl ScaleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a change listener.
    pub fn subscribe(&mut self, listener: impl FnMut(ScaleEvent) + 'static) {
        self.notifier.subscribe(listener);
    }

    /// Set the scale in meters per pixel.
    ///
    /// Non-positive or non-finite values unset the scale. A manual value
    /// (`called_from_line_definition == false`) discards the defined line and
    /// any std-dev not supplied with it. A line-derived value keeps the line.
    pub fn set_scale(
        &mut self,
        value: Option<f64>,
        called_from_line_definition: bool,
        std_dev: Option<f64>,
    ) {
        let new_scale = match value {
            Some(v) if v > 0.0 && v.is_finite() => Some(v),
            Some(v) => {
                log::warn!("Invalid scale {} m/px treated as unset", v);
                None
            }
            None => None,
        };

        let mut events = Vec::new();
        let old_scale = self.scale_m_per_px;
        let old_std_dev = self.scale_std_dev;
        let old_display = self.display_in_meters;

        match new_scale {
            Some(scale) => {
                self.scale_m_per_px = Some(scale);
                if called_from_line_definition {
                    if std_dev.is_some() {
                        self.scale_std_dev = std_dev;
                    }
                } else {
                    self.scale_std_dev = std_dev;
                    if self.defined_line.take().is_some() {
                        log::debug!("Manual scale entry cleared the defined scale line");
                        events.push(ScaleEvent::ScaleLineChanged);
                    }
                }
            }
            None => {
                self.scale_m_per_px = None;
                self.scale_std_dev = None;
                self.display_in_meters = false;
                if self.defined_line.take().is_some() {
                    events.push(ScaleEvent::ScaleLineChanged);
                }
            }
        }

        if old_scale != self.scale_m_per_px
            || old_std_dev != self.scale_std_dev
            || old_display != self.display_in_meters
        {
            log::info!("Scale set to {:?} m/px (std dev {:?})", self.scale_m_per_px, self.scale_std_dev);
            events.push(ScaleEvent::ScaleOrUnitChanged);
        }
        self.notifier.emit_all(&events);
    }

    pub fn scale_m_per_px(&self) -> Option<f64> {
        self.scale_m_per_px
    }

    pub fn scale_std_dev(&self) -> Option<f64> {
        self.scale_std_dev
    }

    /// Pixels per meter, if a scale is set.
    pub fn reciprocal_scale_px_per_m(&self) -> Option<f64> {
        self.scale_m_per_px.filter(|s| *s > 0.0).map(|s| 1.0 / s)
    }

    /// Choose whether values are displayed in meters. Forced off without a scale.
    pub fn set_display_in_meters(&mut self, display_meters: bool) {
        let effective = if display_meters && self.scale_m_per_px.is_none() {
            log::warn!("Cannot display meters: no scale is set. Using pixels.");
            false
        } else {
            display_meters
        };
        if self.display_in_meters != effective {
            self.display_in_meters = effective;
            log::info!(
                "Display units set to {}",
                if effective { "meters" } else { "pixels" }
            );
            self.notifier.emit(ScaleEvent::ScaleOrUnitChanged);
        }
    }

    pub fn display_in_meters(&self) -> bool {
        self.display_in_meters
    }

    /// Record the line a scale was derived from.
    pub fn set_defined_scale_line(&mut self, p1x: f64, p1y: f64, p2x: f64, p2y: f64) {
        let had_line = self.defined_line.is_some();
        self.defined_line = Some(ScaleLine::new(p1x, p1y, p2x, p2y));
        log::debug!("Defined scale line set to {:?}", self.defined_line);
        if !had_line {
            self.notifier.emit(ScaleEvent::ScaleLineChanged);
        }
    }

    pub fn clear_defined_scale_line(&mut self) {
        if self.defined_line.take().is_some() {
            log::debug!("Defined scale line cleared");
            self.notifier.emit(ScaleEvent::ScaleLineChanged);
        }
    }

    pub fn has_defined_scale_line(&self) -> bool {
        self.defined_line.is_some()
    }

    pub fn defined_scale_line(&self) -> Option<ScaleLine> {
        self.defined_line
    }

    /// Record `line` and set the scale so that it measures `length_m` meters.
    ///
    /// Returns the derived scale, or `None` for a degenerate line or length.
    pub fn define_scale_from_line(&mut self, line: ScaleLine, length_m: f64) -> Option<f64> {
        let pixel_length = line.pixel_length();
        if pixel_length <= 0.0 || length_m.is_nan() || length_m <= 0.0 || !length_m.is_finite() {
            log::warn!(
                "Cannot derive scale from line of {} px measuring {} m",
                pixel_length,
                length_m
            );
            return None;
        }
        let scale = length_m / pixel_length;
        self.set_defined_scale_line(line.p1x, line.p1y, line.p2x, line.p2y);
        self.set_scale(Some(scale), true, None);
        Some(scale)
    }

    /// Current unit, honouring the display preference.
    pub fn display_unit(&self) -> DisplayUnit {
        if self.display_in_meters && self.scale_m_per_px.is_some() {
            DisplayUnit::Meters
        } else {
            DisplayUnit::Pixels
        }
    }

    pub fn display_unit_short(&self) -> &'static str {
        self.display_unit().as_str()
    }

    /// Convert a pixel length to the display unit.
    pub fn transform_value_for_display(&self, value_px: f64) -> (f64, DisplayUnit) {
        match (self.display_unit(), self.scale_m_per_px) {
            (DisplayUnit::Meters, Some(scale)) => (
                round_to(value_px * scale, METER_DISPLAY_DECIMALS),
                DisplayUnit::Meters,
            ),
            _ => (
                round_to(value_px, PIXEL_VALUE_DISPLAY_DECIMALS),
                DisplayUnit::Pixels,
            ),
        }
    }

    /// Convert a coordinate pair (already in the display coordinate system)
    /// to the display unit. `force_meters` ignores the display preference
    /// but still requires a scale.
    pub fn transformed_coordinates_for_display(
        &self,
        x_px: f64,
        y_px: f64,
        force_meters: bool,
    ) -> (f64, f64, DisplayUnit) {
        let wants_meters = force_meters || self.display_in_meters;
        match self.scale_m_per_px {
            Some(scale) if wants_meters => (
                round_to(x_px * scale, METER_DISPLAY_DECIMALS),
                round_to(y_px * scale, METER_DISPLAY_DECIMALS),
                DisplayUnit::Meters,
            ),
            _ => (
                round_to(x_px, PIXEL_COORD_DISPLAY_DECIMALS),
                round_to(y_px, PIXEL_COORD_DISPLAY_DECIMALS),
                DisplayUnit::Pixels,
            ),
        }
    }

    /// Clear scale, std-dev, display preference and line in one step.
    pub fn reset(&mut self) {
        let changed = self.scale_m_per_px.is_some()
            || self.scale_std_dev.is_some()
            || self.display_in_meters
            || self.defined_line.is_some();
        self.scale_m_per_px = None;
        self.scale_std_dev = None;
        self.display_in_meters = false;
        self.defined_line = None;
        log::debug!("ScaleManager reset");
        if changed {
            self.notifier.emit(ScaleEvent::ScaleOrUnitChanged);
        }
    }
}
