// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Coordinate system definitions and transformations.
//!
//! Points are stored in a canonical Top-Left system (origin at the top-left
//! pixel, Y increasing downwards). This module converts between that system
//! and the user-selected display/storage system, and back again from any
//! recorded source system when loading files saved under other settings.

use crate::config::COORD_DECIMALS;
use crate::util::geometry::round_to;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Available coordinate system modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinateSystem {
    /// Origin at (0, 0), Y down. The canonical system.
    #[default]
    TopLeft,
    /// Origin at (0, video_height), Y up
    BottomLeft,
    /// Origin at a user-defined Top-Left point, Y up
    Custom,
}

impl CoordinateSystem {
    /// Name used in saved metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopLeft => "TOP_LEFT",
            Self::BottomLeft => "BOTTOM_LEFT",
            Self::Custom => "CUSTOM",
        }
    }

    /// Whether display Y points upwards in this system.
    pub fn flips_y(&self) -> bool {
        !matches!(self, Self::TopLeft)
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coordinate system name that does not match any known mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognized coordinate system '{0}'")]
pub struct UnrecognizedCoordinateSystem(pub String);

impl FromStr for CoordinateSystem {
    type Err = UnrecognizedCoordinateSystem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TOP_LEFT" => Ok(Self::TopLeft),
            "BOTTOM_LEFT" => Ok(Self::BottomLeft),
            "CUSTOM" => Ok(Self::Custom),
            _ => Err(UnrecognizedCoordinateSystem(s.to_string())),
        }
    }
}

/// Coordinate system settings as saved alongside track data.
///
/// The custom origin and height are always the stored values, whatever the
/// active mode, so a custom origin survives a temporary mode switch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMetadata {
    pub mode: CoordinateSystem,
    pub origin_x_tl: f64,
    pub origin_y_tl: f64,
    pub video_height: u32,
}

impl Default for CoordinateMetadata {
    fn default() -> Self {
        Self {
            mode: CoordinateSystem::TopLeft,
            origin_x_tl: 0.0,
            origin_y_tl: 0.0,
            video_height: 0,
        }
    }
}

impl CoordinateMetadata {
    /// Effective origin of this system in Top-Left coordinates.
    ///
    /// Bottom-Left without a valid height falls back to the Top-Left origin.
    pub fn effective_origin_tl(&self) -> (f64, f64) {
        match self.mode {
            CoordinateSystem::TopLeft => (0.0, 0.0),
            CoordinateSystem::BottomLeft => {
                if self.video_height == 0 {
                    log::warn!(
                        "Cannot calculate Bottom-Left origin: video height not set. Using Top-Left origin."
                    );
                    (0.0, 0.0)
                } else {
                    (0.0, f64::from(self.video_height))
                }
            }
            CoordinateSystem::Custom => (self.origin_x_tl, self.origin_y_tl),
        }
    }
}

/// Current coordinate system state and transformations.
#[derive(Debug, Clone, Default)]
pub struct CoordinateTransformer {
    state: CoordinateMetadata,
}

impl CoordinateTransformer {
    /// Create a transformer in the Top-Left system with no video height.
    pub fn new() -> Self {
        log::debug!("CoordinateTransformer initialized in {} mode", CoordinateSystem::TopLeft);
        Self::default()
    }

    /// Set the video height used for Y inversion. Zero is rejected.
    pub fn set_video_height(&mut self, height: u32) {
        if height > 0 {
            self.state.video_height = height;
            log::debug!("Coordinate video height set to {}", height);
        } else {
            log::warn!(
                "Ignoring invalid video height {}; keeping {}",
                height,
                self.state.video_height
            );
        }
    }

    pub fn set_mode(&mut self, mode: CoordinateSystem) {
        if self.state.mode != mode {
            log::info!("Coordinate system changed from {} to {}", self.state.mode, mode);
            self.state.mode = mode;
        }
    }

    /// Define the custom origin (Top-Left coordinates) and switch to Custom mode.
    pub fn set_custom_origin(&mut self, x_tl: f64, y_tl: f64) {
        self.store_custom_origin(x_tl, y_tl);
        self.set_mode(CoordinateSystem::Custom);
    }

    /// Store the custom origin without changing the active mode.
    pub fn store_custom_origin(&mut self, x_tl: f64, y_tl: f64) {
        self.state.origin_x_tl = round_to(x_tl, COORD_DECIMALS);
        self.state.origin_y_tl = round_to(y_tl, COORD_DECIMALS);
        log::info!(
            "Custom origin set to ({:.3}, {:.3})",
            self.state.origin_x_tl,
            self.state.origin_y_tl
        );
    }

    /// Effective origin of the current mode, in Top-Left coordinates.
    pub fn current_origin_tl(&self) -> (f64, f64) {
        self.state.effective_origin_tl()
    }

    /// Convert canonical Top-Left coordinates to the current display system.
    pub fn transform_point_for_display(&self, x_tl: f64, y_tl: f64) -> (f64, f64) {
        let (ox, oy) = self.current_origin_tl();
        let rel_x = x_tl - ox;
        let rel_y = y_tl - oy;
        let display_y = if self.state.mode.flips_y() { -rel_y } else { rel_y };
        (round_to(rel_x, COORD_DECIMALS), round_to(display_y, COORD_DECIMALS))
    }

    /// Convert coordinates from an arbitrary source system back to Top-Left.
    ///
    /// `source_origin_tl` is the effective origin of the source system. The
    /// source is passed explicitly so files saved under a different system
    /// than the live one can be inverted.
    pub fn transform_point_to_internal(
        &self,
        x_display: f64,
        y_display: f64,
        source_mode: CoordinateSystem,
        source_origin_tl: (f64, f64),
        source_video_height: u32,
    ) -> (f64, f64) {
        let (ox, oy) = source_origin_tl;
        let rel_y = if source_mode.flips_y() {
            if source_mode == CoordinateSystem::BottomLeft && source_video_height == 0 {
                log::warn!(
                    "Source Bottom-Left system has no valid video height; origin may be inaccurate"
                );
            }
            -y_display
        } else {
            y_display
        };
        (
            round_to(x_display + ox, COORD_DECIMALS),
            round_to(rel_y + oy, COORD_DECIMALS),
        )
    }

    /// Settings to persist. Always includes the stored origin and height.
    pub fn metadata(&self) -> CoordinateMetadata {
        self.state
    }

    pub fn mode(&self) -> CoordinateSystem {
        self.state.mode
    }

    pub fn video_height(&self) -> u32 {
        self.state.video_height
    }

    /// Stored custom origin, regardless of the active mode.
    pub fn custom_origin_tl(&self) -> (f64, f64) {
        (self.state.origin_x_tl, self.state.origin_y_tl)
    }

    /// Return to the default state: Top-Left, zero origin, no video height.
    pub fn reset(&mut self) {
        self.state = CoordinateMetadata::default();
        log::debug!("CoordinateTransformer reset");
    }
}
