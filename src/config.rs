// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Shared constants.
//!
//! Application identity, metadata key names used by both the CSV track
//! format and the project document, style identifiers for visual elements,
//! and the numeric precisions applied at the serialization boundary.

pub const APP_NAME: &str = "PyroTracker";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// Metadata keys
pub const META_APP_NAME: &str = "Application Name";
pub const META_APP_VERSION: &str = "Application Version";
pub const META_FILENAME: &str = "Video Filename";
pub const META_WIDTH: &str = "Frame Width";
pub const META_HEIGHT: &str = "Frame Height";
pub const META_FRAMES: &str = "Frame Count";
pub const META_FPS: &str = "FPS";
pub const META_DURATION: &str = "Duration (ms)";
pub const META_COORD_SYSTEM_MODE: &str = "Coordinate System Mode";
pub const META_COORD_ORIGIN_X_TL: &str = "Coordinate Origin X (TL)";
pub const META_COORD_ORIGIN_Y_TL: &str = "Coordinate Origin Y (TL)";
pub const META_COORD_HEIGHT: &str = "Coordinate System Height";
pub const META_SCALE_FACTOR_M_PER_PX: &str = "Scale Factor (m/px)";
pub const META_DATA_UNITS: &str = "Data Units";
pub const META_DISPLAY_IN_METERS: &str = "display_in_meters";
pub const META_SCALE_LINE_P1X: &str = "Scale Line P1 X (Scene px)";
pub const META_SCALE_LINE_P1Y: &str = "Scale Line P1 Y (Scene px)";
pub const META_SCALE_LINE_P2X: &str = "Scale Line P2 X (Scene px)";
pub const META_SCALE_LINE_P2Y: &str = "Scale Line P2 Y (Scene px)";
pub const META_SHOW_MEASUREMENT_LINE_LENGTHS: &str = "Show Measurement Line Lengths";

/// Keys every CSV track file is expected to carry. Missing keys are warnings.
pub const EXPECTED_CSV_METADATA_KEYS: &[&str] = &[
    META_APP_NAME,
    META_APP_VERSION,
    META_FILENAME,
    META_WIDTH,
    META_HEIGHT,
    META_FRAMES,
    META_FPS,
    META_DURATION,
    META_COORD_SYSTEM_MODE,
    META_COORD_ORIGIN_X_TL,
    META_COORD_ORIGIN_Y_TL,
    META_COORD_HEIGHT,
    META_SCALE_FACTOR_M_PER_PX,
    META_DATA_UNITS,
];

/// Sentinel for an absent scale factor or scale line.
pub const NOT_AVAILABLE: &str = "N/A";

pub const UNITS_PIXELS: &str = "px";
pub const UNITS_METERS: &str = "m";

// CSV layout
pub const CSV_METADATA_PREFIX: &str = "# ";
pub const CSV_HEADER: [&str; 5] = ["track_id", "frame_index", "time_ms", "x", "y"];

// Write precisions (decimal places)
pub const TIME_DECIMALS: usize = 4;
pub const PIXEL_DECIMALS: usize = 4;
pub const METER_DECIMALS: usize = 6;
pub const SCALE_SIGNIFICANT_DIGITS: usize = 8;

/// Decimal places kept for canonical coordinates and origins.
pub const COORD_DECIMALS: i32 = 3;

// Style identifiers used for drawing
pub const STYLE_MARKER_ACTIVE_CURRENT: &str = "marker_active_current";
pub const STYLE_MARKER_ACTIVE_OTHER: &str = "marker_active_other";
pub const STYLE_MARKER_INACTIVE_CURRENT: &str = "marker_inactive_current";
pub const STYLE_MARKER_INACTIVE_OTHER: &str = "marker_inactive_other";
pub const STYLE_LINE_ACTIVE: &str = "line_active";
pub const STYLE_LINE_INACTIVE: &str = "line_inactive";

// Hit testing
pub const CLICK_TOLERANCE: f64 = 10.0;
pub const CLICK_TOLERANCE_SQ: f64 = CLICK_TOLERANCE * CLICK_TOLERANCE;

// Measurement line lengths
pub const LENGTH_UNIT_PREFIXES: [(f64, &str); 6] = [
    (1e3, "km"),
    (1.0, "m"),
    (1e-2, "cm"),
    (1e-3, "mm"),
    (1e-6, "µm"),
    (1e-9, "nm"),
];
pub const SCIENTIFIC_NOTATION_UPPER_THRESHOLD: f64 = 1000e3;
pub const SCIENTIFIC_NOTATION_LOWER_THRESHOLD: f64 = 1e-9;
