// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Geometric and numeric utility functions.
//!
//! Rounding helpers shared by the coordinate and scale transforms, squared
//! distances for hit testing, and number formatting for the file formats.

/// Round `value` to `decimals` decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    // Avoid writing "-0.000" for values that round to zero.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Squared euclidean distance between two points.
pub fn distance_sq(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let dx = ax - bx;
    let dy = ay - by;
    dx * dx + dy * dy
}

/// Euclidean distance between two points.
pub fn distance(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    distance_sq(ax, ay, bx, by).sqrt()
}

/// Format `value` with at most `digits` significant digits.
///
/// Trailing zeros are trimmed. Very large or small magnitudes switch to
/// exponent notation, which `str::parse::<f64>` reads back.
pub fn format_significant(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{}", value);
    }
    let digits = digits.max(1);
    let exponent = value.abs().log10().floor() as i32;
    if exponent < -5 || exponent >= digits as i32 {
        return format!("{:.*e}", digits - 1, value);
    }
    let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
    let text = format!("{:.*}", decimals, value);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}
