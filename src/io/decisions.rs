// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Confirmation points in the save and load pipelines.
//!
//! The pipelines never prompt anyone themselves. Where a user decision is
//! needed they ask a [`DecisionPort`]; a GUI answers with dialogs, the CLI
//! with flags, and tests with fixed answers.

use std::path::Path;

/// Units chosen for a track-file save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitDecision {
    ProceedInPixels,
    ProceedInMeters,
    Cancel,
}

/// A yes/no confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Cancel,
}

/// Answers the questions the pipelines cannot decide on their own.
pub trait DecisionPort {
    /// Units to save in. Only asked when meters are displayed and a scale
    /// exists, since saving pixels then loses the user's chosen unit.
    fn choose_save_units(&mut self, display_in_meters: bool, scale_m_per_px: f64) -> UnitDecision;

    /// Whether an existing file may be replaced.
    fn confirm_overwrite(&mut self, path: &Path) -> Decision;

    /// Whether to load a file whose metadata disagrees with the current video.
    fn confirm_metadata_mismatch(&mut self, warnings: &[String]) -> Decision;
}

/// Fixed answers for callers without a user to ask.
///
/// Saves in pixels, proceeds past metadata mismatches, and overwrites only
/// when told to.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive {
    pub allow_overwrite: bool,
}

impl NonInteractive {
    pub fn new(allow_overwrite: bool) -> Self {
        Self { allow_overwrite }
    }
}

impl DecisionPort for NonInteractive {
    fn choose_save_units(&mut self, display_in_meters: bool, _scale_m_per_px: f64) -> UnitDecision {
        if display_in_meters {
            log::info!("No interactive unit choice available; saving in pixels");
        }
        UnitDecision::ProceedInPixels
    }

    fn confirm_overwrite(&mut self, path: &Path) -> Decision {
        if self.allow_overwrite {
            log::info!("Overwriting {}", path.display());
            Decision::Proceed
        } else {
            log::warn!("Refusing to overwrite {}", path.display());
            Decision::Cancel
        }
    }

    fn confirm_metadata_mismatch(&mut self, warnings: &[String]) -> Decision {
        if !warnings.is_empty() {
            log::info!("Proceeding despite {} metadata warning(s)", warnings.len());
        }
        Decision::Proceed
    }
}
