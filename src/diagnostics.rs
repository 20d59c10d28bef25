// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Diagnostics sink for recoverable warnings.
//!
//! Loading and saving collect per-point and per-field warnings instead of
//! failing. Every warning pushed here is logged through the `log` facade and
//! kept so that it can be handed back to the caller as data. An optional
//! callback lets a host forward warnings as they occur.

use std::fmt;

/// Callback invoked for every warning as it is recorded.
pub type WarningCallback = Box<dyn FnMut(&str)>;

/// Collects warnings and logs them as they arrive.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Vec<String>,
    callback: Option<WarningCallback>,
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("warnings", &self.warnings)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl Diagnostics {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that also forwards each warning to `callback`.
    pub fn with_callback(callback: WarningCallback) -> Self {
        Self {
            warnings: Vec::new(),
            callback: Some(callback),
        }
    }

    /// Record a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        if let Some(callback) = self.callback.as_mut() {
            callback(&message);
        }
        self.warnings.push(message);
    }

    /// Record warnings produced elsewhere (already logged by their producer).
    pub fn extend_quiet<I: IntoIterator<Item = String>>(&mut self, warnings: I) {
        for message in warnings {
            if let Some(callback) = self.callback.as_mut() {
                callback(&message);
            }
            self.warnings.push(message);
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Consume the sink, returning the collected warnings in order.
    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}
