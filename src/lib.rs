// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! PyroTracker core.
//!
//! Tracks point features across video frames and persists them through
//! user-selected coordinate systems and units without losing precision.
//!
//! All points are stored in a canonical system: origin at the top-left
//! pixel, Y increasing downwards, pixel units. Coordinate systems
//! ([`models::coordinates`]) and the metric scale ([`models::scale`]) are
//! applied only when data is displayed or crosses the file boundary
//! ([`session`]).

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod io;
pub mod models;
pub mod session;
pub mod util;

pub use diagnostics::Diagnostics;
pub use error::{Error, Result};
pub use session::{LoadStatus, SaveOutcome, Session};
