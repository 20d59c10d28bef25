// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Core data models: tracks, coordinate systems, scale and the project document.

pub mod coordinates;
pub mod events;
pub mod measurement;
pub mod project;
pub mod scale;
pub mod track;
pub mod track_manager;
