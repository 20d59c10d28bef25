// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! I/O for track files and project documents.

pub mod csv_format;
pub mod decisions;
pub mod serialization;
