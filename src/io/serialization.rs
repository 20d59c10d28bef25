// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Project document serialization and deserialization.
//!
//! Projects are written as JSON or YAML, chosen by file extension.

use crate::error::{Error, Result};
use crate::models::project::ProjectData;
use std::path::Path;

/// On-disk encoding of a project document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFormat {
    Json,
    Yaml,
}

impl ProjectFormat {
    /// Pick the encoding from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            _ => Err(Error::UnsupportedExtension(path.to_path_buf())),
        }
    }
}

/// Write a project to `path` in the format its extension names.
pub fn write_project(data: &ProjectData, path: &Path) -> Result<()> {
    match ProjectFormat::from_path(path)? {
        ProjectFormat::Json => export_json(data, path)?,
        ProjectFormat::Yaml => export_yaml(data, path)?,
    }
    log::info!(
        "Saved project with {} element(s) to {}",
        data.elements.len(),
        path.display()
    );
    Ok(())
}

/// Parse the project at `path`. Nothing is applied to a session here.
pub fn read_project(path: &Path) -> Result<ProjectData> {
    let data = match ProjectFormat::from_path(path)? {
        ProjectFormat::Json => import_json(path)?,
        ProjectFormat::Yaml => import_yaml(path)?,
    };
    log::info!(
        "Read project '{}' {} with {} element(s) from {}",
        data.project_info.app_name,
        data.project_info.app_version,
        data.elements.len(),
        path.display()
    );
    Ok(data)
}

/// Export project data to YAML format.
pub fn export_yaml(data: &ProjectData, path: &Path) -> Result<()> {
    let yaml = serde_yaml::to_string(data)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

/// Export project data to JSON format.
pub fn export_json(data: &ProjectData, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Import project data from YAML format.
pub fn import_yaml(path: &Path) -> Result<ProjectData> {
    let yaml = std::fs::read_to_string(path)?;
    let data = serde_yaml::from_str(&yaml)?;
    Ok(data)
}

/// Import project data from JSON format.
pub fn import_json(path: &Path) -> Result<ProjectData> {
    let json = std::fs::read_to_string(path)?;
    let data = serde_json::from_str(&json)?;
    Ok(data)
}
