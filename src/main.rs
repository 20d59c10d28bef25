// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! PyroTracker command line tool.
//!
//! Inspects track files and projects, and converts between them, re-saving
//! tracks under a different coordinate system or unit.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pyrotrack::io::csv_format;
use pyrotrack::io::decisions::{Decision, DecisionPort, NonInteractive};
use pyrotrack::io::serialization;
use pyrotrack::models::coordinates::CoordinateSystem;
use pyrotrack::models::project::{ProjectMetadata, VideoInfo};
use pyrotrack::models::scale::DisplayUnit;
use pyrotrack::{Diagnostics, LoadStatus, SaveOutcome, Session};
use std::path::{Path, PathBuf};

/// Track file and project tool
#[derive(Parser, Debug)]
#[command(name = "pyrotrack")]
#[command(author, version, about = "Inspect and convert PyroTracker track files and projects")]
#[command(propagate_version = true)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the settings, tracks and warnings of a track file or project
    Inspect {
        /// CSV track file, or JSON/YAML project
        file: PathBuf,
    },

    /// Load a track file or project and save it again
    Convert {
        input: PathBuf,
        /// Output path; `.csv` writes a track file, `.json`/`.yaml` a project
        output: PathBuf,
        /// Output coordinate system (top_left, bottom_left, custom)
        #[arg(long, value_parser = parse_mode)]
        mode: Option<CoordinateSystem>,
        /// Custom origin in top-left pixels, as X,Y
        #[arg(long, value_parser = parse_origin, allow_hyphen_values = true)]
        origin: Option<(f64, f64)>,
        /// Units for a CSV output (px or m); pixels unless given
        #[arg(long, value_parser = parse_units)]
        units: Option<DisplayUnit>,
        /// Scale factor in meters per pixel
        #[arg(long)]
        scale: Option<f64>,
        /// Replace the output file if it exists
        #[arg(short, long)]
        force: bool,
    },
}

fn parse_mode(value: &str) -> std::result::Result<CoordinateSystem, String> {
    value.parse().map_err(|e| format!("{}", e))
}

fn parse_origin(value: &str) -> std::result::Result<(f64, f64), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", value))?;
    let x = x.trim().parse().map_err(|_| format!("invalid X '{}'", x))?;
    let y = y.trim().parse().map_err(|_| format!("invalid Y '{}'", y))?;
    Ok((x, y))
}

fn parse_units(value: &str) -> std::result::Result<DisplayUnit, String> {
    DisplayUnit::parse_label(value).ok_or_else(|| format!("unknown units '{}'", value))
}

fn is_track_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

/// Load `path` into `session`, using the file's own video metadata as context.
fn load_input(session: &mut Session, path: &Path, diagnostics: &mut Diagnostics) -> Result<()> {
    let status = if is_track_file(path) {
        let file = csv_format::read_track_file(path)
            .with_context(|| format!("Failed to read track file {}", path.display()))?;
        let metadata = ProjectMetadata::from_text_pairs(&file.metadata);
        session.set_video(VideoInfo::from_metadata(&metadata));
        session.load_track_file(&file, &mut NonInteractive::default(), diagnostics)?
    } else {
        let data = serialization::read_project(path)
            .with_context(|| format!("Failed to read project {}", path.display()))?;
        if let Some(metadata) = &data.metadata {
            session.set_video(VideoInfo::from_metadata(metadata));
        }
        session
            .apply_project(&data, diagnostics)
            .with_context(|| format!("Failed to apply project {}", path.display()))?
    };

    match status {
        LoadStatus::Loaded => Ok(()),
        LoadStatus::Cancelled => bail!("Loading {} was cancelled", path.display()),
        LoadStatus::Failed => bail!("Tracks in {} could not be processed", path.display()),
    }
}

fn print_warnings(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        return;
    }
    println!("{} warning(s):", diagnostics.len());
    for warning in diagnostics.warnings() {
        println!("  - {}", warning);
    }
}

fn inspect(path: &Path) -> Result<()> {
    let mut session = Session::new();
    let mut diagnostics = Diagnostics::new();
    load_input(&mut session, path, &mut diagnostics)?;

    println!("{}", path.display());
    match session.video() {
        Some(video) => println!(
            "  video: '{}' {}x{}, {} frames at {} fps",
            video.filename, video.width, video.height, video.frame_count, video.fps
        ),
        None => println!("  video: none recorded"),
    }
    let coords = session.transformer().metadata();
    let (ox, oy) = session.transformer().current_origin_tl();
    println!(
        "  coordinates: {} (origin {:.3}, {:.3}; height {})",
        coords.mode, ox, oy, coords.video_height
    );
    match session.scale().scale_m_per_px() {
        Some(scale) => println!(
            "  scale: {} m/px, display in {}",
            scale,
            session.scale().display_unit_short()
        ),
        None => println!("  scale: not set"),
    }
    println!("  tracks: {}", session.tracks().track_count());
    for (summary, track) in session
        .tracks()
        .track_summary()
        .iter()
        .zip(session.tracks().tracks())
    {
        println!(
            "    track {}: {} point(s), frames {}..{}, {}",
            summary.track_id,
            summary.point_count,
            summary.start_frame,
            summary.end_frame,
            track.visibility
        );
    }
    println!("  measurement lines: {}", session.tracks().line_count());
    for (index, line) in session.tracks().measurement_lines().iter().enumerate() {
        println!(
            "    line {}: frame {}, {}, {}",
            index + 1,
            line.frame_index(),
            line.length_label(session.scale().scale_m_per_px()),
            line.visibility
        );
    }
    print_warnings(&diagnostics);
    Ok(())
}

struct ConvertOptions {
    mode: Option<CoordinateSystem>,
    origin: Option<(f64, f64)>,
    units: Option<DisplayUnit>,
    scale: Option<f64>,
    force: bool,
}

fn convert(input: &Path, output: &Path, options: ConvertOptions) -> Result<()> {
    let mut session = Session::new();
    let mut diagnostics = Diagnostics::new();
    load_input(&mut session, input, &mut diagnostics)?;

    if let Some(scale) = options.scale {
        if !(scale.is_finite() && scale > 0.0) {
            bail!("Scale must be a positive number of meters per pixel");
        }
        session.scale_mut().set_scale(Some(scale), false, None);
    }
    if let Some((x, y)) = options.origin {
        session.transformer_mut().set_custom_origin(x, y);
    }
    if let Some(mode) = options.mode {
        session.transformer_mut().set_mode(mode);
    }

    let mut port = NonInteractive::new(options.force);
    if is_track_file(output) {
        if output.exists() && port.confirm_overwrite(output) == Decision::Cancel {
            bail!("{} exists; use --force to replace it", output.display());
        }
        let units = options.units.unwrap_or(DisplayUnit::Pixels);
        let count = session
            .write_tracks_csv(output, units)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!(
            "Wrote {} point(s) to {} ({}, {})",
            count,
            output.display(),
            session.transformer().mode(),
            units.as_str()
        );
    } else {
        if options.units == Some(DisplayUnit::Meters) {
            eprintln!("Projects always store pixels; ignoring --units");
        }
        match session.save_project(output, &mut port)? {
            SaveOutcome::Saved { point_count, .. } => {
                println!("Wrote project with {} point(s) to {}", point_count, output.display())
            }
            SaveOutcome::Cancelled => {
                bail!("{} exists; use --force to replace it", output.display())
            }
        }
    }
    print_warnings(&diagnostics);
    Ok(())
}

/// Warnings are printed in each command's report, so they stay out of the log by default.
fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "error"
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_log_filter(cli.verbose)),
    )
        .init();

    match cli.command {
        Commands::Inspect { file } => inspect(&file),
        Commands::Convert {
            input,
            output,
            mode,
            origin,
            units,
            scale,
            force,
        } => convert(
            &input,
            &output,
            ConvertOptions {
                mode,
                origin,
                units,
                scale,
                force,
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert_options() -> ConvertOptions {
        ConvertOptions {
            mode: None,
            origin: None,
            units: None,
            scale: None,
            force: false,
        }
    }

    fn write_meters_file(path: &Path) {
        let mut session = Session::new();
        session.set_video(Some(VideoInfo::new("clip.mp4", 640, 480, 100, 25.0)));
        session.tracks_mut().create_new_track();
        session.tracks_mut().add_point(0, 0.0, 100.0, 200.0);
        session.scale_mut().set_scale(Some(0.01), false, None);
        session.write_tracks_csv(path, DisplayUnit::Meters).unwrap();
    }

    #[test]
    fn test_convert_writes_pixels_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("meters.csv");
        let output = dir.path().join("out.csv");
        write_meters_file(&input);

        convert(&input, &output, convert_options()).unwrap();
        let written = csv_format::read_track_file(&output).unwrap();
        assert_eq!(written.get("Data Units"), Some("px"));
        assert_eq!(written.rows[0].x, 100.0);
    }

    #[test]
    fn test_convert_writes_meters_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("meters.csv");
        let output = dir.path().join("out.csv");
        write_meters_file(&input);

        let options = ConvertOptions {
            units: Some(DisplayUnit::Meters),
            ..convert_options()
        };
        convert(&input, &output, options).unwrap();
        let written = csv_format::read_track_file(&output).unwrap();
        assert_eq!(written.get("Data Units"), Some("m"));
    }

    #[test]
    fn test_warnings_are_not_logged_by_default() {
        assert_eq!(default_log_filter(false), "error");
        assert_eq!(default_log_filter(true), "debug");
    }

    #[test]
    fn test_origin_argument() {
        assert_eq!(parse_origin("-1.5, 2"), Ok((-1.5, 2.0)));
        assert!(parse_origin("3").is_err());
    }
}
