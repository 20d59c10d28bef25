// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! CSV track files.
//!
//! A track file is a block of `# <key>: <value>` metadata lines, a fixed
//! header row, then one `track_id,frame_index,time_ms,x,y` row per point.
//! Coordinates are stored in whatever system and unit the metadata records;
//! converting them is the caller's job.
//!
//! The metadata block is scanned line by line; the header and rows go
//! through the `csv` reader, so quoted cells are accepted. Structural
//! problems abort the read with [`Error::Format`] carrying the 1-based line
//! number of the file. No partial result is returned.

use crate::config::{
    CSV_HEADER, CSV_METADATA_PREFIX, METER_DECIMALS, PIXEL_DECIMALS, TIME_DECIMALS,
};
use crate::error::{Error, Result};
use crate::models::scale::DisplayUnit;
use crate::models::track::RawPoint;
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

/// Parsed contents of a track file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackFile {
    /// Metadata pairs in file order
    pub metadata: Vec<(String, String)>,
    pub rows: Vec<RawPoint>,
}

impl TrackFile {
    /// Value of the first metadata entry named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Write a track file to `path`, replacing any existing file.
pub fn write_track_file(
    path: &Path,
    metadata: &[(String, String)],
    rows: &[RawPoint],
    units: DisplayUnit,
) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_tracks(&mut writer, metadata, rows, units)?;
    writer.flush()?;
    log::info!("Wrote {} point(s) to {}", rows.len(), path.display());
    Ok(())
}

/// Write metadata, header and rows. Coordinate precision follows `units`.
pub fn write_tracks<W: Write>(
    writer: &mut W,
    metadata: &[(String, String)],
    rows: &[RawPoint],
    units: DisplayUnit,
) -> Result<()> {
    for (key, value) in metadata {
        writeln!(writer, "{}{}: {}", CSV_METADATA_PREFIX, key, value)?;
    }

    let coord_decimals = match units {
        DisplayUnit::Pixels => PIXEL_DECIMALS,
        DisplayUnit::Meters => METER_DECIMALS,
    };
    let mut csv_writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(&mut *writer);
    csv_writer
        .write_record(CSV_HEADER)
        .map_err(std::io::Error::from)?;
    for row in rows {
        csv_writer
            .write_record(&[
                row.track_id.to_string(),
                row.frame_index.to_string(),
                format!("{:.*}", TIME_DECIMALS, row.time_ms),
                format!("{:.*}", coord_decimals, row.x),
                format!("{:.*}", coord_decimals, row.y),
            ])
            .map_err(std::io::Error::from)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Read and parse the track file at `path`.
pub fn read_track_file(path: &Path) -> Result<TrackFile> {
    let file = File::open(path)?;
    let parsed = parse_tracks(BufReader::new(file))?;
    log::info!(
        "Read {} metadata entries and {} row(s) from {}",
        parsed.metadata.len(),
        parsed.rows.len(),
        path.display()
    );
    Ok(parsed)
}

/// Parse a track file from any buffered reader.
pub fn parse_tracks<R: BufRead>(mut reader: R) -> Result<TrackFile> {
    let marker = CSV_METADATA_PREFIX.trim_end();
    let mut parsed = TrackFile::default();
    let mut line_number = 0;
    let mut line = String::new();

    // Metadata block, up to the first other non-blank line.
    let header_line = loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(Error::format(line_number.max(1), "missing header row"));
        }
        line_number += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some(rest) = trimmed.strip_prefix(marker) else {
            break std::mem::take(&mut line);
        };
        match rest.split_once(':') {
            Some((key, value)) => parsed
                .metadata
                .push((key.trim().to_string(), value.trim().to_string())),
            None => log::debug!("Line {}: comment without key ignored", line_number),
        }
    };

    // csv positions count from the header line.
    let offset = line_number - 1;
    let header_text = header_line.trim().to_string();
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(Cursor::new(header_line.into_bytes()).chain(reader));

    let header = csv_reader
        .headers()
        .map_err(|e| csv_error(e, offset))?
        .clone();
    if !is_header(&header) {
        return Err(Error::format(
            offset + 1,
            format!(
                "expected header '{}', found '{}'",
                CSV_HEADER.join(","),
                header_text
            ),
        ));
    }

    for result in csv_reader.records() {
        let record = result.map_err(|e| csv_error(e, offset))?;
        let line_number = record
            .position()
            .map_or(offset + 1, |p| offset + p.line() as usize);
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.get(0).is_some_and(|cell| cell.starts_with(marker)) {
            let position = if parsed.rows.is_empty() {
                "after the header"
            } else {
                "after data rows"
            };
            return Err(Error::format(
                line_number,
                format!("metadata line found {}", position),
            ));
        }
        parsed.rows.push(parse_row(&record, line_number)?);
    }
    Ok(parsed)
}

/// Map a csv failure to a file line; I/O failures pass through.
fn csv_error(err: csv::Error, offset: usize) -> Error {
    let line = err
        .position()
        .map_or(offset + 1, |p| offset + p.line() as usize);
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(io) => Error::Io(io),
        _ => Error::format(line, message),
    }
}

/// Header comparison ignoring case and whitespace.
fn is_header(record: &StringRecord) -> bool {
    record.len() == CSV_HEADER.len()
        && record
            .iter()
            .map(normalize_cell)
            .zip(CSV_HEADER)
            .all(|(a, b)| a == b)
}

fn normalize_cell(cell: &str) -> String {
    cell.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_row(record: &StringRecord, line_number: usize) -> Result<RawPoint> {
    if record.len() != CSV_HEADER.len() {
        return Err(Error::format(
            line_number,
            format!(
                "expected {} columns, found {}",
                CSV_HEADER.len(),
                record.len()
            ),
        ));
    }
    let cell = |index: usize| record.get(index).unwrap_or_default();

    let track_id: i64 = parse_cell(cell(0), CSV_HEADER[0], line_number)?;
    let frame_index: i64 = parse_cell(cell(1), CSV_HEADER[1], line_number)?;
    let time_ms: f64 = parse_cell(cell(2), CSV_HEADER[2], line_number)?;
    let x: f64 = parse_cell(cell(3), CSV_HEADER[3], line_number)?;
    let y: f64 = parse_cell(cell(4), CSV_HEADER[4], line_number)?;

    if track_id <= 0 {
        return Err(Error::format(
            line_number,
            format!("track_id must be positive, found {}", track_id),
        ));
    }
    if frame_index < 0 {
        return Err(Error::format(
            line_number,
            format!("frame_index must not be negative, found {}", frame_index),
        ));
    }
    Ok(RawPoint::new(track_id, frame_index, time_ms, x, y))
}

fn parse_cell<T: std::str::FromStr>(cell: &str, column: &str, line_number: usize) -> Result<T> {
    cell.parse().map_err(|_| {
        Error::format(
            line_number,
            format!("invalid numeric value '{}' in column '{}'", cell, column),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<TrackFile> {
        parse_tracks(Cursor::new(text))
    }

    fn format_line(result: Result<TrackFile>) -> usize {
        match result {
            Err(Error::Format { line, .. }) => line,
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_write_precision() {
        let metadata = vec![("Data Units".to_string(), "px".to_string())];
        let rows = [RawPoint::new(1, 0, 1.0 / 3.0, 10.0, 20.123456)];
        let mut out = Vec::new();
        write_tracks(&mut out, &metadata, &rows, DisplayUnit::Pixels).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "# Data Units: px\ntrack_id,frame_index,time_ms,x,y\n1,0,0.3333,10.0000,20.1235\n"
        );

        let mut out = Vec::new();
        write_tracks(&mut out, &[], &[RawPoint::new(2, 5, 200.0, 0.2, 0.4)], DisplayUnit::Meters)
            .unwrap();
        assert!(String::from_utf8(out)
            .unwrap()
            .ends_with("2,5,200.0000,0.200000,0.400000\n"));
    }

    #[test]
    fn test_parse_metadata_and_rows() {
        let parsed = parse(
            "# Frame Width: 640\n# Video Filename: a:b.mp4\n\n Track_ID, Frame_Index ,TIME_MS,x,y\r\n1,0,0.0,10.5,20\n\n2,3,120,1,2\n",
        )
        .unwrap();
        assert_eq!(parsed.get("Frame Width"), Some("640"));
        assert_eq!(parsed.get("Video Filename"), Some("a:b.mp4"));
        assert_eq!(
            parsed.rows,
            vec![
                RawPoint::new(1, 0, 0.0, 10.5, 20.0),
                RawPoint::new(2, 3, 120.0, 1.0, 2.0)
            ]
        );
    }

    #[test]
    fn test_quoted_header_and_cells() {
        let parsed = parse(
            "# FPS: 25\n\"track_id\",\"frame_index\",\"time_ms\",\"x\",\"y\"\n\"1\",\"0\",\"0.0\",\"10\",\"20\"\n",
        )
        .unwrap();
        assert_eq!(parsed.get("FPS"), Some("25"));
        assert_eq!(parsed.rows, vec![RawPoint::new(1, 0, 0.0, 10.0, 20.0)]);
    }

    #[test]
    fn test_row_errors_count_metadata_lines() {
        let text = "# FPS: 25\n\ntrack_id,frame_index,time_ms,x,y\n1,0,0,1,1\n1,1,40,x,1\n";
        assert_eq!(format_line(parse(text)), 5);
    }

    #[test]
    fn test_metadata_after_header_is_error() {
        assert_eq!(format_line(parse("track_id,frame_index,time_ms,x,y\n# FPS: 25\n")), 2);
        assert_eq!(
            format_line(parse("track_id,frame_index,time_ms,x,y\n1,0,0,1,1\n# FPS: 25\n")),
            3
        );
    }

    #[test]
    fn test_data_before_header_is_error() {
        assert_eq!(format_line(parse("# FPS: 25\n1,0,0,1,1\n")), 2);
    }

    #[test]
    fn test_missing_header_is_error() {
        assert!(matches!(parse("# FPS: 25\n"), Err(Error::Format { .. })));
        assert!(matches!(parse(""), Err(Error::Format { line: 1, .. })));
    }

    #[test]
    fn test_bad_rows_are_errors() {
        let header = "track_id,frame_index,time_ms,x,y\n";
        assert_eq!(format_line(parse(&format!("{header}1,0,0,1\n"))), 2);
        assert_eq!(format_line(parse(&format!("{header}1,0,0,abc,1\n"))), 2);
        assert_eq!(format_line(parse(&format!("{header}1,0,0,1,1\n0,0,0,1,1\n"))), 3);
        assert_eq!(format_line(parse(&format!("{header}1,-1,0,1,1\n"))), 2);
        assert_eq!(format_line(parse(&format!("{header}1,0.5,0,1,1\n"))), 2);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.csv");
        let metadata = vec![("FPS".to_string(), "25".to_string())];
        let rows = [RawPoint::new(1, 2, 80.0, 3.5, 4.25)];
        write_track_file(&path, &metadata, &rows, DisplayUnit::Pixels).unwrap();

        let parsed = read_track_file(&path).unwrap();
        assert_eq!(parsed.metadata, metadata);
        assert_eq!(parsed.rows, rows.to_vec());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_track_file(&dir.path().join("absent.csv"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
