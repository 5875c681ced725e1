//! Coordinate-list tensor data files.
//!
//! Two serializations of the same nonzero list are supported: bare `tns`
//! (one `c₀ … cₙ₋₁ value` line per nonzero) and MatrixMarket-style `ttx`
//! (a `%%MatrixMarket …` header and a dimensions-plus-count line first).

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// On-disk serialization of tensor data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorFileFormat {
    #[default]
    Tns,
    Ttx,
}

impl TensorFileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TensorFileFormat::Tns => "tns",
            TensorFileFormat::Ttx => "ttx",
        }
    }
}

impl fmt::Display for TensorFileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TensorFileFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tns" => Ok(TensorFileFormat::Tns),
            "ttx" => Ok(TensorFileFormat::Ttx),
            other => bail!("unsupported tensor storage format: {other}"),
        }
    }
}

/// Nonzero entries of one tensor, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct CoordinateData {
    pub coordinates: Vec<Vec<usize>>,
    pub values: Vec<f64>,
}

impl CoordinateData {
    pub fn push(&mut self, coordinate: Vec<usize>, value: f64) {
        self.coordinates.push(coordinate);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

/// Write a coordinate list in the requested format.
pub fn write_coordinate_file(
    shape: &[usize],
    data: &CoordinateData,
    format: TensorFileFormat,
    path: &Path,
) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create data file {}", path.display()))?;
    let mut out = BufWriter::new(file);

    if format == TensorFileFormat::Ttx {
        let header = if shape.len() == 2 {
            "%%MatrixMarket matrix coordinate real general"
        } else {
            "%%MatrixMarket tensor coordinate real general"
        };
        writeln!(out, "{header}")?;
        for dim in shape {
            write!(out, "{dim} ")?;
        }
        writeln!(out, "{}", data.len())?;
    }

    for (coordinate, value) in data.coordinates.iter().zip(&data.values) {
        for c in coordinate {
            write!(out, "{c} ")?;
        }
        writeln!(out, "{value}")?;
    }
    out.flush()?;
    Ok(())
}

/// Read a coordinate file into a `coordinate → value` map.
///
/// Format is sniffed per line: `%`-prefixed comment lines are skipped, and
/// when a MatrixMarket header was seen the following dimensions line is
/// skipped too, so the same reader serves both `tns` and `ttx` outputs.
pub fn read_coordinate_file(path: &Path) -> Result<HashMap<Vec<usize>, f64>> {
    let file =
        File::open(path).with_context(|| format!("failed to open data file {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut entries = HashMap::new();
    let mut expect_dimensions = false;
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('%') {
            expect_dimensions = true;
            continue;
        }
        if expect_dimensions {
            expect_dimensions = false;
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 2 {
            bail!("malformed data line in {}: {line}", path.display());
        }
        let (coords, value) = tokens.split_at(tokens.len() - 1);
        let coordinate: Vec<usize> = coords
            .iter()
            .map(|t| t.parse::<usize>())
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("bad coordinate in {}: {line}", path.display()))?;
        let value: f64 = value[0]
            .parse()
            .with_context(|| format!("bad value in {}: {line}", path.display()))?;
        entries.insert(coordinate, value);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> CoordinateData {
        let mut data = CoordinateData::default();
        data.push(vec![0, 1], 0.25);
        data.push(vec![2, 0], 0.5);
        data
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("tns".parse::<TensorFileFormat>().unwrap(), TensorFileFormat::Tns);
        assert_eq!("TTX".parse::<TensorFileFormat>().unwrap(), TensorFileFormat::Ttx);
        assert!("csv".parse::<TensorFileFormat>().is_err());
    }

    #[test]
    fn test_tns_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("B.tns");
        write_coordinate_file(&[3, 2], &sample_data(), TensorFileFormat::Tns, &path).unwrap();

        let blob = std::fs::read_to_string(&path).unwrap();
        assert_eq!(blob, "0 1 0.25\n2 0 0.5\n");

        let entries = read_coordinate_file(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[&vec![0, 1]], 0.25);
    }

    #[test]
    fn test_ttx_header_matches_rank() {
        let dir = tempfile::tempdir().unwrap();

        let matrix = dir.path().join("B.ttx");
        write_coordinate_file(&[3, 2], &sample_data(), TensorFileFormat::Ttx, &matrix).unwrap();
        let blob = std::fs::read_to_string(&matrix).unwrap();
        assert!(blob.starts_with("%%MatrixMarket matrix coordinate real general\n3 2 2\n"));

        let mut cube = CoordinateData::default();
        cube.push(vec![0, 0, 0], 0.1);
        let tensor = dir.path().join("C.ttx");
        write_coordinate_file(&[3, 2, 4], &cube, TensorFileFormat::Ttx, &tensor).unwrap();
        let blob = std::fs::read_to_string(&tensor).unwrap();
        assert!(blob.starts_with("%%MatrixMarket tensor coordinate real general\n"));
    }

    #[test]
    fn test_reader_skips_ttx_preamble() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("B.ttx");
        write_coordinate_file(&[3, 2], &sample_data(), TensorFileFormat::Ttx, &path).unwrap();

        let entries = read_coordinate_file(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[&vec![2, 0]], 0.5);
    }
}
