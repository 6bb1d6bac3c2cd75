//! The project store: one typed document holding every table the pipeline
//! reads and writes.
//!
//! Persistence to a spatial database is someone else's job; the stages
//! here exchange a serde document instead - JSON on disk, gzipped when the
//! path ends in `.gz`. Tables mirror the external schema: parameters,
//! slope raster rows, shoreline vertices, river nodes, river polylines,
//! ridge endpoints (Qs), ridges, cell-ridge memberships, and terrain
//! samples. Polylines are explicit coordinate triples, so there is no
//! byte-order ambiguity to negotiate.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures opening, parsing, or cross-referencing the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot access the store: {0}")]
    Io(#[from] io::Error),
    #[error("malformed store document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("missing or invalid parameter: {0}")]
    Parameter(&'static str),
    #[error("dangling reference in store: {0}")]
    DanglingReference(String),
}

/// Area and scale parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameters {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
    pub edge_length: f32,
    pub resolution: f32,
}

/// One cell of the river-slope raster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlopeRow {
    pub x: u32,
    pub y: u32,
    pub slope: f32,
}

/// One river node. Growth input fills only the first five fields; the
/// elevation stage expects the rest as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiverNodeRow {
    pub id: u64,
    /// Absent or equal to `id` marks a mouth.
    #[serde(default)]
    pub parent: Option<u64>,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub contour_index: Option<u64>,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub elevation: f32,
    #[serde(default)]
    pub local_watershed: f32,
    #[serde(default)]
    pub inherited_watershed: f32,
    #[serde(default)]
    pub flow: f32,
}

impl RiverNodeRow {
    pub fn is_mouth(&self) -> bool {
        self.parent.is_none() || self.parent == Some(self.id)
    }
}

/// A river polyline; z carries elevation along the river.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiverRow {
    pub id: u64,
    pub node: u64,
    pub points: Vec<[f32; 3]>,
}

/// A ridge endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QRow {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub elevation: f32,
    #[serde(default)]
    pub cells: Vec<u64>,
}

/// A ridge; `q1` absent marks a degenerate point-ridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRow {
    pub id: u64,
    pub q0: u64,
    #[serde(default)]
    pub q1: Option<u64>,
}

/// Ridges bounding one cell, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellRidgeRow {
    pub cell: u64,
    pub ridges: Vec<u64>,
}

/// One terrain sample; `elevation` is the elevation stage's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainRow {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub cell: u64,
    #[serde(default)]
    pub elevation: Option<f32>,
}

/// The whole store document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDoc {
    pub parameters: Parameters,
    #[serde(default)]
    pub river_slope: Vec<SlopeRow>,
    #[serde(default)]
    pub shoreline: Vec<[f32; 2]>,
    #[serde(default)]
    pub river_nodes: Vec<RiverNodeRow>,
    #[serde(default)]
    pub rivers: Vec<RiverRow>,
    #[serde(default)]
    pub qs: Vec<QRow>,
    #[serde(default)]
    pub ridges: Vec<RidgeRow>,
    #[serde(default)]
    pub cell_ridges: Vec<CellRidgeRow>,
    #[serde(default)]
    pub ts: Vec<TerrainRow>,
}

fn is_gz(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}

impl StoreDoc {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, StoreError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), StoreError> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Load from a path; `.gz` selects gzip transparently.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let file = BufReader::new(File::open(path)?);
        if is_gz(path) {
            Self::from_reader(GzDecoder::new(file))
        } else {
            Self::from_reader(file)
        }
    }

    /// Write to a path; `.gz` selects gzip transparently.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let file = BufWriter::new(File::create(path)?);
        if is_gz(path) {
            let mut encoder = GzEncoder::new(file, Compression::default());
            self.to_writer(&mut encoder)?;
            encoder.finish()?;
        } else {
            self.to_writer(file)?;
        }
        Ok(())
    }
}
