//! Bookkeeping of derived data for an HCS experiment.
//!
//! An [`Experiment`] holds plates, plates hold wells and wells hold
//! organoids. Wells and organoids reference raw images, segmentations and
//! measurements by name; paths are stored relative to the experiment root.

pub mod experiment;
pub mod organoid;
pub mod plate;
pub mod well;

pub use experiment::Experiment;
pub use organoid::OrganoidRecord;
pub use plate::PlateRecord;
pub use well::WellRecord;

use crate::utils::error::{HcsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Raw,
    Segmentation,
    Measurement,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileKind::Raw => "raw",
            FileKind::Segmentation => "segmentation",
            FileKind::Measurement => "measurement",
        };
        f.write_str(s)
    }
}

impl FromStr for FileKind {
    type Err = HcsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(FileKind::Raw),
            "segmentation" => Ok(FileKind::Segmentation),
            "measurement" => Ok(FileKind::Measurement),
            other => Err(HcsError::ValidationError {
                message: format!("unknown file kind '{}'", other),
            }),
        }
    }
}

/// Named files attached to a well or an organoid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFiles {
    root_dir: PathBuf,
    pub raw_files: BTreeMap<String, String>,
    pub segmentations: BTreeMap<String, String>,
    pub measurements: BTreeMap<String, String>,
}

impl RecordFiles {
    pub(crate) fn new(root_dir: &Path) -> Self {
        Self {
            root_dir: root_dir.to_path_buf(),
            ..Default::default()
        }
    }

    /// `path` relative to the root directory. Absolute paths must lie below
    /// the root; either way the file has to exist.
    fn relative_location(&self, path: &str) -> Result<String> {
        let candidate = Path::new(path);
        let relative = match candidate.strip_prefix(&self.root_dir) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) if candidate.is_absolute() => {
                return Err(HcsError::ValidationError {
                    message: format!(
                        "{} is not inside {}",
                        path,
                        self.root_dir.display()
                    ),
                })
            }
            Err(_) => candidate.to_path_buf(),
        };
        let full = self.root_dir.join(&relative);
        if !full.exists() {
            return Err(HcsError::ValidationError {
                message: format!("File {} does not exist.", full.display()),
            });
        }
        Ok(relative.to_string_lossy().into_owned())
    }

    fn map_mut(&mut self, kind: FileKind) -> &mut BTreeMap<String, String> {
        match kind {
            FileKind::Raw => &mut self.raw_files,
            FileKind::Segmentation => &mut self.segmentations,
            FileKind::Measurement => &mut self.measurements,
        }
    }

    pub fn add(&mut self, kind: FileKind, name: &str, path: &str) -> Result<()> {
        let relative = self.relative_location(path)?;
        self.map_mut(kind).insert(name.to_string(), relative);
        Ok(())
    }

    pub fn add_raw_file(&mut self, name: &str, path: &str) -> Result<()> {
        self.add(FileKind::Raw, name, path)
    }

    pub fn add_segmentation(&mut self, name: &str, path: &str) -> Result<()> {
        self.add(FileKind::Segmentation, name, path)
    }

    pub fn add_measurement(&mut self, name: &str, path: &str) -> Result<()> {
        self.add(FileKind::Measurement, name, path)
    }

    /// Absolute location of a stored relative path.
    pub fn source_location(&self, relative: &str) -> PathBuf {
        self.root_dir.join(relative)
    }

    /// All entries as `(kind, name, relative path)`.
    pub fn entries(&self) -> impl Iterator<Item = (FileKind, &str, &str)> {
        tagged(FileKind::Raw, &self.raw_files)
            .chain(tagged(FileKind::Segmentation, &self.segmentations))
            .chain(tagged(FileKind::Measurement, &self.measurements))
    }

    /// Entry names mapped to relative paths, across all kinds.
    pub fn columns(&self) -> BTreeMap<String, String> {
        self.entries()
            .map(|(_, name, path)| (name.to_string(), path.to_string()))
            .collect()
    }

    /// Restores an entry that was saved before; existence is not checked.
    pub(crate) fn restore(&mut self, kind: FileKind, name: &str, relative: &str) {
        self.map_mut(kind)
            .insert(name.to_string(), relative.to_string());
    }
}

fn tagged(
    kind: FileKind,
    map: &BTreeMap<String, String>,
) -> impl Iterator<Item = (FileKind, &str, &str)> {
    map.iter().map(move |(k, v)| (kind, k.as_str(), v.as_str()))
}

/// One row of an overview or file query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverviewRow {
    pub hcs_experiment: String,
    pub plate: String,
    pub well: String,
    pub organoid_id: Option<String>,
    pub columns: BTreeMap<String, String>,
}

/// One line of `summary.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SummaryRow {
    pub hcs_experiment: String,
    pub root_dir: String,
    pub plate: Option<String>,
    pub well: Option<String>,
    pub organoid_id: Option<String>,
    pub kind: Option<FileKind>,
    pub name: Option<String>,
    pub path: Option<String>,
}
