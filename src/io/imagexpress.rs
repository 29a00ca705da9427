//! File discovery for Molecular Devices ImageXpress acquisitions.
//!
//! Storage layout on disk for 2 wells with 2 fields and 2 channels:
//!
//! ```text
//! MIP-2P-2sub                                   {name}, optional
//! └── 2022-07-05                                {date}
//!     └── 1075                                  {acquisition id}
//!         ├── MIP-2P-2sub_C05_s1_w146C9B2CD-0BB3-4B8A-9187-2805F4C90506.tif
//!         ├── MIP-2P-2sub_C05_s1_w1_thumb6EFE77C6-B96D-412A-9FD1-710DBDA32821.tif
//!         ├── MIP-2P-2sub_C05_s1_w2B90625C8-6EA7-4E54-8289-C539EB75263E.tif
//!         ├── ...
//!         └── ZStep_1                           {z}, stacks only
//!             └── MIP-2P-2sub_C05_s1_w1A1B2....tif
//! ```
//!
//! Image data is stored in `{name}_{well}_{field}_{channel}{md_id}.tif`. The
//! `*_thumb*.tif` previews are ignored.

use crate::domain::model::{AcquisitionTable, ImageFile, ParseMode};
use crate::utils::error::Result;
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};

const FILENAME_PATTERN: &str = r"^(?P<name>.*)_(?P<well>[A-Z]+\d{2})_(?P<field>s\d+)_(?P<channel>w[1-9])(?P<md_id>.*)(?P<ext>\.tif)$";
const ALL_FOLDERS_PATTERN: &str =
    r"^.*[/\\](?P<date>\d{4}-\d{2}-\d{2})[/\\](?P<acq_id>\d+)(?:[/\\]ZStep_(?P<z>\d+))?.*$";
const TOP_LEVEL_FOLDER_PATTERN: &str = r"^.*[/\\](?P<date>\d{4}-\d{2}-\d{2})[/\\](?P<acq_id>\d+)$";
const ZSTEP_FOLDER_PATTERN: &str =
    r"^.*[/\\](?P<date>\d{4}-\d{2}-\d{2})[/\\](?P<acq_id>\d+)[/\\]ZStep_(?P<z>\d+).*$";

const THUMBNAIL_MARKER: &str = "_thumb";

/// Top-level files of an acquisition: single planes or projections.
pub fn parse_single_plane_multi_fields(acquisition_dir: impl AsRef<Path>) -> Result<AcquisitionTable> {
    parse_files(acquisition_dir, ParseMode::TopLevel)
}

/// Files of the `ZStep_*` folders of an acquisition.
pub fn parse_multi_field_stacks(acquisition_dir: impl AsRef<Path>) -> Result<AcquisitionTable> {
    parse_files(acquisition_dir, ParseMode::ZSteps)
}

pub fn parse_files(acquisition_dir: impl AsRef<Path>, mode: ParseMode) -> Result<AcquisitionTable> {
    let folder_pattern = match mode {
        ParseMode::TopLevel => TOP_LEVEL_FOLDER_PATTERN,
        ParseMode::ZSteps => ZSTEP_FOLDER_PATTERN,
        ParseMode::All => ALL_FOLDERS_PATTERN,
    };
    let folder_re = Regex::new(folder_pattern)?;
    let filename_re = Regex::new(FILENAME_PATTERN)?;

    let mut files = Vec::new();
    for dir in walk_dirs(acquisition_dir.as_ref())? {
        let dir_str = dir.to_string_lossy();
        let Some(folder) = folder_re.captures(&dir_str) else {
            continue;
        };
        if chrono::NaiveDate::parse_from_str(&folder["date"], "%Y-%m-%d").is_err() {
            tracing::warn!("Skipping {}: '{}' is not a date", dir_str, &folder["date"]);
            continue;
        }

        for filename in sorted_file_names(&dir)? {
            let Some(file) = filename_re.captures(&filename) else {
                continue;
            };
            if file["md_id"].starts_with(THUMBNAIL_MARKER) {
                continue;
            }
            files.push(to_image_file(&folder, &file, dir.join(&filename)));
        }
    }

    tracing::debug!(
        "Found {} image files in {}",
        files.len(),
        acquisition_dir.as_ref().display()
    );
    Ok(AcquisitionTable::new(files))
}

fn to_image_file(folder: &Captures, file: &Captures, path: PathBuf) -> ImageFile {
    ImageFile {
        name: file["name"].to_string(),
        date: folder["date"].to_string(),
        acq_id: folder["acq_id"].to_string(),
        z: folder.name("z").map(|m| m.as_str().to_string()),
        well: file["well"].to_string(),
        field: file["field"].to_string(),
        channel: file["channel"].to_string(),
        md_id: file["md_id"].to_string(),
        ext: file["ext"].to_string(),
        path: path.to_string_lossy().into_owned(),
    }
}

/// `root` and all directories below it, depth first, in name order.
fn walk_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut children = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                children.push(entry.path());
            }
        }
        children.sort();
        pending.extend(children.into_iter().rev());
        dirs.push(dir);
    }
    Ok(dirs)
}

fn sorted_file_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
