use crate::records::{OrganoidRecord, RecordFiles};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct WellRecord {
    well_id: String,
    root_dir: PathBuf,
    pub files: RecordFiles,
    organoids: BTreeMap<String, OrganoidRecord>,
}

impl WellRecord {
    pub(crate) fn new(well_id: &str, root_dir: &Path) -> Self {
        Self {
            well_id: well_id.to_string(),
            root_dir: root_dir.to_path_buf(),
            files: RecordFiles::new(root_dir),
            organoids: BTreeMap::new(),
        }
    }

    pub fn well_id(&self) -> &str {
        &self.well_id
    }

    /// The organoid with `organoid_id`, created when it is not known yet.
    pub fn add_organoid(&mut self, organoid_id: &str) -> &mut OrganoidRecord {
        let root_dir = &self.root_dir;
        self.organoids
            .entry(organoid_id.to_string())
            .or_insert_with(|| OrganoidRecord::new(organoid_id, root_dir))
    }

    pub fn organoid(&self, organoid_id: &str) -> Option<&OrganoidRecord> {
        self.organoids.get(organoid_id)
    }

    pub fn organoid_mut(&mut self, organoid_id: &str) -> Option<&mut OrganoidRecord> {
        self.organoids.get_mut(organoid_id)
    }

    /// Organoids in id order.
    pub fn organoids(&self) -> impl Iterator<Item = &OrganoidRecord> {
        self.organoids.values()
    }

    pub fn organoid_count(&self) -> usize {
        self.organoids.len()
    }
}
