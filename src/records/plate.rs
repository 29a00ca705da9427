use crate::records::WellRecord;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct PlateRecord {
    plate_id: String,
    root_dir: PathBuf,
    wells: BTreeMap<String, WellRecord>,
}

impl PlateRecord {
    pub(crate) fn new(plate_id: &str, root_dir: &Path) -> Self {
        Self {
            plate_id: plate_id.to_string(),
            root_dir: root_dir.to_path_buf(),
            wells: BTreeMap::new(),
        }
    }

    pub fn plate_id(&self) -> &str {
        &self.plate_id
    }

    /// The well with `well_id`, created when it is not known yet.
    pub fn add_well(&mut self, well_id: &str) -> &mut WellRecord {
        let root_dir = &self.root_dir;
        self.wells
            .entry(well_id.to_string())
            .or_insert_with(|| WellRecord::new(well_id, root_dir))
    }

    pub fn well(&self, well_id: &str) -> Option<&WellRecord> {
        self.wells.get(well_id)
    }

    pub fn well_mut(&mut self, well_id: &str) -> Option<&mut WellRecord> {
        self.wells.get_mut(well_id)
    }

    /// Wells in id order.
    pub fn wells(&self) -> impl Iterator<Item = &WellRecord> {
        self.wells.values()
    }
}
