use crate::records::RecordFiles;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct OrganoidRecord {
    organoid_id: String,
    pub files: RecordFiles,
}

impl OrganoidRecord {
    pub(crate) fn new(organoid_id: &str, root_dir: &Path) -> Self {
        Self {
            organoid_id: organoid_id.to_string(),
            files: RecordFiles::new(root_dir),
        }
    }

    pub fn organoid_id(&self) -> &str {
        &self.organoid_id
    }
}
