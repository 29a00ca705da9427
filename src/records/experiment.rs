use crate::records::{
    FileKind, OrganoidRecord, OverviewRow, PlateRecord, RecordFiles, SummaryRow, WellRecord,
};
use crate::utils::error::{HcsError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const SUMMARY_FILE: &str = "summary.csv";

#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    name: String,
    root_dir: PathBuf,
    save_dir: PathBuf,
    plates: BTreeMap<String, PlateRecord>,
}

fn require_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(HcsError::ValidationError {
            message: format!("{} does not exist.", path.display()),
        })
    }
}

impl Experiment {
    pub fn new(name: &str, root_dir: impl AsRef<Path>, save_dir: impl AsRef<Path>) -> Result<Self> {
        require_dir(root_dir.as_ref())?;
        require_dir(save_dir.as_ref())?;
        Ok(Self {
            name: name.to_string(),
            root_dir: root_dir.as_ref().to_path_buf(),
            save_dir: save_dir.as_ref().to_path_buf(),
            plates: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// `{save_dir}/{name}`
    pub fn experiment_dir(&self) -> PathBuf {
        self.save_dir.join(&self.name)
    }

    /// The plate with `plate_id`, created when it is not known yet.
    pub fn add_plate(&mut self, plate_id: &str) -> &mut PlateRecord {
        let root_dir = &self.root_dir;
        self.plates
            .entry(plate_id.to_string())
            .or_insert_with(|| PlateRecord::new(plate_id, root_dir))
    }

    pub fn plate(&self, plate_id: &str) -> Option<&PlateRecord> {
        self.plates.get(plate_id)
    }

    pub fn plate_mut(&mut self, plate_id: &str) -> Option<&mut PlateRecord> {
        self.plates.get_mut(plate_id)
    }

    pub fn plates(&self) -> impl Iterator<Item = &PlateRecord> {
        self.plates.values()
    }

    /// All wells with their plate.
    pub fn wells(&self) -> impl Iterator<Item = (&PlateRecord, &WellRecord)> {
        self.plates()
            .flat_map(|plate| plate.wells().map(move |well| (plate, well)))
    }

    /// All organoids with their plate and well.
    pub fn organoids(
        &self,
    ) -> impl Iterator<Item = (&PlateRecord, &WellRecord, &OrganoidRecord)> {
        self.wells().flat_map(|(plate, well)| {
            well.organoids()
                .map(move |organoid| (plate, well, organoid))
        })
    }

    fn row(
        &self,
        plate: &PlateRecord,
        well: &WellRecord,
        organoid: Option<&OrganoidRecord>,
        columns: BTreeMap<String, String>,
    ) -> OverviewRow {
        OverviewRow {
            hcs_experiment: self.name.clone(),
            plate: plate.plate_id().to_string(),
            well: well.well_id().to_string(),
            organoid_id: organoid.map(|o| o.organoid_id().to_string()),
            columns,
        }
    }

    /// One row per organoid with all its files; wells without organoids get
    /// a row with their own files.
    pub fn build_overview(&self) -> Vec<OverviewRow> {
        let mut rows = Vec::new();
        for (plate, well) in self.wells() {
            if well.organoid_count() == 0 {
                rows.push(self.row(plate, well, None, well.files.columns()));
            }
            for organoid in well.organoids() {
                rows.push(self.row(plate, well, Some(organoid), organoid.files.columns()));
            }
        }
        rows
    }

    /// One row per organoid; `columns` holds the selected files that exist.
    fn organoid_files(&self, selection: &[(FileKind, &str)]) -> Vec<OverviewRow> {
        self.organoids()
            .map(|(plate, well, organoid)| {
                let columns = selection
                    .iter()
                    .filter_map(|(kind, name)| {
                        let map = match kind {
                            FileKind::Raw => &organoid.files.raw_files,
                            FileKind::Segmentation => &organoid.files.segmentations,
                            FileKind::Measurement => &organoid.files.measurements,
                        };
                        map.get(*name).map(|path| (name.to_string(), path.clone()))
                    })
                    .collect();
                self.row(plate, well, Some(organoid), columns)
            })
            .collect()
    }

    pub fn organoid_raw_files(&self, name: &str) -> Vec<OverviewRow> {
        self.organoid_files(&[(FileKind::Raw, name)])
    }

    pub fn organoid_segmentation_files(&self, name: &str) -> Vec<OverviewRow> {
        self.organoid_files(&[(FileKind::Segmentation, name)])
    }

    pub fn organoid_raw_segmentation_files(
        &self,
        raw_name: &str,
        segmentation_name: &str,
    ) -> Vec<OverviewRow> {
        self.organoid_files(&[
            (FileKind::Raw, raw_name),
            (FileKind::Segmentation, segmentation_name),
        ])
    }

    fn summary_row(
        &self,
        plate: Option<&str>,
        well: Option<&str>,
        organoid_id: Option<&str>,
        entry: Option<(FileKind, &str, &str)>,
    ) -> SummaryRow {
        SummaryRow {
            hcs_experiment: self.name.clone(),
            root_dir: self.root_dir.to_string_lossy().into_owned(),
            plate: plate.map(str::to_string),
            well: well.map(str::to_string),
            organoid_id: organoid_id.map(str::to_string),
            kind: entry.map(|(kind, _, _)| kind),
            name: entry.map(|(_, name, _)| name.to_string()),
            path: entry.map(|(_, _, path)| path.to_string()),
        }
    }

    fn summary_rows(&self) -> Vec<SummaryRow> {
        // First row carries the experiment even when it has no plates.
        let mut rows = vec![self.summary_row(None, None, None, None)];
        for plate in self.plates() {
            let plate_id = Some(plate.plate_id());
            rows.push(self.summary_row(plate_id, None, None, None));
            for well in plate.wells() {
                let well_id = Some(well.well_id());
                rows.push(self.summary_row(plate_id, well_id, None, None));
                for entry in well.files.entries() {
                    rows.push(self.summary_row(plate_id, well_id, None, Some(entry)));
                }
                for organoid in well.organoids() {
                    let organoid_id = Some(organoid.organoid_id());
                    rows.push(self.summary_row(plate_id, well_id, organoid_id, None));
                    for entry in organoid.files.entries() {
                        rows.push(self.summary_row(plate_id, well_id, organoid_id, Some(entry)));
                    }
                }
            }
        }
        rows
    }

    /// Writes `{save_dir}/{name}/summary.csv` and returns its path.
    pub fn save(&self) -> Result<PathBuf> {
        let dir = self.experiment_dir();
        fs::create_dir_all(&dir)?;
        let path = dir.join(SUMMARY_FILE);

        let mut writer = csv::Writer::from_path(&path)?;
        for row in self.summary_rows() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        tracing::debug!("Saved experiment {} to {}", self.name, path.display());
        Ok(path)
    }

    /// Rebuilds an experiment from a `summary.csv` written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader
            .deserialize::<SummaryRow>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let first = rows.first().ok_or_else(|| HcsError::ValidationError {
            message: format!("{} holds no experiment", path.display()),
        })?;

        let save_dir = path
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let mut experiment = Self {
            name: first.hcs_experiment.clone(),
            root_dir: PathBuf::from(&first.root_dir),
            save_dir,
            plates: BTreeMap::new(),
        };

        for row in &rows {
            let Some(plate_id) = &row.plate else {
                continue;
            };
            let plate = experiment.add_plate(plate_id);
            let Some(well_id) = &row.well else {
                continue;
            };
            let well = plate.add_well(well_id);
            let files: &mut RecordFiles = match &row.organoid_id {
                Some(organoid_id) => &mut well.add_organoid(organoid_id).files,
                None => &mut well.files,
            };
            if let (Some(kind), Some(name), Some(relative)) = (row.kind, &row.name, &row.path) {
                files.restore(kind, name, relative);
            }
        }
        Ok(experiment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        root: PathBuf,
        exp: Experiment,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root_dir");
        let save = tmp.path().join("exp_dir");
        fs::create_dir_all(root.join("raw")).unwrap();
        fs::create_dir_all(root.join("seg")).unwrap();
        fs::create_dir_all(&save).unwrap();
        for f in ["raw/o1.tif", "raw/o2.tif", "seg/o1.tif", "raw/well.tif"] {
            fs::write(root.join(f), b"").unwrap();
        }
        let exp = Experiment::new("Experiment", &root, &save).unwrap();
        Fixture {
            _tmp: tmp,
            root,
            exp,
        }
    }

    #[test]
    fn test_create() {
        let mut f = fixture();
        let plate = f.exp.add_plate("plate");
        let well = plate.add_well("well");
        assert_eq!(well.well_id(), "well");

        assert_eq!(f.exp.plate("plate").unwrap().plate_id(), "plate");
        assert!(f.exp.plate("plate").unwrap().well("well").is_some());
        assert_eq!(f.exp.experiment_dir(), f._tmp.path().join("exp_dir").join("Experiment"));
    }

    #[test]
    fn test_missing_root_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(Experiment::new("E", tmp.path().join("nope"), tmp.path()).is_err());
    }

    #[test]
    fn test_files_are_stored_relative_and_must_exist() {
        let mut f = fixture();
        let absolute = f.root.join("raw/o1.tif").to_string_lossy().into_owned();
        let organoid = f.exp.add_plate("p").add_well("A01").add_organoid("o1");

        organoid.files.add_raw_file("img", &absolute).unwrap();
        organoid.files.add_segmentation("mask", "seg/o1.tif").unwrap();
        assert_eq!(organoid.files.raw_files["img"], "raw/o1.tif");
        assert_eq!(
            organoid.files.source_location("seg/o1.tif"),
            f.root.join("seg/o1.tif")
        );

        assert!(organoid.files.add_raw_file("img", "raw/missing.tif").is_err());
        assert!(organoid.files.add_raw_file("img", "/elsewhere/o1.tif").is_err());
    }

    fn populated() -> Fixture {
        let mut f = fixture();
        let well = f.exp.add_plate("p1").add_well("A01");
        well.files.add_raw_file("overview", "raw/well.tif").unwrap();
        let o1 = well.add_organoid("o1");
        o1.files.add_raw_file("img", "raw/o1.tif").unwrap();
        o1.files.add_segmentation("mask", "seg/o1.tif").unwrap();
        well.add_organoid("o2")
            .files
            .add_raw_file("img", "raw/o2.tif")
            .unwrap();
        f.exp.add_plate("p1").add_well("B02");
        f.exp.add_plate("p2");
        f
    }

    #[test]
    fn test_queries() {
        let f = populated();

        let overview = f.exp.build_overview();
        assert_eq!(overview.len(), 3);
        assert_eq!(overview[0].organoid_id.as_deref(), Some("o1"));
        assert_eq!(overview[0].columns.len(), 2);
        assert_eq!(overview[2].well, "B02");
        assert!(overview[2].organoid_id.is_none());

        let raw = f.exp.organoid_raw_files("img");
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[1].columns["img"], "raw/o2.tif");

        let joined = f.exp.organoid_raw_segmentation_files("img", "mask");
        assert_eq!(joined[0].columns.len(), 2);
        assert_eq!(joined[1].columns.len(), 1);
        assert!(f.exp.organoid_segmentation_files("mask")[1].columns.is_empty());
    }

    #[test]
    fn test_iteration() {
        let f = populated();
        assert_eq!(f.exp.plates().count(), 2);
        assert_eq!(f.exp.wells().count(), 2);
        let ids: Vec<_> = f
            .exp
            .organoids()
            .map(|(p, w, o)| format!("{}/{}/{}", p.plate_id(), w.well_id(), o.organoid_id()))
            .collect();
        assert_eq!(ids, vec!["p1/A01/o1", "p1/A01/o2"]);
    }

    #[test]
    fn test_save_and_load() {
        let f = populated();
        let path = f.exp.save().unwrap();
        assert!(path.ends_with("Experiment/summary.csv"));

        let loaded = Experiment::load(&path).unwrap();
        assert_eq!(loaded, f.exp);
    }

    #[test]
    fn test_save_and_load_without_plates() {
        let f = fixture();
        let path = f.exp.save().unwrap();

        let loaded = Experiment::load(&path).unwrap();
        assert_eq!(loaded, f.exp);
        assert_eq!(loaded.plates().count(), 0);
        assert_eq!(loaded.root_dir(), f.root.as_path());
    }

    #[test]
    fn test_load_of_header_only_summary_fails() {
        let f = fixture();
        let dir = f.exp.experiment_dir();
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(SUMMARY_FILE);
        fs::write(
            &path,
            "hcs_experiment,root_dir,plate,well,organoid_id,kind,name,path\n",
        )
        .unwrap();
        assert!(Experiment::load(&path).is_err());
    }
}
