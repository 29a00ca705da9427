use crate::core::histogram::UIntHistogram;
use crate::domain::image::ImageStack;
use crate::utils::error::{HcsError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// One image file of an ImageXpress acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFile {
    pub name: String,
    pub date: String,
    pub acq_id: String,
    pub z: Option<String>,
    pub well: String,
    pub field: String,
    pub channel: String,
    pub md_id: String,
    pub ext: String,
    pub path: String,
}

impl ImageFile {
    pub fn acquisition_date(&self) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").map_err(|e| {
            HcsError::InvalidMetadataError {
                key: "date".to_string(),
                value: self.date.clone(),
                reason: e.to_string(),
            }
        })
    }
}

/// All files found in an acquisition, in discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcquisitionTable {
    files: Vec<ImageFile>,
}

impl AcquisitionTable {
    pub fn new(files: Vec<ImageFile>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[ImageFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageFile> {
        self.files.iter()
    }

    fn unique_in_order<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
        let mut seen = BTreeSet::new();
        values
            .filter(|v| seen.insert(*v))
            .map(str::to_string)
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        Self::unique_in_order(self.files.iter().map(|f| f.name.as_str()))
    }

    /// Wells in first-seen order.
    pub fn wells(&self) -> Vec<String> {
        Self::unique_in_order(self.files.iter().map(|f| f.well.as_str()))
    }

    pub fn fields(&self) -> Vec<String> {
        Self::unique_in_order(self.files.iter().map(|f| f.field.as_str()))
    }

    /// Channels, sorted.
    pub fn channels(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.files.iter().map(|f| f.channel.as_str()).collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Distinct z-steps in numeric order.
    pub fn z_steps(&self) -> Vec<String> {
        let mut steps = Self::unique_in_order(self.files.iter().filter_map(|f| f.z.as_deref()));
        steps.sort_by_key(|z| z.parse::<u64>().unwrap_or(u64::MAX));
        steps
    }

    pub fn filter<F>(&self, predicate: F) -> AcquisitionTable
    where
        F: Fn(&ImageFile) -> bool,
    {
        AcquisitionTable::new(self.files.iter().filter(|f| predicate(f)).cloned().collect())
    }

    pub fn for_well(&self, well: &str) -> AcquisitionTable {
        self.filter(|f| f.well == well)
    }

    pub fn for_channel(&self, channel: &str) -> AcquisitionTable {
        self.filter(|f| f.channel == channel)
    }

    pub fn for_z(&self, z: &str) -> AcquisitionTable {
        self.filter(|f| f.z.as_deref() == Some(z))
    }

    pub fn projections(&self) -> AcquisitionTable {
        self.filter(|f| f.z.is_none())
    }

    pub fn stacks(&self) -> AcquisitionTable {
        self.filter(|f| f.z.is_some())
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for file in &self.files {
            writer.serialize(file)?;
        }
        writer
            .into_inner()
            .map_err(|e| HcsError::processing(format!("CSV buffer flush failed: {}", e)))
    }
}

/// Which folders of an acquisition are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseMode {
    /// Files directly in the acquisition folder (projections or single planes).
    TopLevel,
    /// Files in `ZStep_*` sub folders.
    ZSteps,
    #[default]
    All,
}

impl FromStr for ParseMode {
    type Err = HcsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "top-level" => Ok(ParseMode::TopLevel),
            "z-steps" => Ok(ParseMode::ZSteps),
            "all" => Ok(ParseMode::All),
            other => Err(HcsError::InvalidConfigValueError {
                field: "mode".to_string(),
                value: other.to_string(),
                reason: "Expected one of top-level, z-steps, all".to_string(),
            }),
        }
    }
}

/// What the conversion writes per well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AcquisitionMode {
    /// One CYX image per well from the top-level files.
    #[default]
    Projection,
    /// One CZYX image per well from the `ZStep_*` folders.
    Stack,
}

impl AcquisitionMode {
    pub fn parse_mode(&self) -> ParseMode {
        match self {
            AcquisitionMode::Projection => ParseMode::TopLevel,
            AcquisitionMode::Stack => ParseMode::ZSteps,
        }
    }
}

impl FromStr for AcquisitionMode {
    type Err = HcsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "projection" => Ok(AcquisitionMode::Projection),
            "stack" => Ok(AcquisitionMode::Stack),
            other => Err(HcsError::InvalidConfigValueError {
                field: "acquisition_mode".to_string(),
                value: other.to_string(),
                reason: "Expected projection or stack".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MontageStrategy {
    /// Fields snapped into a regular grid of field-sized cells.
    #[default]
    Grid,
    /// Fields placed at their exact stage positions.
    StagePosition,
}

impl FromStr for MontageStrategy {
    type Err = HcsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "grid" => Ok(MontageStrategy::Grid),
            "stage-position" => Ok(MontageStrategy::StagePosition),
            other => Err(HcsError::InvalidConfigValueError {
                field: "montage".to_string(),
                value: other.to_string(),
                reason: "Expected grid or stage-position".to_string(),
            }),
        }
    }
}

/// PlaneInfo values of a MetaSeries TIFF that the conversion relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MetaSeriesMetadata {
    pub illumination_setting: String,
    pub spatial_calibration_x: f64,
    pub spatial_calibration_y: f64,
    pub spatial_calibration_units: String,
    pub stage_position_x: f64,
    pub stage_position_y: f64,
    pub z_position: Option<f64>,
    pub pixel_type: String,
    pub objective_na: f64,
    pub objective: String,
    pub exposure_time: String,
    pub lumencor_cyan_intensity: f64,
    pub lumencor_green_intensity: f64,
    pub lumencor_red_intensity: f64,
    pub lumencor_violet_intensity: f64,
    pub lumencor_yellow_intensity: f64,
    pub shading_correction: String,
    pub stage_label: String,
    pub site_x: i64,
    pub site_y: i64,
    pub wavelength: f64,
    pub z_projection_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetadata {
    pub wavelength: Option<String>,
    pub power: Option<f64>,
    #[serde(rename = "exposure-time")]
    pub exposure_time: f64,
    #[serde(rename = "exposure-time-unit")]
    pub exposure_time_unit: String,
    #[serde(rename = "shading-correction")]
    pub shading_correction: bool,
    #[serde(rename = "channel-name")]
    pub channel_name: String,
    #[serde(rename = "objective-NA")]
    pub objective_na: f64,
    pub objective: String,
    #[serde(rename = "display-color")]
    pub display_color: String,
    #[serde(
        rename = "z-projection-method",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub z_projection_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralMetadata {
    #[serde(rename = "spatial-calibration-x")]
    pub spatial_calibration_x: f64,
    #[serde(rename = "spatial-calibration-y")]
    pub spatial_calibration_y: f64,
    #[serde(rename = "spatial-calibration-units")]
    pub spatial_calibration_units: String,
    #[serde(rename = "pixel-type")]
    pub pixel_type: String,
    #[serde(rename = "z-position", default, skip_serializing_if = "Option::is_none")]
    pub z_position: Option<f64>,
    #[serde(rename = "z-scaling", default, skip_serializing_if = "Option::is_none")]
    pub z_scaling: Option<f64>,
}

/// Assembled image data of one well.
#[derive(Debug, Clone)]
pub struct WellImage {
    /// CYX or CZYX.
    pub image: ImageStack<u16>,
    pub histograms: Vec<UIntHistogram>,
    pub channels: Vec<ChannelMetadata>,
    pub general: GeneralMetadata,
}

/// Outcome of the transform phase. Well images are already in the plate.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub table: AcquisitionTable,
    /// Plate group, `{name}.zarr`.
    pub plate: String,
    /// Wells written to the plate, in completion order.
    pub wells: Vec<String>,
    pub mode: AcquisitionMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(well: &str, channel: &str, z: Option<&str>) -> ImageFile {
        ImageFile {
            name: "Plate".to_string(),
            date: "2023-02-21".to_string(),
            acq_id: "1334".to_string(),
            z: z.map(str::to_string),
            well: well.to_string(),
            field: "s1".to_string(),
            channel: channel.to_string(),
            md_id: "ABC".to_string(),
            ext: ".tif".to_string(),
            path: format!("/data/Plate_{}_s1_{}ABC.tif", well, channel),
        }
    }

    #[test]
    fn test_table_queries() {
        let table = AcquisitionTable::new(vec![
            file("E08", "w2", None),
            file("E07", "w1", Some("10")),
            file("E07", "w1", Some("2")),
            file("E08", "w1", None),
        ]);

        assert_eq!(table.names(), vec!["Plate"]);
        assert_eq!(table.wells(), vec!["E08", "E07"]);
        assert_eq!(table.channels(), vec!["w1", "w2"]);
        assert_eq!(table.z_steps(), vec!["2", "10"]);
        assert_eq!(table.projections().len(), 2);
        assert_eq!(table.stacks().for_z("2").len(), 1);
        assert_eq!(table.for_well("E07").for_channel("w1").len(), 2);
    }

    #[test]
    fn test_acquisition_date() {
        let f = file("E07", "w1", None);
        assert_eq!(
            f.acquisition_date().unwrap(),
            NaiveDate::from_ymd_opt(2023, 2, 21).unwrap()
        );
    }

    #[test]
    fn test_table_to_csv() {
        let table = AcquisitionTable::new(vec![file("E07", "w1", None)]);
        let csv = String::from_utf8(table.to_csv().unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "name,date,acq_id,z,well,field,channel,md_id,ext,path"
        );
        assert!(lines.next().unwrap().starts_with("Plate,2023-02-21,1334,,E07,s1,w1"));
    }

    #[test]
    fn test_channel_metadata_keys() {
        let meta = ChannelMetadata {
            wavelength: Some("violet".to_string()),
            power: Some(100.0),
            exposure_time: 20.0,
            exposure_time_unit: "ms".to_string(),
            shading_correction: false,
            channel_name: "DAPI".to_string(),
            objective_na: 0.75,
            objective: "20X Plan Apo Lambda".to_string(),
            display_color: "0034FF".to_string(),
            z_projection_method: None,
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["channel-name"], "DAPI");
        assert_eq!(value["objective-NA"], 0.75);
        assert!(value.get("z-projection-method").is_none());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("z-steps".parse::<ParseMode>().unwrap(), ParseMode::ZSteps);
        assert_eq!(
            "stage-position".parse::<MontageStrategy>().unwrap(),
            MontageStrategy::StagePosition
        );
        assert_eq!(AcquisitionMode::Stack.parse_mode(), ParseMode::ZSteps);
        assert!("both".parse::<AcquisitionMode>().is_err());
    }
}
