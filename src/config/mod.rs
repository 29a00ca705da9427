pub mod cli;
pub mod toml_config;

use crate::core::ConfigProvider;
use crate::domain::model::{AcquisitionMode, MontageStrategy};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_channel_names, validate_existing_dir, validate_non_empty_string, validate_path,
    validate_positive_number, validate_range, Validate,
};
use crate::zarr::PlateLayout;
use clap::Parser;
use serde::{Deserialize, Serialize};

pub const MAX_CONCURRENT_WELLS: usize = 64;

pub fn parse_layout(value: &str) -> std::result::Result<PlateLayout, String> {
    value.parse().map_err(|e: crate::HcsError| e.to_string())
}

pub fn parse_mode(value: &str) -> std::result::Result<AcquisitionMode, String> {
    value.parse().map_err(|e: crate::HcsError| e.to_string())
}

pub fn parse_montage(value: &str) -> std::result::Result<MontageStrategy, String> {
    value.parse().map_err(|e: crate::HcsError| e.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "hcs-etl")]
#[command(about = "Convert ImageXpress acquisitions into OME-Zarr plates")]
pub struct CliConfig {
    /// Acquisition folder, the one holding `{date}/{acquisition id}`
    #[arg(long)]
    pub acquisition_dir: String,

    /// Directory the plate is written into
    #[arg(long, default_value = "./output")]
    pub output_path: String,

    /// Plate name, defaults to the name in the image file names
    #[arg(long)]
    pub plate_name: Option<String>,

    /// Plate layout: 96 or 384
    #[arg(long, default_value = "96", value_parser = parse_layout)]
    pub layout: PlateLayout,

    #[arg(long, default_value = "order-name")]
    pub order_name: String,

    #[arg(long, default_value = "barcode")]
    pub barcode: String,

    /// projection (CYX) or stack (CZYX)
    #[arg(long, default_value = "projection", value_parser = parse_mode)]
    pub mode: AcquisitionMode,

    /// grid or stage-position
    #[arg(long, default_value = "grid", value_parser = parse_montage)]
    pub montage: MontageStrategy,

    /// Only convert these channels, e.g. `w1,w2`
    #[arg(long, value_delimiter = ',')]
    pub channels: Vec<String>,

    #[arg(long, default_value = "4")]
    pub concurrent_wells: usize,

    /// Do not write chunks that only hold zeros
    #[arg(long)]
    pub skip_empty_chunks: bool,

    /// Write the discovered file table next to the plate
    #[arg(long)]
    pub export_file_table: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Log as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl ConfigProvider for CliConfig {
    fn acquisition_dir(&self) -> &str {
        &self.acquisition_dir
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn plate_name(&self) -> Option<&str> {
        self.plate_name.as_deref()
    }

    fn layout(&self) -> PlateLayout {
        self.layout
    }

    fn order_name(&self) -> &str {
        &self.order_name
    }

    fn barcode(&self) -> &str {
        &self.barcode
    }

    fn acquisition_mode(&self) -> AcquisitionMode {
        self.mode
    }

    fn montage(&self) -> MontageStrategy {
        self.montage
    }

    fn channels(&self) -> &[String] {
        &self.channels
    }

    fn concurrent_wells(&self) -> usize {
        self.concurrent_wells
    }

    fn write_empty_chunks(&self) -> bool {
        !self.skip_empty_chunks
    }

    fn export_file_table(&self) -> bool {
        self.export_file_table
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_existing_dir("acquisition_dir", &self.acquisition_dir)?;
        validate_path("output_path", &self.output_path)?;
        if let Some(name) = &self.plate_name {
            validate_non_empty_string("plate_name", name)?;
        }
        validate_positive_number("concurrent_wells", self.concurrent_wells, 1)?;
        validate_range(
            "concurrent_wells",
            self.concurrent_wells,
            1,
            MAX_CONCURRENT_WELLS,
        )?;
        if !self.channels.is_empty() {
            validate_channel_names("channels", &self.channels)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_defaults() {
        let config = CliConfig::parse_from(["hcs-etl", "--acquisition-dir", "/data/acq"]);
        assert_eq!(config.layout, PlateLayout::I96);
        assert_eq!(config.acquisition_mode(), AcquisitionMode::Projection);
        assert_eq!(config.montage(), MontageStrategy::Grid);
        assert!(config.write_empty_chunks());
        assert!(config.plate_name().is_none());
        assert_eq!(config.concurrent_wells(), 4);
    }

    #[test]
    fn test_cli_options() {
        let config = CliConfig::parse_from([
            "hcs-etl",
            "--acquisition-dir",
            "/data/acq",
            "--layout",
            "384",
            "--mode",
            "stack",
            "--montage",
            "stage-position",
            "--channels",
            "w1,w3",
            "--skip-empty-chunks",
        ]);
        assert_eq!(config.layout(), PlateLayout::I384);
        assert_eq!(config.acquisition_mode(), AcquisitionMode::Stack);
        assert_eq!(config.montage(), MontageStrategy::StagePosition);
        assert_eq!(config.channels(), ["w1", "w3"]);
        assert!(!config.write_empty_chunks());
    }

    #[test]
    fn test_cli_rejects_unknown_layout() {
        let result = CliConfig::try_parse_from([
            "hcs-etl",
            "--acquisition-dir",
            "/data/acq",
            "--layout",
            "24",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_validation() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().to_string_lossy().into_owned();

        let config = CliConfig::parse_from(["hcs-etl", "--acquisition-dir", dir.as_str()]);
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.concurrent_wells = 0;
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.channels = vec!["x1".to_string()];
        assert!(bad.validate().is_err());

        let mut bad = config;
        bad.acquisition_dir = tmp.path().join("missing").to_string_lossy().into_owned();
        assert!(bad.validate().is_err());
    }
}
