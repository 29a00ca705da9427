use crate::core::ConfigProvider;
use crate::domain::model::{AcquisitionMode, MontageStrategy};
use crate::utils::error::{HcsError, Result};
use crate::utils::validation::{
    validate_channel_names, validate_existing_dir, validate_non_empty_string, validate_path,
    validate_positive_number, validate_range, Validate,
};
use crate::zarr::PlateLayout;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::MAX_CONCURRENT_WELLS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub plate: PlateConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateConfig {
    pub name: Option<String>,
    #[serde(default)]
    pub layout: PlateLayout,
    #[serde(default = "default_order_name")]
    pub order_name: String,
    #[serde(default = "default_barcode")]
    pub barcode: String,
}

impl Default for PlateConfig {
    fn default() -> Self {
        Self {
            name: None,
            layout: PlateLayout::default(),
            order_name: default_order_name(),
            barcode: default_barcode(),
        }
    }
}

fn default_order_name() -> String {
    "order-name".to_string()
}

fn default_barcode() -> String {
    "barcode".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub acquisition_dir: String,
    #[serde(default)]
    pub mode: AcquisitionMode,
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub montage: MontageStrategy,
    pub concurrent_wells: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub write_empty_chunks: Option<bool>,
    pub export_file_table: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub json_logs: Option<bool>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(HcsError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}")?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_existing_dir("source.acquisition_dir", &self.source.acquisition_dir)?;
        validate_path("load.output_path", &self.load.output_path)?;

        if let Some(name) = &self.plate.name {
            validate_non_empty_string("plate.name", name)?;
        }
        if let Some(concurrent) = self.transform.concurrent_wells {
            validate_positive_number("transform.concurrent_wells", concurrent, 1)?;
            validate_range(
                "transform.concurrent_wells",
                concurrent,
                1,
                MAX_CONCURRENT_WELLS,
            )?;
        }
        if !self.source.channels.is_empty() {
            validate_channel_names("source.channels", &self.source.channels)?;
        }
        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn acquisition_dir(&self) -> &str {
        &self.source.acquisition_dir
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn plate_name(&self) -> Option<&str> {
        self.plate.name.as_deref()
    }

    fn layout(&self) -> PlateLayout {
        self.plate.layout
    }

    fn order_name(&self) -> &str {
        &self.plate.order_name
    }

    fn barcode(&self) -> &str {
        &self.plate.barcode
    }

    fn acquisition_mode(&self) -> AcquisitionMode {
        self.source.mode
    }

    fn montage(&self) -> MontageStrategy {
        self.transform.montage
    }

    fn channels(&self) -> &[String] {
        &self.source.channels
    }

    fn concurrent_wells(&self) -> usize {
        self.transform.concurrent_wells.unwrap_or(4)
    }

    fn write_empty_chunks(&self) -> bool {
        self.load.write_empty_chunks.unwrap_or(true)
    }

    fn export_file_table(&self) -> bool {
        self.load.export_file_table.unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
