#[cfg(feature = "cli")]
pub mod config;
pub mod core;
pub mod domain;
pub mod io;
pub mod records;
pub mod utils;
pub mod zarr;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, toml_config::TomlConfig, CliConfig};

pub use core::{etl::EtlEngine, pipeline::HcsPipeline};
pub use domain::model::{AcquisitionMode, AcquisitionTable, MontageStrategy};
pub use records::Experiment;
pub use utils::error::{HcsError, Result};
pub use zarr::PlateLayout;
