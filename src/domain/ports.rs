use crate::domain::model::{AcquisitionMode, AcquisitionTable, MontageStrategy, TransformResult};
use crate::utils::error::Result;
use crate::zarr::PlateLayout;
use async_trait::async_trait;

/// Byte storage addressed by `/`-separated paths relative to a root.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn acquisition_dir(&self) -> &str;
    fn output_path(&self) -> &str;
    fn plate_name(&self) -> Option<&str>;
    fn layout(&self) -> PlateLayout;
    fn order_name(&self) -> &str;
    fn barcode(&self) -> &str;
    fn acquisition_mode(&self) -> AcquisitionMode;
    fn montage(&self) -> MontageStrategy;
    fn channels(&self) -> &[String];
    fn concurrent_wells(&self) -> usize;
    fn write_empty_chunks(&self) -> bool;
    fn export_file_table(&self) -> bool;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<AcquisitionTable>;
    async fn transform(&self, table: AcquisitionTable) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
