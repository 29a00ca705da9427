use crate::core::well::{assemble_well_cyx, assemble_well_czyx};
use crate::core::{ConfigProvider, Pipeline, Storage, TransformResult};
use crate::domain::model::{AcquisitionMode, AcquisitionTable, WellImage};
use crate::io::imagexpress::parse_files;
use crate::utils::error::{HcsError, Result};
use crate::zarr::plate::well_image_group;
use crate::zarr::{
    build_zarr_scaffold, check_plate, write_cyx_image_to_well, write_czyx_image_to_well,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Converts one ImageXpress acquisition into an OME-Zarr plate.
pub struct HcsPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> HcsPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &C {
        &self.config
    }
}

/// Runs `work` on the blocking pool for every item, at most `limit` at a
/// time, and passes each output to `sink` as soon as it is ready. A worker
/// slot is released only after `sink` returns, so no more than `limit`
/// outputs are alive at once. Returns the number of outputs sunk.
async fn run_bounded<I, T, W, K, F>(items: Vec<I>, limit: usize, work: W, mut sink: K) -> Result<usize>
where
    I: Send + 'static,
    T: Send + 'static,
    W: Fn(I) -> Result<T> + Send + Sync + 'static,
    K: FnMut(T) -> F,
    F: Future<Output = Result<()>>,
{
    let permits = Arc::new(Semaphore::new(limit.max(1)));
    let work = Arc::new(work);

    let mut tasks = JoinSet::new();
    for item in items {
        let permits = Arc::clone(&permits);
        let work = Arc::clone(&work);
        tasks.spawn(async move {
            let permit = permits
                .acquire_owned()
                .await
                .map_err(|e| HcsError::processing(format!("worker pool closed: {}", e)))?;
            let output = tokio::task::spawn_blocking(move || work(item)).await??;
            Ok::<_, HcsError>((output, permit))
        });
    }

    let mut done = 0;
    while let Some(joined) = tasks.join_next().await {
        let (output, _permit) = joined??;
        sink(output).await?;
        done += 1;
    }
    Ok(done)
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for HcsPipeline<S, C> {
    async fn extract(&self) -> Result<AcquisitionTable> {
        let dir = self.config.acquisition_dir().to_string();
        let mode = self.config.acquisition_mode().parse_mode();
        tracing::debug!("Scanning {} ({:?})", dir, mode);

        let table = tokio::task::spawn_blocking(move || parse_files(dir, mode)).await??;

        let channels = self.config.channels();
        let table = if channels.is_empty() {
            table
        } else {
            table.filter(|f| channels.contains(&f.channel))
        };

        if table.is_empty() {
            return Err(HcsError::processing(format!(
                "no image files found in {}",
                self.config.acquisition_dir()
            )));
        }

        // Fail before any well is decoded.
        let (plate, _) = check_plate(
            &self.storage,
            &table,
            self.config.plate_name(),
            self.config.layout(),
        )
        .await?;
        tracing::debug!(
            "Plate {}: wells {:?}, channels {:?}",
            plate,
            table.wells(),
            table.channels()
        );
        Ok(table)
    }

    async fn transform(&self, table: AcquisitionTable) -> Result<TransformResult> {
        let mode = self.config.acquisition_mode();
        let strategy = self.config.montage();
        let layout = self.config.layout();
        let write_empty_chunks = self.config.write_empty_chunks();

        let plate = build_zarr_scaffold(
            &self.storage,
            &table,
            self.config.plate_name(),
            layout,
            self.config.order_name(),
            self.config.barcode(),
        )
        .await?;

        let jobs: Vec<(String, AcquisitionTable)> = table
            .wells()
            .into_iter()
            .map(|well| {
                let files = table.for_well(&well);
                (well, files)
            })
            .collect();

        let storage = &self.storage;
        let plate_group = plate.as_str();
        let mut written = Vec::with_capacity(jobs.len());

        run_bounded(
            jobs,
            self.config.concurrent_wells(),
            move |(well, files): (String, AcquisitionTable)| -> Result<(String, WellImage)> {
                let image = match mode {
                    AcquisitionMode::Projection => assemble_well_cyx(&files, strategy, false),
                    AcquisitionMode::Stack => assemble_well_czyx(&files, strategy),
                }?;
                tracing::debug!("Assembled well {} {:?}", well, image.image.shape());
                Ok((well, image))
            },
            |(well, image): (String, WellImage)| {
                written.push(well.clone());
                async move {
                    let position = layout.well_position(&well)?;
                    let group = well_image_group(plate_group, &position);
                    match mode {
                        AcquisitionMode::Projection => {
                            write_cyx_image_to_well(storage, &group, &image, write_empty_chunks)
                                .await?
                        }
                        AcquisitionMode::Stack => {
                            write_czyx_image_to_well(storage, &group, &image, write_empty_chunks)
                                .await?
                        }
                    }
                    tracing::debug!("Wrote well {} to {}", well, group);
                    Ok::<_, HcsError>(())
                }
            },
        )
        .await?;

        Ok(TransformResult {
            table,
            plate,
            wells: written,
            mode,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        if self.config.export_file_table() {
            let name = result.plate.trim_end_matches(".zarr");
            let csv_path = format!("{}_files.csv", name);
            self.storage
                .write_file(&csv_path, &result.table.to_csv()?)
                .await?;
            tracing::debug!("Exported file table to {}", csv_path);
        }

        Ok(format!(
            "{}/{}",
            self.config.output_path().trim_end_matches('/'),
            result.plate
        ))
    }
}
