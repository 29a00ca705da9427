use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Runs extract, transform and load. Returns where the plate was written.
    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting conversion");
        self.monitor.log_phase("Start");

        tracing::info!("🔎 Scanning acquisition...");
        let table = self.pipeline.extract().await?;
        tracing::info!(
            "📄 Found {} image files in {} wells",
            table.len(),
            table.wells().len()
        );
        self.monitor.log_phase("Extract");

        tracing::info!("🧩 Assembling and writing wells...");
        let result = self.pipeline.transform(table).await?;
        tracing::info!(
            "🧩 Assembled {} wells into {}",
            result.wells.len(),
            result.plate
        );
        self.monitor.log_phase("Transform");

        tracing::info!("💾 Finishing plate...");
        let location = self.pipeline.load(result).await?;
        tracing::info!("💾 Plate written to: {}", location);
        self.monitor.log_phase("Load");
        self.monitor.log_summary();

        Ok(location)
    }
}
