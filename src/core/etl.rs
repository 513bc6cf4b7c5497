use crate::core::{Pipeline, TransformResult};
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

    /// 只執行 extract 與 transform，不寫出任何檔案
    pub async fn preview(&self) -> Result<TransformResult> {
        let sources = self.pipeline.extract().await?;
        tracing::info!("📥 Extracted {} sources", sources.len());
        self.monitor.log_stats("Extract");

        let result = self.pipeline.transform(sources).await?;
        tracing::info!(
            "🔄 Transformed {} resources ({} rows)",
            result.resources.len(),
            result.total_rows()
        );
        self.monitor.log_stats("Transform");

        Ok(result)
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting ETL process...");

        let result = self.preview().await?;

        let output_path = self.pipeline.load(result).await?;
        tracing::info!("💾 Output saved to: {}", output_path);
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(output_path)
    }
}
