use crate::core::{Pipeline, TransformResult};
use crate::utils::error::Result;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<String> {
        let started = Instant::now();
        tracing::info!("🚀 Starting merge run");

        let transformed = self.extract_and_transform().await?;

        // Load
        let output_path = self.pipeline.load(transformed).await?;
        tracing::info!(
            "📁 Output saved to: {} ({:?})",
            output_path,
            started.elapsed()
        );

        Ok(output_path)
    }

    /// 只做 extract + transform，不寫任何檔案
    pub async fn dry_run(&self) -> Result<TransformResult> {
        tracing::info!("🔍 Dry run: nothing will be written");
        self.extract_and_transform().await
    }

    async fn extract_and_transform(&self) -> Result<TransformResult> {
        // Extract
        let raw_data = self.pipeline.extract().await?;
        tracing::info!("📥 Extracted {} locations", raw_data.len());

        // Transform
        let transformed = self.pipeline.transform(raw_data).await?;
        tracing::info!(
            "🔀 Transformed into {} unique locations",
            transformed.outcome.unique_records.len()
        );

        Ok(transformed)
    }
}
