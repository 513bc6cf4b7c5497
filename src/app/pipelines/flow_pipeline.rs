use crate::config::flow_config::{FlowConfig, SourceConfig};
use crate::core::dump;
use crate::core::flow::Flow;
use crate::core::processors::load::load_source;
use crate::core::{Pipeline, SourceData, Storage, TransformResult};
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use std::path::Path;

/// 依 TOML 設定執行：讀取來源、套用 set_type 步驟、寫出結果
pub struct FlowPipeline<S: Storage> {
    input: S,
    output: S,
    config: FlowConfig,
    client: Client,
}

impl<S: Storage> FlowPipeline<S> {
    /// `input` 用來讀取本機來源檔，`output` 用來寫出結果
    pub fn new(input: S, output: S, config: FlowConfig) -> Self {
        Self {
            input,
            output,
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    async fn fetch_source(&self, source: &SourceConfig) -> Result<Vec<u8>> {
        if let Some(url) = &source.url {
            let mut request = self.client.get(url);

            if let Some(headers) = &source.headers {
                for (key, value) in headers {
                    request = request.header(key, value);
                }
            }

            if let Some(timeout) = source.timeout_seconds {
                request = request.timeout(std::time::Duration::from_secs(timeout));
            }

            tracing::debug!("📡 {}: Making request to: {}", source.name, url);
            let response = request.send().await?;
            tracing::debug!("📡 {}: Response status: {}", source.name, response.status());

            if !response.status().is_success() {
                return Err(EtlError::ProcessingError {
                    message: format!(
                        "Source '{}' request failed with status: {}",
                        source.name,
                        response.status()
                    ),
                });
            }
            Ok(response.bytes().await?.to_vec())
        } else if let Some(path) = &source.path {
            tracing::debug!("📄 {}: Reading file: {}", source.name, path);
            self.input.read_file(path).await
        } else {
            Err(EtlError::ConfigValidationError {
                field: format!("sources.{}", source.name),
                message: "exactly one of `path` or `url` is required".to_string(),
            })
        }
    }

    /// 建立 Flow 並讀完所有資料列（同步執行）
    fn run_flow(&self, data: Vec<SourceData>) -> Result<TransformResult> {
        let mut flow = Flow::new();

        for source in data {
            let delimiter = self
                .config
                .sources
                .iter()
                .find(|s| s.name == source.name)
                .and_then(|s| s.delimiter);

            let mut load = load_source(source);
            if let Some(delimiter) = delimiter {
                load = load.with_delimiter(delimiter as u8);
            }
            flow.push(Box::new(load));
        }

        for step in self.config.set_type_steps() {
            flow.push(Box::new(step.to_processor()?));
        }

        tracing::debug!("🔧 Flow has {} steps", flow.len());
        let mut result = flow.results()?;
        result.package.name = Some(self.config.flow.name.clone());
        Ok(result)
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for FlowPipeline<S> {
    async fn extract(&self) -> Result<Vec<SourceData>> {
        let mut data = Vec::with_capacity(self.config.sources.len());

        for source in &self.config.sources {
            let bytes = self.fetch_source(source).await?;
            tracing::info!("📥 {}: {} bytes", source.name, bytes.len());
            data.push(SourceData {
                name: source.name.clone(),
                format: source.format(),
                bytes,
            });
        }

        Ok(data)
    }

    async fn transform(&self, data: Vec<SourceData>) -> Result<TransformResult> {
        self.run_flow(data)
    }

    async fn load(&self, mut result: TransformResult) -> Result<String> {
        let formats = &self.config.output.formats;
        let mut files: Vec<(String, Vec<u8>)> = Vec::new();

        for (descriptor, resource) in result.package.resources.iter_mut().zip(&result.resources) {
            for format in formats {
                let filename = format!("{}.{}", resource.name, format);
                let content = match format.as_str() {
                    "json" => dump::to_json(&descriptor.schema, &resource.rows)?,
                    _ => dump::to_csv(&descriptor.schema, &resource.rows)?,
                };
                if descriptor.path.is_none() {
                    descriptor.path = Some(filename.clone());
                }
                files.push((filename, content.into_bytes()));
            }
        }
        files.push((
            "datapackage.json".to_string(),
            dump::datapackage_json(&result.package)?.into_bytes(),
        ));

        let output_path = Path::new(self.config.output_path());
        if self.config.output.zip {
            let archive_name = format!("{}.zip", self.config.flow.name);
            tracing::debug!("Creating ZIP file with {} files", files.len());
            let zip_data = dump::zip_files(&files)?;
            self.output.write_file(&archive_name, &zip_data).await?;
            return Ok(output_path.join(archive_name).display().to_string());
        }

        for (name, data) in &files {
            tracing::debug!("💾 Writing {} ({} bytes)", name, data.len());
            self.output.write_file(name, data).await?;
        }

        Ok(output_path.display().to_string())
    }
}
