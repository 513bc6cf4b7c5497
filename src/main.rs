use clap::Parser;
use small_flows::utils::error::{EtlError, ErrorSeverity};
use small_flows::utils::{logger, validation::Validate};
use small_flows::{CliConfig, EtlEngine, FlowConfig, FlowPipeline, LocalStorage};
use std::path::Path;

fn exit_with(e: &EtlError) -> ! {
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting small-flows CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let mut config = match FlowConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Failed to load {}: {}", cli.config, e);
            exit_with(&e);
        }
    };
    if let Some(output_path) = &cli.output_path {
        config.output.path = output_path.clone();
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        exit_with(&e);
    }

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    // 來源路徑相對於設定檔所在目錄
    let config_dir = Path::new(&cli.config)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let input = LocalStorage::new(config_dir);
    let output = LocalStorage::new(config.output_path());
    let pipeline = FlowPipeline::new(input, output, config);
    let engine = EtlEngine::new_with_monitoring(pipeline, cli.monitor);

    if cli.dry_run {
        match engine.preview().await {
            Ok(result) => {
                println!("🔎 Dry run: {} resources", result.resources.len());
                for (descriptor, resource) in result.package.resources.iter().zip(&result.resources) {
                    let fields: Vec<String> = descriptor
                        .schema
                        .fields
                        .iter()
                        .map(|f| format!("{}:{}", f.name, f.field_type))
                        .collect();
                    println!(
                        "  - {} ({} rows) [{}]",
                        resource.name,
                        resource.rows.len(),
                        fields.join(", ")
                    );
                }
            }
            Err(e) => {
                tracing::error!("❌ Dry run failed: {}", e);
                exit_with(&e);
            }
        }
        return Ok(());
    }

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Flow completed successfully!");
            println!("✅ Flow completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Flow failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            exit_with(&e);
        }
    }

    Ok(())
}
