use clap::Parser;
use sd_worker::config::serverless::ServerlessConfig;
use sd_worker::core::predictor::HttpPredictor;
use sd_worker::core::worker::{self, TestInput};
use sd_worker::domain::ports::Predictor;
use sd_worker::utils::{logger, validation::Validate};
use sd_worker::{ImageUploader, JobHandler, Worker, WorkerConfig, WorkerError};
use std::path::Path;
use std::sync::Arc;

fn exit_with(context: &str, e: &WorkerError) -> ! {
    tracing::error!("❌ {}: {} (Category: {:?})", context, e, e.category());
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = WorkerConfig::parse();

    if config.log_json {
        logger::init_serverless_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("🔧 Initializing worker");
    tracing::info!("📦 Model URL: {}", config.model_url.as_deref().unwrap_or("none"));
    tracing::info!("🎯 Base Model: {}", config.base_model);
    if config.verbose {
        tracing::debug!("Worker config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        exit_with("Configuration validation failed", &e);
    }

    let serverless = ServerlessConfig::detected();
    let test_input = match TestInput::resolve(
        config.test_input.as_deref(),
        Path::new(worker::TEST_INPUT_FILE),
        serverless,
    ) {
        Ok(test_input) => test_input,
        Err(e) => exit_with("Could not read test input", &e),
    };

    tracing::info!("🤖 Creating model predictor");
    let predictor = Arc::new(HttpPredictor::new(
        config.predictor_endpoint.clone(),
        config.base_model.clone(),
        config.model_url.clone(),
        config.output_dir.clone(),
    ));

    tracing::info!("⚙️ Setting up model (this may take several minutes)");
    if let Err(e) = predictor.setup().await {
        exit_with("Fatal error during initialization", &e);
    }
    tracing::info!("✅ Model setup completed successfully");

    let uploader = match ImageUploader::from_env(&config.upload_dir).await {
        Ok(uploader) => uploader,
        Err(e) => exit_with("Could not configure image uploads", &e),
    };
    let handler = JobHandler::new(predictor, uploader).with_cleanup(!config.no_cleanup);

    if let Some(test_input) = test_input {
        let response = worker::run_local(&handler, test_input).await;
        let rendered = serde_json::to_string_pretty(&worker::result_body(&response))?;
        tracing::info!("🧪 Local test finished");
        println!("{}", rendered);
        return Ok(());
    }

    let serverless_config = match ServerlessConfig::from_env() {
        Ok(serverless_config) => serverless_config,
        Err(e) => exit_with(
            "No job source: pass --test_input, add test_input.json, or run inside the platform",
            &e,
        ),
    };

    tracing::info!("🚀 Starting serverless handler");
    Worker::new(handler, serverless_config).run().await?;

    Ok(())
}
