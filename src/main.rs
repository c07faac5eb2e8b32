mod funnel;
mod gateway;

use clap::{Parser, Subcommand};
use forma_channels::{program::HttpProgramService, webhook::WebhookChannel};
use forma_core::{
    config::{self, Config},
    traits::{Channel, MediaDescriber, Provider, SpeechToText},
};
use forma_media::{whisper::WhisperTranscriber, MediaResolver};
use forma_memory::Store;
use forma_providers::{anthropic::AnthropicProvider, gemini::GeminiProvider, openai::OpenAiProvider};
use gateway::{Classifier, Gateway};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "forma",
    version,
    about = "Forma — conversation orchestration for coaching chat automation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the orchestration gateway.
    Start,
    /// Check configuration and provider availability.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Start => {
            let cfg = config::load(&cli.config)?;
            let gateway = build_gateway(&cfg).await?;
            println!("Forma — starting gateway...");
            gateway.run().await?;
        }
        Commands::Status => {
            let cfg = config::load(&cli.config)?;
            println!("Forma — status check\n");
            println!("Config: {}", cli.config);
            println!("Debounce window: {}s", cfg.buffer.debounce_secs);
            println!(
                "Classifier cascade ({} models, {} retries, {}s backoff):",
                cfg.classifier.cascade.len(),
                cfg.classifier.max_retries,
                cfg.classifier.backoff_secs,
            );

            for provider in build_cascade(&cfg)? {
                let available = provider.is_available().await;
                println!(
                    "  {}: {}",
                    provider.name(),
                    if available { "available" } else { "not available" }
                );
            }

            println!(
                "\nWebhook channel: {}",
                if cfg.channel.webhook.enabled {
                    format!("{}:{}", cfg.channel.webhook.host, cfg.channel.webhook.port)
                } else {
                    "disabled".to_string()
                }
            );
            println!(
                "Program service: {}",
                if cfg.program.base_url.is_empty() {
                    "not configured"
                } else {
                    cfg.program.base_url.as_str()
                }
            );
        }
    }

    Ok(())
}

/// Instantiate the classifier cascade in configured order.
fn build_cascade(cfg: &Config) -> anyhow::Result<Vec<Arc<dyn Provider>>> {
    let timeout = cfg.classifier.request_timeout_secs;
    let mut cascade: Vec<Arc<dyn Provider>> = Vec::with_capacity(cfg.classifier.cascade.len());

    for entry in &cfg.classifier.cascade {
        let provider: Arc<dyn Provider> = match entry.provider.as_str() {
            "anthropic" => Arc::new(AnthropicProvider::from_config(
                cfg.providers.anthropic_api_key.clone(),
                entry.model.clone(),
                timeout,
            )),
            "openai" => Arc::new(OpenAiProvider::from_config(
                cfg.providers.openai_base_url.clone(),
                cfg.providers.openai_api_key.clone(),
                entry.model.clone(),
                timeout,
            )),
            "gemini" => Arc::new(GeminiProvider::from_config(
                cfg.providers.gemini_api_key.clone(),
                entry.model.clone(),
                timeout,
            )),
            other => anyhow::bail!("unknown provider in cascade: {other}"),
        };
        cascade.push(provider);
    }

    if cascade.is_empty() {
        anyhow::bail!("classifier cascade is empty — configure at least one model");
    }

    Ok(cascade)
}

/// Wire the full gateway from config.
async fn build_gateway(cfg: &Config) -> anyhow::Result<Arc<Gateway>> {
    let cascade = build_cascade(cfg)?;
    // The cascade's primary doubles as the response generator.
    let chat_provider = cascade[0].clone();
    if !chat_provider.is_available().await {
        anyhow::bail!("provider '{}' is not available", chat_provider.name());
    }

    let store = Store::new(&cfg.memory).await?;

    let stt: Arc<dyn SpeechToText> = Arc::new(WhisperTranscriber::from_config(
        cfg.providers.openai_api_key.clone(),
        cfg.media.call_timeout_secs,
    ));
    let describer: Arc<dyn MediaDescriber> = Arc::new(GeminiProvider::from_config(
        cfg.providers.gemini_api_key.clone(),
        cfg.providers.gemini_vision_model.clone(),
        cfg.media.call_timeout_secs,
    ));
    let resolver = MediaResolver::new(stt, describer, cfg.media.clone());

    let classifier = Classifier::new(cascade, &cfg.classifier);

    let mut channels: HashMap<String, Arc<dyn Channel>> = HashMap::new();
    if cfg.channel.webhook.enabled {
        channels.insert(
            "webhook".to_string(),
            Arc::new(WebhookChannel::new(cfg.channel.webhook.clone())),
        );
    }
    if channels.is_empty() {
        anyhow::bail!("no channels enabled — enable the webhook channel in config.toml");
    }

    let program = Arc::new(HttpProgramService::new(
        cfg.program.base_url.clone(),
        cfg.program.api_key.clone(),
        cfg.program.timeout_secs,
    ));

    Ok(Arc::new(Gateway::new(
        channels,
        store,
        resolver,
        classifier,
        chat_provider,
        program,
        Arc::new(funnel::ScriptedFunnel),
        cfg.prompts.clone(),
        cfg.buffer.clone(),
        cfg.funnel.clone(),
    )))
}
