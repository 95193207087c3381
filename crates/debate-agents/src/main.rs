use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use coordination::{DebateOrchestrator, StructuredCaller};
use debate_agents::{warmup, AgentsConfig, ProviderRouter, ProviderSelection};
use tracing::{info, warn};

/// Run a four-role debate plus judge on a question and print the result as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The question to debate
    question: String,

    /// Background for the debaters
    #[arg(long, default_value = "")]
    context: String,

    /// Backend selection: ollama, openai or hybrid (overrides LLM_PROVIDER)
    #[arg(long)]
    provider: Option<String>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Local model name (overrides OLLAMA_MODEL)
    #[arg(long)]
    ollama_model: Option<String>,

    /// Local server base URL (overrides OLLAMA_URL)
    #[arg(long)]
    ollama_url: Option<String>,

    /// Local request timeout in seconds (overrides OLLAMA_TIMEOUT_SECS)
    #[arg(long)]
    ollama_timeout: Option<u64>,

    /// Remote model name (overrides OPENAI_MODEL)
    #[arg(long)]
    openai_model: Option<String>,

    /// Remote API base URL (overrides OPENAI_BASE_URL)
    #[arg(long)]
    openai_url: Option<String>,

    /// Remote request timeout in seconds (overrides OPENAI_TIMEOUT_SECS)
    #[arg(long)]
    openai_timeout: Option<u64>,

    /// Concurrent role calls per phase
    #[arg(long)]
    max_parallel: Option<usize>,

    /// JSON repair attempts per call
    #[arg(long)]
    repair_budget: Option<u32>,

    /// Send one throwaway request before the debate starts
    #[arg(long, default_value_t = false)]
    warmup: bool,
}

impl Args {
    /// CLI flags sit on top of file and environment values.
    fn apply_to(&self, config: &mut AgentsConfig) {
        if let Some(provider) = &self.provider {
            config.provider = Some(provider.clone());
        }
        if let Some(model) = &self.ollama_model {
            config.ollama.model = model.clone();
        }
        if let Some(url) = &self.ollama_url {
            config.ollama.base_url = url.clone();
        }
        if let Some(secs) = self.ollama_timeout {
            config.ollama.timeout_secs = secs;
        }
        if let Some(model) = &self.openai_model {
            config.openai.model = model.clone();
        }
        if let Some(url) = &self.openai_url {
            config.openai.base_url = url.clone();
        }
        if let Some(secs) = self.openai_timeout {
            config.openai.timeout_secs = secs;
        }
        if let Some(n) = self.max_parallel {
            config.debate.max_parallel_calls = n;
        }
        if let Some(budget) = self.repair_budget {
            config.debate.repair_budget = budget;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = AgentsConfig::load(args.config.as_deref()).context("loading configuration")?;
    args.apply_to(&mut config);
    config.validate().context("invalid configuration")?;

    let selection = ProviderSelection::resolve_from(None, config.provider.as_deref())?;
    let caller = ProviderRouter::build(selection, &config).context("building provider router")?;
    info!(provider = %selection, "Debate engine starting");

    if args.warmup {
        if let Err(e) = warmup(caller.as_ref()).await {
            warn!(error = %e, "warmup failed, continuing");
        }
    }

    let structured = StructuredCaller::new(caller).with_repair_budget(config.debate.repair_budget);
    let orchestrator = DebateOrchestrator::with_config(structured, config.debate_config());

    let state = orchestrator
        .run(args.question.trim(), args.context.trim())
        .await
        .context("debate run failed")?;
    info!(status = %state.status_line(), "Debate complete");

    let json = serde_json::to_string_pretty(&state).context("serialising debate state")?;
    println!("{json}");
    Ok(())
}
