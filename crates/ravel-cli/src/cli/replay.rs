//! `ravel replay`: run a task against recorded provider scripts.
//!
//! Each `--script` is bound to a provider name (the agent's provider list,
//! else the enabled configured providers by priority, else `replay`). More
//! than one bound script gives a fallback chain, so scripted failures show
//! the circuit breaker at work.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{Instrument, info_span};

use ravel_core::agent::{AgentEngine, RunContext};
use ravel_core::event::EventBus;
use ravel_core::llm::{LlmProvider, ProviderRegistry};
use ravel_core::repository::HistoryStore;
use ravel_infra::config::load_engine_config;
use ravel_infra::history::JsonFileHistoryStore;
use ravel_infra::llm::ReplayProvider;
use ravel_observe::genai_attrs;
use ravel_types::config::EngineConfig;

use super::ReplayArgs;
use super::render::{EventPrinter, print_report};
use super::tools::builtin_registry;

/// Provider name used when the configuration names none.
const DEFAULT_PROVIDER: &str = "replay";

const EVENT_BUFFER: usize = 256;

pub async fn run(args: ReplayArgs, quiet: bool) -> anyhow::Result<()> {
    let config = load_engine_config(&args.config)
        .await
        .with_context(|| format!("loading {}", args.config.display()))?;

    let provider = build_provider(&config, &args.script).await?;
    tracing::info!(provider = provider.name(), "Replay provider ready");

    let history_file = args.history.as_deref().map(HistoryFile::new);
    let history = match &history_file {
        Some(file) if args.resume => file.load().await?,
        _ => Vec::new(),
    };

    let bus = EventBus::new(EVENT_BUFFER);
    let printer = (!quiet).then(|| EventPrinter::spawn(bus.subscribe()));

    let engine = AgentEngine::new(&config, provider)
        .with_tools(builtin_registry())
        .with_observer(Arc::new(bus.clone()));

    let mut ctx = RunContext::default();
    if let Some(task_id) = &args.task_id {
        ctx = ctx.with_task_id(task_id.clone());
    }
    let control = ctx.control.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            control.cancel();
        }
    });

    let span = info_span!(
        "invoke_agent",
        gen_ai.operation.name = genai_attrs::OP_INVOKE_AGENT,
        gen_ai.agent.name = %config.agent.name,
        gen_ai.agent.id = %ctx.run_id,
        gen_ai.usage.input_tokens = tracing::field::Empty,
        gen_ai.usage.output_tokens = tracing::field::Empty,
    );
    let result = engine
        .run_with_history(&args.task, history, &ctx)
        .instrument(span.clone())
        .await;
    interrupt.abort();

    // Closing the bus lets the printer drain and exit.
    drop(engine);
    drop(bus);
    if let Some(printer) = printer {
        printer.await.context("event printer panicked")?;
    }

    let report = result.context("run failed")?;
    span.record(genai_attrs::GEN_AI_USAGE_INPUT_TOKENS, report.usage.prompt_tokens);
    span.record(genai_attrs::GEN_AI_USAGE_OUTPUT_TOKENS, report.usage.completion_tokens);

    if let Some(file) = &history_file {
        let path = file.save(&report.history).await?;
        if !quiet {
            println!("  {}", console::style(format!("history saved to {}", path.display())).dim());
        }
    }

    print_report(&report);
    Ok(())
}

/// Names the scripts are bound to, in binding order.
fn provider_names(config: &EngineConfig) -> Vec<String> {
    if !config.agent.providers.is_empty() {
        return config.agent.providers.clone();
    }

    let mut enabled: Vec<_> = config.providers.iter().filter(|p| p.enabled).collect();
    enabled.sort_by_key(|p| p.priority);
    if enabled.is_empty() {
        return vec![DEFAULT_PROVIDER.to_string()];
    }
    enabled.into_iter().map(|p| p.name.clone()).collect()
}

async fn build_provider(
    config: &EngineConfig,
    scripts: &[PathBuf],
) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let names = provider_names(config);
    if scripts.len() > names.len() {
        tracing::warn!(
            scripts = scripts.len(),
            providers = names.len(),
            "More scripts than providers, extra scripts ignored"
        );
    }

    let mut registry = ProviderRegistry::new();
    let mut bound = Vec::new();
    for (name, path) in names.into_iter().zip(scripts) {
        let provider = ReplayProvider::load(name.clone(), path)
            .await
            .with_context(|| format!("loading script for provider '{name}'"))?;
        tracing::debug!(provider = %name, steps = provider.remaining(), path = %path.display(), "Loaded script");
        registry.register(name.clone(), Arc::new(provider));
        bound.push(name);
    }

    Ok(registry.resolve(&bound, &config.providers)?)
}

/// A history JSON file, addressed through the JSON history store.
struct HistoryFile {
    store: JsonFileHistoryStore,
    key: String,
}

impl HistoryFile {
    fn new(path: &Path) -> Self {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let key = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "history".to_string());
        Self {
            store: JsonFileHistoryStore::new(dir),
            key,
        }
    }

    async fn load(&self) -> anyhow::Result<Vec<ravel_types::message::Message>> {
        let messages = self
            .store
            .load(&self.key)
            .await
            .with_context(|| format!("loading history '{}'", self.key))?;
        Ok(messages.unwrap_or_default())
    }

    async fn save(&self, messages: &[ravel_types::message::Message]) -> anyhow::Result<PathBuf> {
        self.store
            .save(&self.key, messages)
            .await
            .with_context(|| format!("saving history '{}'", self.key))?;
        Ok(self.store.path_for(&self.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ravel_types::llm::ProviderConfig;
    use ravel_types::message::Message;
    use tempfile::TempDir;

    fn provider(name: &str, priority: u32, enabled: bool) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            model: None,
            priority,
            enabled,
        }
    }

    #[test]
    fn names_default_to_replay() {
        assert_eq!(provider_names(&EngineConfig::default()), vec!["replay"]);
    }

    #[test]
    fn names_follow_agent_list_then_priority() {
        let mut config = EngineConfig::default();
        config.providers = vec![
            provider("backup", 2, true),
            provider("off", 0, false),
            provider("primary", 1, true),
        ];
        assert_eq!(provider_names(&config), vec!["primary", "backup"]);

        config.agent.providers = vec!["backup".to_string()];
        assert_eq!(provider_names(&config), vec!["backup"]);
    }

    #[tokio::test]
    async fn two_scripts_build_a_fallback_chain() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("a.jsonl");
        let second = tmp.path().join("b.jsonl");
        tokio::fs::write(&first, "{\"fail\":\"down\"}\n").await.unwrap();
        tokio::fs::write(&second, "[]\n").await.unwrap();

        let mut config = EngineConfig::default();
        config.providers = vec![provider("a", 0, true), provider("b", 1, true)];

        let provider = build_provider(&config, &[first, second]).await.unwrap();
        assert_eq!(provider.name(), "a|b");
    }

    #[tokio::test]
    async fn history_file_round_trips_through_the_store() {
        let tmp = TempDir::new().unwrap();
        let file = HistoryFile::new(&tmp.path().join("session.json"));

        assert!(file.load().await.unwrap().is_empty());
        let path = file.save(&[Message::user("hello")]).await.unwrap();
        assert_eq!(path, tmp.path().join("session.json"));
        assert_eq!(file.load().await.unwrap().len(), 1);
    }
}
