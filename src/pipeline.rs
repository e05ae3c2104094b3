//! Assembles the resolution funnel and the execution engine from configuration

use std::path::Path;
use std::sync::Arc;

use action_flow::{CaseConfig, CaseExecutor, OodaEngine, PageTextVerifier, TestCase};
use action_locator::FunnelOrchestrator;
use action_primitives::{ActuatorCapture, BrowserActuator};
use anyhow::{Context, Result};
use llm_provider::OpenAiReasoner;
use perceiver_structural::DomSnapshotProvider;
use serde::Deserialize;
use slot_extractor::{SlotExtractor, SlotLexicon};
use tracing::{info, warn};

use crate::config::AppConfig;

/// Slot extractor over the configured lexicon, or the built-in one
pub fn build_extractor(config: &AppConfig) -> Result<Arc<SlotExtractor>> {
    let lexicon = match &config.lexicon_path {
        Some(path) => {
            let lexicon = SlotLexicon::from_path(path)
                .with_context(|| format!("loading lexicon {}", path.display()))?;
            info!("Loaded lexicon from {}", path.display());
            Arc::new(lexicon)
        }
        None => SlotLexicon::builtin(),
    };
    let extractor = SlotExtractor::new(lexicon, config.slots.clone())
        .context("building slot extractor")?;
    Ok(Arc::new(extractor))
}

/// Funnel with the semantic and visual layers enabled when credentials exist
pub fn build_funnel(
    config: &AppConfig,
    extractor: Arc<SlotExtractor>,
    actuator: Option<Arc<dyn BrowserActuator>>,
) -> Result<FunnelOrchestrator> {
    let mut builder = FunnelOrchestrator::builder(extractor).config(config.funnel.clone());

    match config.llm.as_ref().filter(|llm| llm.has_credentials()) {
        Some(llm) => {
            let reasoner = Arc::new(
                OpenAiReasoner::new(llm.openai_config()).context("building reasoning provider")?,
            );
            builder = builder.text_reasoner(reasoner.clone());
            match actuator {
                Some(actuator) if llm.enable_visual => {
                    builder = builder.visual(Arc::new(ActuatorCapture::new(actuator)), reasoner);
                }
                _ => {}
            }
            info!("Reasoning provider enabled (model {})", llm.model);
        }
        None => {
            if config.llm.is_some() {
                warn!("LLM settings present without an API key; semantic and visual layers disabled");
            }
        }
    }

    builder.build().context("invalid funnel configuration")
}

/// Case executor over the given collaborators
pub fn build_executor(
    config: &AppConfig,
    snapshots: Arc<dyn DomSnapshotProvider>,
    actuator: Arc<dyn BrowserActuator>,
) -> Result<CaseExecutor> {
    let extractor = build_extractor(config)?;
    let funnel = build_funnel(config, extractor, Some(actuator.clone()))?;
    let verifier = PageTextVerifier::new(snapshots.clone(), config.execution.snapshot_timeout());
    let engine = OodaEngine::new(
        Arc::new(funnel),
        snapshots,
        actuator,
        config.execution.clone(),
    )
    .with_verifier(Arc::new(verifier));
    Ok(CaseExecutor::new(Arc::new(engine)))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CaseDocument {
    Many(Vec<serde_yaml::Value>),
    Wrapped { cases: Vec<serde_yaml::Value> },
    One(serde_yaml::Value),
}

/// Parse one case, a list of cases, or `{cases: [...]}` from YAML.
///
/// Cases without their own `config` section get `defaults`.
pub fn parse_cases(source: &str, defaults: &CaseConfig) -> Result<Vec<TestCase>> {
    let document: CaseDocument = serde_yaml::from_str(source).context("parsing case file")?;
    let raw_cases = match document {
        CaseDocument::Many(cases) | CaseDocument::Wrapped { cases } => cases,
        CaseDocument::One(case) => vec![case],
    };

    raw_cases
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let has_config = raw.get("config").is_some();
            let mut case: TestCase = serde_yaml::from_value(raw)
                .with_context(|| format!("case #{} is malformed", index + 1))?;
            if !has_config {
                case.config = defaults.clone();
            }
            if case.name.is_empty() {
                case.name = format!("case-{}", index + 1);
            }
            Ok(case)
        })
        .collect()
}

pub async fn load_cases(path: &Path, defaults: &CaseConfig) -> Result<Vec<TestCase>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_cases(&raw, defaults)
}
