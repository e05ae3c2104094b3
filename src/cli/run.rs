use std::path::PathBuf;
use std::sync::Arc;

use action_flow::BatchResult;
use action_primitives::RecordingActuator;
use anyhow::{bail, Context, Result};
use clap::Args;
use perceiver_structural::StaticSnapshotProvider;
use serde_json::Value as JsonValue;
use tracing::info;
use uifunnel_core_types::SessionId;

use crate::cli::context::CliContext;
use crate::cli::output::{print_structured, OutputFormat};
use crate::pipeline::{build_executor, load_cases};

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Test case file (YAML)
    pub case: PathBuf,

    /// Recorded page snapshot (JSON); an array of snapshots replays in order
    #[arg(short, long, value_name = "FILE")]
    pub snapshot: PathBuf,

    /// Case variables (key=value), overriding those in the file
    #[arg(short, long)]
    pub param: Vec<String>,

    /// Run only the case with this name
    #[arg(long)]
    pub only: Option<String>,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext, output: &OutputFormat) -> Result<()> {
    let config = ctx.config();
    let params = parse_params(&args.param)?;

    let mut cases = load_cases(&args.case, &config.execution.case).await?;
    if let Some(only) = &args.only {
        cases.retain(|case| &case.name == only);
        if cases.is_empty() {
            bail!("no case named '{}' in {}", only, args.case.display());
        }
    }
    for case in &mut cases {
        for (key, value) in &params {
            case.variables.insert(key.clone(), value.clone());
        }
    }

    let snapshots = Arc::new(
        StaticSnapshotProvider::from_path(&args.snapshot)
            .await
            .with_context(|| format!("loading snapshot {}", args.snapshot.display()))?,
    );
    let actuator = Arc::new(RecordingActuator::new());
    let executor = build_executor(config, snapshots, actuator.clone())?;

    info!(cases = cases.len(), "Executing cases");
    let batch = executor.execute_batch(&cases, &SessionId::new()).await;

    if !print_structured(output, &batch)? {
        print_summary(&batch);
        println!("Actions issued: {}", actuator.calls().len());
    }

    if batch.success_count < batch.total {
        bail!("{} of {} cases failed", batch.total - batch.success_count, batch.total);
    }
    Ok(())
}

/// `key=value` pairs; values that parse as JSON keep their type
fn parse_params(raw: &[String]) -> Result<Vec<(String, JsonValue)>> {
    raw.iter()
        .map(|param| {
            let Some((key, value)) = param.split_once('=') else {
                bail!("invalid parameter '{}', expected key=value", param);
            };
            let key = key.trim();
            if key.is_empty() {
                bail!("invalid parameter '{}', empty key", param);
            }
            let value = serde_json::from_str(value)
                .unwrap_or_else(|_| JsonValue::String(value.to_string()));
            Ok((key.to_string(), value))
        })
        .collect()
}

fn print_summary(batch: &BatchResult) {
    for result in &batch.results {
        println!(
            "[{:?}] {} ({} ms): {}/{} steps passed, {} retries",
            result.status,
            result.name,
            result.duration_ms,
            result.stats.success,
            result.stats.total,
            result.stats.retries
        );
        for step in &result.step_results {
            let strategy = step
                .orientation
                .as_ref()
                .map_or("-", |orientation| orientation.strategy.as_str());
            println!(
                "  {:?} {} [{}]{}",
                step.status,
                step.instruction,
                strategy,
                step.error
                    .as_deref()
                    .map(|err| format!(" {}", err))
                    .unwrap_or_default()
            );
        }
    }
    println!("{}/{} cases passed", batch.success_count, batch.total);
}
