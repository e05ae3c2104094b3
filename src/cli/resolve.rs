use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use perceiver_structural::{DomSnapshotProvider, StaticSnapshotProvider};
use uifunnel_core_types::SessionId;

use crate::cli::context::CliContext;
use crate::cli::output::{print_structured, OutputFormat};
use crate::pipeline::{build_extractor, build_funnel};

#[derive(Args, Clone, Debug)]
pub struct ResolveArgs {
    /// Recorded page snapshot (JSON)
    #[arg(short, long, value_name = "FILE")]
    pub snapshot: PathBuf,

    /// Natural-language instruction
    pub instruction: String,

    /// Print every layer's candidates
    #[arg(long)]
    pub candidates: bool,
}

pub async fn cmd_resolve(args: ResolveArgs, ctx: &CliContext, output: &OutputFormat) -> Result<()> {
    let provider = StaticSnapshotProvider::from_path(&args.snapshot)
        .await
        .with_context(|| format!("loading snapshot {}", args.snapshot.display()))?;
    let session = SessionId::new();
    let snapshot = provider.observe(&session).await?;

    let extractor = build_extractor(ctx.config())?;
    // Recorded snapshots have no screen to capture.
    let funnel = build_funnel(ctx.config(), extractor, None)?;
    let result = funnel
        .resolve(&args.instruction, &session, Arc::new(snapshot.elements))
        .await;

    if print_structured(output, &result)? {
        return Ok(());
    }

    match &result.chosen {
        Some(chosen) => {
            println!(
                "Resolved via {} (confidence {:.2}) in {} ms",
                result.strategy(),
                result.confidence(),
                result.elapsed_ms
            );
            println!(
                "  element #{} <{}> {}",
                chosen.element.id,
                chosen.element.tag,
                chosen.element.text.trim()
            );
            for reason in &chosen.reasons {
                println!("  - {}", reason);
            }
        }
        None => {
            println!(
                "No target found: {}",
                result.reason.as_deref().unwrap_or("no candidates")
            );
        }
    }

    if args.candidates {
        for layer in funnel.layers() {
            let candidates = result.per_layer.get(layer);
            if candidates.is_empty() {
                continue;
            }
            println!("  {}:", layer.name());
            for candidate in candidates {
                println!(
                    "    #{} <{}> {:.3}",
                    candidate.element.id, candidate.element.tag, candidate.score
                );
            }
        }
    }
    Ok(())
}
