use anyhow::Result;
use clap::Args;

use crate::cli::context::CliContext;
use crate::cli::output::{print_structured, OutputFormat};
use crate::pipeline::build_extractor;

#[derive(Args, Clone, Debug)]
pub struct ExtractArgs {
    /// Natural-language instruction
    pub instruction: String,
}

pub fn cmd_extract(args: ExtractArgs, ctx: &CliContext, output: &OutputFormat) -> Result<()> {
    let extractor = build_extractor(ctx.config())?;
    let slot = extractor.extract(&args.instruction);

    if print_structured(output, &slot)? {
        return Ok(());
    }

    println!("Instruction: {}", args.instruction);
    println!("  action:      {}", slot.action);
    println!("  target:      {}", slot.target.as_deref().unwrap_or("-"));
    println!(
        "  target type: {}",
        slot.target_type.map_or("-", |target_type| target_type.name())
    );
    println!("  keywords:    {}", slot.keywords.join(", "));
    for (name, value) in &slot.attributes {
        println!("  attr {}: {}", name, value);
    }
    if let Some(value) = &slot.value {
        println!("  value:       {}", value);
    }
    if let Some(relation) = extractor.spatial_relation(&args.instruction) {
        println!(
            "  relation:    {} {:?} of {}",
            relation.target, relation.direction, relation.anchor
        );
    }
    println!("  confidence:  {:.2}", slot.confidence());
    Ok(())
}
