use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde_json::Value as JsonValue;

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Get one configuration value by dotted key
    Get {
        /// Configuration key, e.g. `funnel.attribute_threshold`
        key: String,
    },

    /// Validate configuration
    Validate,
}

pub fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let json = redacted(serde_json::to_value(ctx.config())?);
    match args.action {
        ConfigAction::Show => {
            match ctx.config_path() {
                Some(path) => println!("Current configuration ({}):", path.display()),
                None => println!("Current configuration (defaults):"),
            }
            print!("{}", serde_yaml::to_string(&json)?);
        }
        ConfigAction::Get { key } => {
            let segments = split_key(&key)?;
            match get_json_value(&json, &segments) {
                Some(value) => print!("{}", serde_yaml::to_string(value)?),
                None => bail!("{} not found in configuration", key),
            }
        }
        ConfigAction::Validate => {
            // Loading already validated; re-run so the command stands alone.
            ctx.config().validate()?;
            println!("Configuration is valid");
        }
    }
    Ok(())
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key.split('.').map(str::trim).collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        bail!("invalid configuration key '{}'", key);
    }
    Ok(segments)
}

fn get_json_value<'a>(value: &'a JsonValue, segments: &[&str]) -> Option<&'a JsonValue> {
    segments
        .iter()
        .try_fold(value, |current, segment| match current {
            JsonValue::Object(map) => map.get(*segment),
            JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn redacted(mut json: JsonValue) -> JsonValue {
    if let Some(keys) = json
        .get_mut("llm")
        .and_then(|llm| llm.get_mut("api_keys"))
        .and_then(JsonValue::as_array_mut)
    {
        for key in keys.iter_mut() {
            *key = JsonValue::String("***".into());
        }
    }
    json
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotted_lookup() {
        let value = json!({"funnel": {"attribute_threshold": 0.7}, "list": [1, 2]});
        assert_eq!(
            get_json_value(&value, &split_key("funnel.attribute_threshold").unwrap()),
            Some(&json!(0.7))
        );
        assert_eq!(get_json_value(&value, &["list", "1"]), Some(&json!(2)));
        assert!(get_json_value(&value, &["funnel", "missing"]).is_none());
        assert!(split_key("funnel..x").is_err());
    }

    #[test]
    fn api_keys_are_masked() {
        let masked = redacted(json!({"llm": {"api_keys": ["sk-1", "sk-2"], "model": "m"}}));
        assert_eq!(masked["llm"]["api_keys"], json!(["***", "***"]));
        assert_eq!(masked["llm"]["model"], json!("m"));
    }
}
