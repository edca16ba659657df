use drivegate_core::{Gateway, Operation};
use owo_colors::OwoColorize;
use serde_json::{Map, Value};

use crate::cli::{Cli, OutputFormat};
use crate::commands::{load_config, CommandError, Result};

pub async fn run(cli: &Cli, tool: &str, args_json: Option<&str>, params: &[String]) -> Result<()> {
    tool.parse::<Operation>()?;
    let args = build_arguments(args_json, params)?;

    let config = load_config(cli)?;
    let gateway = Gateway::from_config(&config)?;
    let outcome = gateway.invoke_rendered(tool, &args).await;

    match cli.output {
        OutputFormat::Json => println!("{}", serde_json::to_string(&outcome)?),
        OutputFormat::Pretty => {
            let status = if outcome.success {
                "success".green().bold().to_string()
            } else {
                "failed".red().bold().to_string()
            };
            println!("{} {}", tool.cyan(), status);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    match outcome.error {
        Some(e) if !outcome.success => Err(CommandError::ToolFailed(e)),
        _ => Ok(()),
    }
}

/// `--args` JSON first, then each `-p key=value` on top.
fn build_arguments(args_json: Option<&str>, params: &[String]) -> Result<Map<String, Value>> {
    let mut args = match args_json.map(str::trim).filter(|s| !s.is_empty()) {
        None => Map::new(),
        Some(s) => match serde_json::from_str::<Value>(s)? {
            Value::Object(m) => m,
            _ => {
                return Err(CommandError::InvalidArgs(
                    "--args must be a JSON object".to_string(),
                ))
            }
        },
    };

    for param in params {
        let (key, raw) = param.split_once('=').ok_or_else(|| {
            CommandError::InvalidArgs(format!("expected key=value, got '{}'", param))
        })?;
        // Numbers, booleans, arrays and objects keep their JSON type; anything else is a string.
        let value = serde_json::from_str::<Value>(raw)
            .ok()
            .filter(|v| !v.is_string())
            .unwrap_or_else(|| Value::String(raw.to_string()));
        args.insert(key.trim().to_string(), value);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn params_override_json_args() {
        let args = build_arguments(
            Some(r#"{"query": "old", "limit": 5}"#),
            &["query=report".to_string(), "limit=10".to_string()],
        )
        .unwrap();
        assert_eq!(Value::Object(args), json!({"query": "report", "limit": 10}));
    }

    #[test]
    fn params_keep_json_types() {
        let args = build_arguments(
            None,
            &[
                r#"file_ids=["a","b"]"#.to_string(),
                "target_path=/Archive".to_string(),
            ],
        )
        .unwrap();
        assert_eq!(args["file_ids"], json!(["a", "b"]));
        assert_eq!(args["target_path"], "/Archive");
    }

    #[test]
    fn rejects_malformed_params() {
        assert!(build_arguments(None, &["no_equals".to_string()]).is_err());
        assert!(build_arguments(Some("[1]"), &[]).is_err());
    }
}
