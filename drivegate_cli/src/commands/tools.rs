use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use drivegate_core::tools::tool_for;
use drivegate_core::Operation;
use owo_colors::OwoColorize;
use serde_json::{json, Value};

use crate::cli::{Cli, OutputFormat};
use crate::commands::Result;

/// Get the terminal width, defaulting to 80 if detection fails
fn get_terminal_width() -> u16 {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0)
        .unwrap_or(80)
}

fn required_args(op: Operation) -> Vec<String> {
    tool_for(op)
        .input_schema
        .get("required")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn run(cli: &Cli) -> Result<()> {
    if cli.output == OutputFormat::Json {
        let tools: Vec<Value> = Operation::ALL
            .iter()
            .map(|op| {
                json!({
                    "name": op.as_str(),
                    "description": op.description(),
                    "required": required_args(*op),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json!({ "tools": tools }))?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(get_terminal_width())
        .set_header(vec!["Tool", "Required", "Description"]);

    for op in Operation::ALL {
        table.add_row(vec![
            op.as_str().to_string(),
            required_args(op).join(", "),
            op.description().to_string(),
        ]);
    }

    println!();
    println!("{}", "Available tools".bold().cyan());
    println!("{table}");
    println!(
        "{} {}",
        "Tip:".dimmed(),
        "drivegate call <tool> -p key=value".cyan()
    );
    Ok(())
}
