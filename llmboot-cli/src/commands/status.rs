//! `llmboot status`: report what a setup run would find.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use llmboot_core::{Host, StatusReport, SystemHost};

use super::setup::print_header;
use super::{Overrides, load_config};

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub overrides: Overrides,
}

pub async fn run(args: StatusArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path, &args.overrides)?;
    let host: Arc<dyn Host> = Arc::new(SystemHost::new());
    let status = super::bootstrapper(host, config, &args.overrides)
        .status()
        .await;

    print_header("llmboot status");
    println!("{}", render(&status));
    println!();
    if status.is_ready() {
        println!("Everything is in place. Start the app with your run command.");
    } else {
        println!("Run 'llmboot setup' to finish bootstrapping.");
    }
    Ok(())
}

fn state_cell(ok: bool, yes: &str, no: &str) -> Cell {
    if ok {
        Cell::new(yes).fg(Color::Green)
    } else {
        Cell::new(no).fg(Color::Red)
    }
}

/// Render the status as a table.
fn render(status: &StatusReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Check").fg(Color::Cyan),
        Cell::new("State").fg(Color::Cyan),
        Cell::new("Detail").fg(Color::Cyan),
    ]);

    table.add_row(vec![
        Cell::new("Runtime"),
        state_cell(status.runtime_path.is_some(), "installed", "missing"),
        Cell::new(
            status
                .runtime_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| format!("`{}` not on PATH", status.binary)),
        ),
    ]);

    table.add_row(vec![
        Cell::new("Service"),
        state_cell(status.serving, "running", "stopped"),
        Cell::new(&status.host),
    ]);

    let model_state = match status.model_present {
        Some(true) => Cell::new("pulled").fg(Color::Green),
        Some(false) => Cell::new("missing").fg(Color::Red),
        None => Cell::new("unknown").fg(Color::Yellow),
    };
    table.add_row(vec![Cell::new("Model"), model_state, Cell::new(&status.model)]);

    table.add_row(vec![
        Cell::new("Manifest"),
        state_cell(status.manifest_present, "found", "missing"),
        Cell::new(status.manifest.display().to_string()),
    ]);

    table
}
