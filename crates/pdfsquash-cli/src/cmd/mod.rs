pub mod compress;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::Config;

fn table(header: [&str; 2]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header.map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

/// Print the effective configuration
pub fn show_config(config: &Config) {
    let mut table = table(["Setting", "Value"]);

    table.add_row(vec![
        "Config file",
        &config
            .source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults".to_string()),
    ]);
    table.add_row(vec!["Ghostscript", config.ghostscript.program()]);
    table.add_row(vec![
        "Timeout",
        &config
            .ghostscript
            .timeout_secs
            .map(|s| format!("{s}s"))
            .unwrap_or_else(|| "none".to_string()),
    ]);
    table.add_row(vec!["Workers", &config.workers.default.to_string()]);
    table.add_row(vec!["Max attempts", &config.retry.max_attempts.to_string()]);
    table.add_row(vec!["Output folder", &config.output.dir_name]);

    eprintln!("\n{table}");
}
