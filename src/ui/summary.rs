use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use crate::store::model::{EnvironmentRecord, EnvironmentStatus};

fn status_text(status: EnvironmentStatus, use_color: bool) -> String {
    if !use_color {
        return format!("\u{25cf} {}", status);
    }
    match status {
        EnvironmentStatus::Running => format!("{} {}", "\u{25cf}".green(), "running".green()),
        EnvironmentStatus::Created => format!("{} {}", "\u{25cf}".yellow(), "created".yellow()),
        EnvironmentStatus::Stopped => format!("{} {}", "\u{25cf}".dimmed(), "stopped".dimmed()),
        EnvironmentStatus::Error => format!("{} {}", "\u{25cf}".red(), "error".red()),
    }
}

/// Render environments as a table, one row per environment.
pub fn environments_table(records: &[EnvironmentRecord], use_color: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Environment").set_alignment(CellAlignment::Left),
        Cell::new("Branch").set_alignment(CellAlignment::Left),
        Cell::new("URLs").set_alignment(CellAlignment::Left),
        Cell::new("Status").set_alignment(CellAlignment::Center),
    ]);

    for record in records {
        let urls = if record.ports.is_empty() {
            "-".to_string()
        } else {
            record
                .ports
                .iter()
                .map(|m| format!("http://{} (:{})", m.hostname, m.host_port))
                .collect::<Vec<_>>()
                .join("\n")
        };
        table.add_row(vec![
            Cell::new(&record.environment.name),
            Cell::new(&record.environment.branch),
            Cell::new(&urls),
            Cell::new(status_text(record.environment.status, use_color)),
        ]);
    }
    table
}

pub fn print_environments(records: &[EnvironmentRecord]) {
    if records.is_empty() {
        println!("No environments found.");
        println!("Run `branchbox create <branch>` inside a repository to create one.");
        return;
    }

    let use_color = std::io::stdout().is_terminal();
    println!();
    for line in environments_table(records, use_color).to_string().lines() {
        println!("  {}", line);
    }
    println!();
}

/// Print where a freshly provisioned environment can be reached.
pub fn print_environment_ready(record: &EnvironmentRecord) {
    let use_color = std::io::stdout().is_terminal();
    let env = &record.environment;

    println!();
    if use_color {
        println!(
            "  {} {} ({})",
            "branchbox".bold(),
            env.name.cyan(),
            status_text(env.status, true)
        );
    } else {
        println!("  branchbox {} ({})", env.name, env.status);
    }
    for mapping in &record.ports {
        println!(
            "    http://{}  ->  container port {}",
            mapping.hostname, mapping.container_port
        );
    }
    if let Some(path) = &env.worktree_path {
        println!("    worktree: {}", path.display());
    }
    println!();
}
