/*!
 * Operator CLI output helpers
 *
 * Themed messages and tables for the `cyberrange` binary.
 */

use crate::orchestrator::{CleanupOutcome, NodeListing, SessionView, StartOutcome};
use crate::store::{Scenario, SessionSummary};
use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::{style, StyledObject};

/// Brand colors for consistent styling
pub struct Theme;

impl Theme {
    pub fn primary<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan()
    }

    pub fn success<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).green()
    }

    pub fn warning<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).yellow()
    }

    pub fn error<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).red()
    }

    pub fn muted<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).dim()
    }
}

/// Unicode icons for visual feedback
pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
    pub const INFO: &'static str = "ℹ";
    pub const ARROW_RIGHT: &'static str = "→";
}

/// Create a styled table with rounded corners
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header_cells(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|t| Cell::new(t).add_attribute(Attribute::Bold).fg(Color::Cyan))
        .collect()
}

/// Render a time stamp stored as Unix seconds
pub fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

pub fn scenario_table(scenarios: &[Scenario]) -> Table {
    let mut table = create_table();
    table.set_header(header_cells(&["ID", "Name", "Difficulty", "Template", "Owner"]));
    for scenario in scenarios {
        table.add_row(vec![
            Cell::new(scenario.id),
            Cell::new(&scenario.name),
            Cell::new(scenario.difficulty),
            Cell::new(&scenario.template_project_id),
            Cell::new(&scenario.created_by),
        ]);
    }
    table
}

pub fn session_table(sessions: &[SessionSummary]) -> Table {
    let mut table = create_table();
    table.set_header(header_cells(&["ID", "User", "Scenario", "Project", "Started"]));
    for summary in sessions {
        let session = &summary.session;
        table.add_row(vec![
            Cell::new(session.id),
            Cell::new(&session.user_id),
            Cell::new(&summary.scenario_name),
            Cell::new(&session.project_id),
            Cell::new(format_timestamp(session.started_at)),
        ]);
    }
    table
}

pub fn session_view_table(view: &SessionView) -> Table {
    let mut table = create_table();
    match &view.nodes {
        NodeListing::Available { nodes } => {
            table.set_header(header_cells(&["Node", "Type", "Status", "Console"]));
            for node in nodes {
                let console = match (&node.console_host, node.console) {
                    (Some(host), Some(port)) => format!("{}:{}", host, port),
                    (None, Some(port)) => port.to_string(),
                    _ => "-".to_string(),
                };
                let status = node.status.clone().unwrap_or_else(|| "unknown".to_string());
                let status_cell = if node.is_started() {
                    Cell::new(status).fg(Color::Green)
                } else {
                    Cell::new(status).fg(Color::Yellow)
                };
                table.add_row(vec![
                    Cell::new(&node.name),
                    Cell::new(node.node_type.as_deref().unwrap_or("-")),
                    status_cell,
                    Cell::new(console),
                ]);
            }
        }
        NodeListing::Unavailable { reason } => {
            table.set_header(header_cells(&["Nodes"]));
            table.add_row(vec![Cell::new(format!("unavailable: {}", reason)).fg(Color::Red)]);
        }
    }
    table
}

pub fn describe_start(start: &StartOutcome) -> String {
    match start {
        StartOutcome::Started => "nodes started".to_string(),
        StartOutcome::Degraded { reason } => format!("nodes NOT started ({})", reason),
    }
}

pub fn describe_cleanup(cleanup: &CleanupOutcome) -> String {
    match cleanup {
        CleanupOutcome::Clean => "project stopped and deleted".to_string(),
        CleanupOutcome::Skipped => "session had already ended".to_string(),
        CleanupOutcome::Partial {
            stop_error,
            delete_error,
        } => format!(
            "cleanup incomplete (stop: {}, delete: {})",
            stop_error.as_deref().unwrap_or("ok"),
            delete_error.as_deref().unwrap_or("ok")
        ),
    }
}

/// Print a styled error message with optional suggestion
pub fn print_error(message: &str, suggestion: Option<&str>) {
    eprintln!(
        "\n{} {}",
        Theme::error(format!("{} Error:", Icons::ERROR)),
        message
    );

    if let Some(hint) = suggestion {
        eprintln!(
            "  {} {}",
            Theme::muted(Icons::ARROW_RIGHT),
            Theme::muted(hint)
        );
    }
    eprintln!();
}

pub fn print_warning(message: &str) {
    eprintln!(
        "{} {}",
        Theme::warning(Icons::WARNING.to_string()),
        Theme::warning(message)
    );
}

pub fn print_success(message: &str) {
    println!(
        "{} {}",
        Theme::success(Icons::SUCCESS.to_string()),
        Theme::success(message)
    );
}

pub fn print_info(message: &str) {
    println!("{} {}", Theme::primary(Icons::INFO.to_string()), message);
}
