//! Session record CLI commands: list, show, delete, purge.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;

use mealflow_types::session::{SessionId, SessionStatus, SessionSummary};

use crate::state::AppState;

const DEFAULT_PURGE_DAYS: u32 = 30;

/// List recent sessions in a table.
pub async fn list_sessions(state: &AppState, status: Option<String>, limit: usize, json: bool) -> Result<()> {
    let status = match status {
        Some(s) => Some(s.parse::<SessionStatus>().map_err(|e| anyhow::anyhow!(e))?),
        None => None,
    };
    let sessions = state.manager.list(status, limit.max(1)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!(
            "  {} No sessions found. Start one with: {}",
            style("i").blue().bold(),
            style("mealflow plan --cuisine <name>").yellow()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("{}", session_table(&sessions));
    println!();
    println!(
        "  {} session{}",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

fn session_table(sessions: &[SessionSummary]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Cuisine").fg(Color::White),
        Cell::new("Meal").fg(Color::White),
        Cell::new("Position").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);

    for session in sessions {
        table.add_row(vec![
            Cell::new(session.id.to_string()).fg(Color::DarkGrey),
            status_cell(session.status),
            Cell::new(session.cuisine_type.as_deref().unwrap_or("-")),
            Cell::new(session.selected_meal.as_deref().unwrap_or("-")).fg(Color::Cyan),
            Cell::new(session.position.to_string()),
            Cell::new(format_relative_time(&session.updated_at)).fg(Color::DarkGrey),
        ]);
    }
    table
}

/// Show a single session record.
pub async fn show_session(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id = parse_id(id)?;
    let session = state.manager.get(&id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style("Session").bold(), style(session.id).cyan());
    println!();
    println!("  {}", style("── Details ──").dim());
    println!("  {}    {}", style("Status:").bold(), format_status(session.status));
    println!("  {}  {}", style("Position:").bold(), session.position);
    println!("  {}  {}", style("Revision:").bold(), session.revision);
    if !session.state.cuisine_type.is_empty() {
        println!("  {}   {}", style("Cuisine:").bold(), session.state.cuisine_type);
    }
    if let Some(url) = &session.state.direct_url {
        println!("  {}       {}", style("URL:").bold(), url);
    }
    if let Some(meal) = &session.state.selected_meal {
        println!("  {}      {} {}", style("Meal:").bold(), style(&meal.name).cyan(), style(&meal.recipe_url).dim());
    }
    if let Some(error) = &session.state.error {
        println!("  {}     {}", style("Error:").bold(), style(error).red());
    }
    if let Some(pending) = &session.pending_interrupt {
        println!("  {}   {} ({})", style("Waiting:").bold(), pending.prompt(), pending.event_name());
    }
    println!();

    let groceries = session.state.grocery_list();
    if !groceries.is_empty() {
        println!("  {}", style("── Grocery list ──").dim());
        for item in groceries {
            println!("  {} {} {} {}", style("•").dim(), item.amount, item.unit, item.name);
        }
        println!();
    }

    println!("  {}", style("── Timestamps ──").dim());
    println!("  {}  {}", style("Created:").bold(), session.created_at.format("%Y-%m-%d %H:%M UTC"));
    println!("  {}  {}", style("Updated:").bold(), session.updated_at.format("%Y-%m-%d %H:%M UTC"));
    println!();

    Ok(())
}

/// Delete a session with confirmation.
pub async fn delete_session(state: &AppState, id: &str, force: bool, json: bool) -> Result<()> {
    let id = parse_id(id)?;
    let session = state.manager.get(&id).await?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete {} session {}?",
                session.status,
                style(id).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state.manager.delete(&id).await?;

    if json {
        println!("{}", serde_json::json!({"deleted": true, "id": id.to_string()}));
    } else {
        println!("  {} Session {} deleted.", style("✓").red().bold(), id);
    }
    Ok(())
}

/// Remove finished sessions older than the retention window.
pub async fn purge_sessions(state: &AppState, older_than_days: Option<u32>, json: bool) -> Result<()> {
    let days = older_than_days
        .or(state.config.storage.retention_days)
        .unwrap_or(DEFAULT_PURGE_DAYS);
    let removed = state.manager.purge(days).await?;

    if json {
        println!("{}", serde_json::json!({"removed": removed, "older_than_days": days}));
    } else {
        println!(
            "  {} Removed {} finished session{} older than {} day{}.",
            style("✓").green().bold(),
            style(removed).bold(),
            if removed == 1 { "" } else { "s" },
            days,
            if days == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

fn parse_id(id: &str) -> Result<SessionId> {
    id.parse::<SessionId>()
        .map_err(|_| anyhow::anyhow!("'{id}' is not a valid session id"))
}

// --- Formatting helpers ---

fn status_cell(status: SessionStatus) -> Cell {
    match status {
        SessionStatus::Running => Cell::new("● running").fg(Color::Blue),
        SessionStatus::Interrupted => Cell::new("◐ interrupted").fg(Color::Yellow),
        SessionStatus::Complete => Cell::new("● complete").fg(Color::Green),
        SessionStatus::Failed => Cell::new("✗ failed").fg(Color::Red),
    }
}

fn format_status(status: SessionStatus) -> String {
    match status {
        SessionStatus::Running => format!("{}", style("● running").blue()),
        SessionStatus::Interrupted => format!("{}", style("◐ interrupted").yellow()),
        SessionStatus::Complete => format!("{}", style("● complete").green()),
        SessionStatus::Failed => format!("{}", style("✗ failed").red()),
    }
}

fn format_relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let diff = chrono::Utc::now() - *dt;

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d ago", diff.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}
