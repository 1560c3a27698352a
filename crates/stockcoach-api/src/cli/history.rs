//! `coach history`: the session index as a table.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use stockcoach_types::user::CurrentUser;

use crate::state::AppState;

/// List session dates, most recent first, with message count and preview.
pub async fn list_history(state: &AppState, user: CurrentUser, json: bool) -> Result<()> {
    let chat = state.orchestrator_for(user);
    let view = chat.load(None).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&view.history)?);
        return Ok(());
    }

    if view.history.is_empty() {
        println!();
        println!(
            "  {} No sessions yet. Start one with: {}",
            style("i").blue().bold(),
            style("coach send \"hello\"").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Date").fg(Color::White),
        Cell::new("Messages").fg(Color::White),
        Cell::new("First question").fg(Color::White),
    ]);

    for entry in &view.history {
        let date = if entry.date == view.current_date {
            Cell::new(format!("{} (today)", entry.date)).fg(Color::Green)
        } else {
            Cell::new(&entry.date)
        };
        table.add_row(vec![
            date,
            Cell::new(entry.message_count),
            Cell::new(entry.preview.as_deref().unwrap_or("-")),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} session(s). View one with: {}",
        view.history.len(),
        style("coach show <date>").yellow()
    );
    println!();
    Ok(())
}
