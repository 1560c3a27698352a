//! Chat CLI commands: send, show, new-session.

use std::path::Path;

use anyhow::{Context, Result, bail};
use console::style;

use stockcoach_core::chat::attachment::ImageAttachment;
use stockcoach_types::message::Message;
use stockcoach_types::session::{ChatView, NewSessionOutcome, ReplySource, SendOutcome};
use stockcoach_types::user::CurrentUser;

use crate::state::AppState;

/// Send one message to today's session and print the reply.
///
/// ```bash
/// coach send "Is it a good time to buy index funds?"
/// coach send --image chart.png "What pattern is this?"
/// ```
pub async fn send(
    state: &AppState,
    user: CurrentUser,
    message: &str,
    image: Option<&Path>,
    json: bool,
) -> Result<()> {
    let attachment = match image {
        Some(path) => Some(read_image(path).await?),
        None => None,
    };

    let chat = state.orchestrator_for(user);
    let view = chat.load(None).await;
    warn_history(&view);

    match chat.send_message(message, attachment).await {
        SendOutcome::Delivered {
            user_message,
            ai_message,
            reply_source,
        } => {
            if json {
                let out = serde_json::json!({
                    "user_message": user_message,
                    "ai_message": ai_message,
                    "reply_source": reply_source,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }

            println!();
            print_message(&ai_message);
            match reply_source {
                ReplySource::Canned => println!(
                    "  {}",
                    style("(no webhook configured, canned reply)").dim()
                ),
                ReplySource::ConnectionLost => println!(
                    "  {}",
                    style("(the coach could not be reached)").yellow()
                ),
                ReplySource::Webhook | ReplySource::Fallback => {}
            }
            if let Some(remaining) = chat.view().await.remaining_messages {
                println!("  {}", style(format!("{remaining} messages left")).dim());
            }
            println!();
            Ok(())
        }
        SendOutcome::Rejected { reason } => bail!("Message not sent: {reason}"),
    }
}

/// Print one session.
///
/// ```bash
/// coach show
/// coach show 2024-03-09
/// ```
pub async fn show(
    state: &AppState,
    user: CurrentUser,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let chat = state.orchestrator_for(user);
    let mut view = chat.load(None).await;
    warn_history(&view);

    if let Some(date) = date {
        if !chat.select_date(date).await {
            bail!("No chat session on {date}. See `coach history` for available dates.");
        }
        view = chat.view().await;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    print_view(&view);
    Ok(())
}

/// Start a fresh session for today.
pub async fn new_session(state: &AppState, user: CurrentUser, json: bool) -> Result<()> {
    let chat = state.orchestrator_for(user);
    chat.load(None).await;

    let outcome = chat.clear_messages().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome {
        NewSessionOutcome::Started => {
            println!();
            println!("  {} New session started.", style("✓").green().bold());
            print_view(&chat.view().await);
            Ok(())
        }
        NewSessionOutcome::DailyLimitReached => {
            bail!("You've already started today's session. Come back tomorrow for a new one.")
        }
        NewSessionOutcome::Unauthenticated => bail!("No user identity, pass --user-id"),
    }
}

async fn read_image(path: &Path) -> Result<ImageAttachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mime = image_mime(path)
        .with_context(|| format!("Unsupported image type: {}", path.display()))?;
    Ok(ImageAttachment::new(mime, bytes)?)
}

fn image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn warn_history(view: &ChatView) {
    if let Some(warning) = &view.history_warning {
        eprintln!("  {} {warning}", style("!").yellow().bold());
    }
}

fn print_view(view: &ChatView) {
    println!();
    let label = if view.is_today_session {
        format!("Today ({})", view.selected_date)
    } else {
        format!("{} (read-only)", view.selected_date)
    };
    println!("  {}  {}", style(label).bold(), style(&view.timezone).dim());
    println!();

    if view.messages.is_empty() {
        println!(
            "  {} No messages yet. Start with: {}",
            style("i").blue().bold(),
            style("coach send \"hello\"").yellow()
        );
    }
    for message in &view.messages {
        print_message(message);
    }
    println!();
}

fn print_message(message: &Message) {
    let time = message
        .timestamp
        .with_timezone(&chrono::Local)
        .format("%H:%M")
        .to_string();

    let who = if message.is_ai {
        style("Coach".to_string()).cyan().bold()
    } else {
        style("You".to_string()).green().bold()
    };
    println!("  {} {}", style(time).dim(), who);
    for line in message.content.lines() {
        println!("    {line}");
    }
    if message.image_url.is_some() {
        println!("    {}", style("[image]").dim());
    }
}
