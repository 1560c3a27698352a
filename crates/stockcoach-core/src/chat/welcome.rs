//! Welcome messages for fresh sessions.
//!
//! Greets by time of day in the user's timezone and suggests a direction
//! that fits the user's self-reported skill level.

use chrono::{DateTime, Utc};
use stockcoach_types::message::Message;
use stockcoach_types::user::{CurrentUser, SkillLevel};

fn greeting(local_hour: u32) -> &'static str {
    match local_hour {
        5..=11 => "Good morning",
        12..=16 => "Good afternoon",
        _ => "Good evening",
    }
}

fn skill_prompt(skill: SkillLevel) -> &'static str {
    match skill {
        SkillLevel::Beginner => {
            "New to the markets? Ask me anything, from what a P/E ratio means to how to size your first position."
        }
        SkillLevel::Intermediate => {
            "Want to sharpen a strategy, review a recent trade, or dig into a chart pattern?"
        }
        SkillLevel::Advanced => {
            "Ready to stress-test a thesis, talk options Greeks, or tighten up your risk management?"
        }
    }
}

/// Build the welcome message for a new daily session.
pub fn welcome_message(
    user: Option<&CurrentUser>,
    local_hour: u32,
    timestamp: DateTime<Utc>,
) -> Message {
    let name = user.map(CurrentUser::first_name).unwrap_or("there");
    let skill = user.map(|u| u.skill_level).unwrap_or_default();
    let content = format!(
        "{}, {}! I'm your StockCoach. {}",
        greeting(local_hour),
        name,
        skill_prompt(skill)
    );
    Message::from_ai(content, timestamp)
}
