//! Current-user identity consumed by the chat core.
//!
//! Identity comes from the external auth gateway; the chat core only reads it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Self-reported trading skill level, used to tailor welcome messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkillLevel::Beginner => write!(f, "beginner"),
            SkillLevel::Intermediate => write!(f, "intermediate"),
            SkillLevel::Advanced => write!(f, "advanced"),
        }
    }
}

impl FromStr for SkillLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(SkillLevel::Beginner),
            "intermediate" => Ok(SkillLevel::Intermediate),
            "advanced" | "expert" => Ok(SkillLevel::Advanced),
            other => Err(format!("invalid skill level: '{other}'")),
        }
    }
}

/// The authenticated user on whose behalf the chat core acts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub skill_level: SkillLevel,
    /// Free-form experience description from onboarding (e.g. "1-3 years").
    #[serde(default)]
    pub experience_level: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl CurrentUser {
    /// Name used in greetings: the first word of `name`, or "there".
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("there")
    }
}
