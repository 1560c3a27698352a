//! Identity extractor.
//!
//! Authentication happens upstream; the gateway forwards the signed-in user
//! as headers:
//! - `X-User-Id` (required)
//! - `X-User-Name`, `X-User-Email`
//! - `X-User-Skill-Level` (`beginner`, `intermediate`, `advanced`)
//! - `X-User-Experience-Level`
//!
//! The client address for timezone lookup comes from `X-Forwarded-For`,
//! falling back to the socket peer.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

use stockcoach_types::user::{CurrentUser, SkillLevel};

use crate::http::error::AppError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const SKILL_LEVEL_HEADER: &str = "x-user-skill-level";
pub const EXPERIENCE_HEADER: &str = "x-user-experience-level";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// The signed-in user and their client address.
#[derive(Debug, Clone)]
pub struct ChatUser {
    pub user: CurrentUser,
    pub ip: Option<IpAddr>,
}

impl FromRequestParts<AppState> for ChatUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = header(parts, USER_ID_HEADER)?
            .ok_or_else(|| AppError::Unauthorized("Missing X-User-Id header.".to_string()))?;

        // An unknown skill level still identifies the user; greet as a beginner.
        let skill_level = header(parts, SKILL_LEVEL_HEADER)?
            .and_then(|raw| raw.parse::<SkillLevel>().ok())
            .unwrap_or_default();

        let user = CurrentUser {
            id,
            name: header(parts, USER_NAME_HEADER)?.unwrap_or_default(),
            email: header(parts, USER_EMAIL_HEADER)?.unwrap_or_default(),
            skill_level,
            experience_level: header(parts, EXPERIENCE_HEADER)?,
            is_admin: false,
        };

        Ok(ChatUser {
            user: state.with_admin_flag(user),
            ip: client_ip(parts),
        })
    }
}

/// A trimmed, non-empty header value.
fn header(parts: &Parts, name: &str) -> Result<Option<String>, AppError> {
    let Some(value) = parts.headers.get(name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthorized(format!("Invalid {name} header encoding")))?
        .trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

/// First `X-Forwarded-For` hop, else the socket peer.
fn client_ip(parts: &Parts) -> Option<IpAddr> {
    let forwarded = parts
        .headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    forwarded.or_else(|| {
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}
