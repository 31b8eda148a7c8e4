use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
    Cancelled,
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Accepted => "accepted",
            InviteStatus::Declined => "declined",
            InviteStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub id: String,
    pub event_id: String,
    pub inviter_user_id: String,
    pub invited_user_id: String,
    pub invited_user_name: String,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
}

impl Invite {
    pub fn new(
        event_id: &str,
        inviter_user_id: &str,
        invited_user_id: &str,
        invited_user_name: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_id: event_id.to_string(),
            inviter_user_id: inviter_user_id.to_string(),
            invited_user_id: invited_user_id.to_string(),
            // Fall back to the raw id so the inbox always has something to show.
            invited_user_name: invited_user_name
                .filter(|n| !n.is_empty())
                .unwrap_or(invited_user_id)
                .to_string(),
            status: InviteStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn from_value(value: Value) -> Result<Self, AppError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<Value, AppError> {
        Ok(serde_json::to_value(self)?)
    }
}
