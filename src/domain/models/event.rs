use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::error::AppError;

pub const DEFAULT_MIN_PARTICIPANTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Active,
    Drawing,
    Completed,
    Deleted,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventStatus::Pending => "pending",
            EventStatus::Active => "active",
            EventStatus::Drawing => "drawing",
            EventStatus::Completed => "completed",
            EventStatus::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub from: String,
    pub from_name: String,
    pub to: String,
    pub to_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewEvent {
    pub name: String,
    pub description: String,
    pub min_participants: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub organizer_id: String,
    pub organizer_name: String,
    #[serde(default)]
    pub participants: Vec<Participant>,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub min_participants: u32,
    // Present only once a drawing has been committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draws: Option<Vec<Assignment>>,
}

impl Event {
    pub fn new(organizer_id: &str, organizer_name: &str, data: NewEvent) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: data.name.trim().to_string(),
            description: data.description,
            organizer_id: organizer_id.to_string(),
            organizer_name: organizer_name.to_string(),
            // The organizer joins immediately; no email on record at this point.
            participants: vec![Participant {
                user_id: organizer_id.to_string(),
                email: String::new(),
                display_name: organizer_name.to_string(),
                joined_at: now,
            }],
            status: EventStatus::Pending,
            created_at: now,
            min_participants: data.min_participants.unwrap_or(DEFAULT_MIN_PARTICIPANTS),
            draws: None,
        }
    }

    pub fn from_value(value: Value) -> Result<Self, AppError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<Value, AppError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.organizer_id == user_id || self.participants.iter().any(|p| p.user_id == user_id)
    }
}
