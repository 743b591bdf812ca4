//! Collaborator services reached by tools and by context injection.
//!
//! The calendar and notification microservices and the backend's fact store
//! are external; these traits are the whole contract the runtime relies on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::ServiceError;
use crate::ids::UserId;

/// An event in the user's calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A calendar event to be created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCalendarEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A scheduled reminder. When it fires, the notification service sends a
/// trigger event back into the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub text: String,
    pub remind_at: DateTime<Utc>,
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    async fn list_events(
        &self,
        user_id: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, ServiceError>;

    async fn create_event(
        &self,
        user_id: &UserId,
        event: NewCalendarEvent,
    ) -> Result<CalendarEvent, ServiceError>;
}

#[async_trait]
pub trait ReminderService: Send + Sync {
    async fn create_reminder(
        &self,
        user_id: &UserId,
        text: &str,
        remind_at: DateTime<Utc>,
    ) -> Result<Reminder, ServiceError>;

    async fn list_reminders(&self, user_id: &UserId) -> Result<Vec<Reminder>, ServiceError>;

    /// Returns `false` when no such reminder exists.
    async fn delete_reminder(&self, user_id: &UserId, reminder_id: &str) -> Result<bool, ServiceError>;
}

/// Long-term facts about a user, persisted by the backend.
#[async_trait]
pub trait FactStore: Send + Sync {
    async fn add_fact(&self, user_id: &UserId, fact: &str) -> Result<(), ServiceError>;

    /// All facts, oldest first.
    async fn list_facts(&self, user_id: &UserId) -> Result<Vec<String>, ServiceError>;
}
