//! Notification microservice client: reminders and outbound delivery.
//!
//! When a reminder fires the service posts a trigger back into the
//! orchestrator; that path is the inbound transport's concern, not ours.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secretary_core::error::ServiceError;
use secretary_core::ids::UserId;
use secretary_core::services::{Reminder, ReminderService};
use secretary_core::transport::ResponseSink;
use serde::Serialize;
use crate::http::ServiceClient;

pub struct NotificationClient {
    http: ServiceClient,
}

#[derive(Serialize)]
struct NewReminder<'a> {
    text: &'a str,
    remind_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    text: &'a str,
}

impl NotificationClient {
    pub fn new(http: ServiceClient) -> Self {
        Self { http }
    }

    fn reminders_path(user_id: &UserId) -> String {
        format!("/users/{user_id}/reminders")
    }
}

#[async_trait]
impl ReminderService for NotificationClient {
    async fn create_reminder(
        &self,
        user_id: &UserId,
        text: &str,
        remind_at: DateTime<Utc>,
    ) -> Result<Reminder, ServiceError> {
        self.http
            .post_json(&Self::reminders_path(user_id), &NewReminder { text, remind_at })
            .await
    }

    async fn list_reminders(&self, user_id: &UserId) -> Result<Vec<Reminder>, ServiceError> {
        self.http.get_json(&Self::reminders_path(user_id), &[]).await
    }

    async fn delete_reminder(&self, user_id: &UserId, reminder_id: &str) -> Result<bool, ServiceError> {
        let path = format!("{}/{reminder_id}", Self::reminders_path(user_id));
        self.http.delete(&path).await
    }
}

#[async_trait]
impl ResponseSink for NotificationClient {
    async fn deliver(&self, user_id: &UserId, text: &str) -> Result<(), ServiceError> {
        self.http
            .post_unit(&format!("/users/{user_id}/messages"), &OutboundMessage { text })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reminder_body_shape() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap();
        let body = serde_json::to_value(NewReminder { text: "Позвонить", remind_at: at }).unwrap();
        assert_eq!(body["text"], "Позвонить");
        assert_eq!(body["remind_at"], "2026-10-18T06:00:00Z");
    }

    #[test]
    fn decodes_reminders() {
        let json = r#"[{"id":"r1","text":"Позвонить","remind_at":"2026-10-18T06:00:00Z"}]"#;
        let reminders: Vec<Reminder> = serde_json::from_str(json).unwrap();
        assert_eq!(reminders[0].id, "r1");
        assert_eq!(NotificationClient::reminders_path(&UserId::new("5")), "/users/5/reminders");
    }
}
