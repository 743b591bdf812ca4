//! Calendar microservice client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secretary_core::error::ServiceError;
use secretary_core::ids::UserId;
use secretary_core::services::{CalendarEvent, CalendarService, NewCalendarEvent};
use crate::http::ServiceClient;

pub struct CalendarClient {
    http: ServiceClient,
}

impl CalendarClient {
    pub fn new(http: ServiceClient) -> Self {
        Self { http }
    }

    fn events_path(user_id: &UserId) -> String {
        format!("/users/{user_id}/events")
    }
}

#[async_trait]
impl CalendarService for CalendarClient {
    async fn list_events(
        &self,
        user_id: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, ServiceError> {
        let query = [("from", from.to_rfc3339()), ("to", to.to_rfc3339())];
        self.http.get_json(&Self::events_path(user_id), &query).await
    }

    async fn create_event(
        &self,
        user_id: &UserId,
        event: NewCalendarEvent,
    ) -> Result<CalendarEvent, ServiceError> {
        self.http.post_json(&Self::events_path(user_id), &event).await
    }
}
