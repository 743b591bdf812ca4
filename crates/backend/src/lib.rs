//! REST adapters for the services around the orchestrator.
//!
//! - `RestBackend`: assistants, user → secretary mapping, user facts
//! - `CalendarClient`: the calendar microservice
//! - `NotificationClient`: reminders and outbound delivery
//!
//! All three share `ServiceClient`, which owns the reqwest client and maps
//! transport and status failures onto `ServiceError`.

pub mod calendar;
pub mod http;
pub mod notifications;
pub mod rest;

pub use calendar::CalendarClient;
pub use http::ServiceClient;
pub use notifications::NotificationClient;
pub use rest::RestBackend;

use secretary_config::BackendConfig;
use secretary_core::error::ServiceError;
use std::time::Duration;

/// Build all three adapters from configuration.
pub fn build_from_config(
    config: &BackendConfig,
) -> Result<(RestBackend, CalendarClient, NotificationClient), ServiceError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let token = config.api_token.clone();
    Ok((
        RestBackend::new(ServiceClient::new(&config.api_url, token.clone(), timeout)?),
        CalendarClient::new(ServiceClient::new(&config.calendar_url, token.clone(), timeout)?),
        NotificationClient::new(ServiceClient::new(&config.notifications_url, token, timeout)?),
    ))
}
