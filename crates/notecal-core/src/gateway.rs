//! Google Calendar API gateway.
//!
//! Typed create/patch/delete/list operations over the v3 REST surface.
//! Every operation authenticates through the [`TokenBroker`]; a 401/403
//! forces one token refresh and one retry, after which the failure is
//! surfaced. Other non-2xx responses are never retried here.

use std::collections::HashMap;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::auth::{ServiceAccount, TokenBroker};
use crate::error::{AuthError, GatewayError};
use crate::parser::{make_event_key, resolve_end, ScheduleEntry};

/// Production API base.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

const DESCRIPTION_NOTE: &str = "Synced from daily note";
const KEY_PREFIX: &str = "Key: ";

/// Start or end of an event: either an all-day `date` or a wall-clock
/// `dateTime` with an IANA `timeZone`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    fn all_day(date: NaiveDate) -> Self {
        Self {
            date: Some(date.format("%Y-%m-%d").to_string()),
            ..Self::default()
        }
    }

    fn wall_clock(date: NaiveDate, time: chrono::NaiveTime, time_zone: &str) -> Self {
        Self {
            date_time: Some(format!(
                "{}T{}:00",
                date.format("%Y-%m-%d"),
                time.format("%H:%M")
            )),
            time_zone: Some(time_zone.to_string()),
            ..Self::default()
        }
    }
}

/// Request body for event creation and patching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventBody {
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    pub description: String,
}

/// Event resource as returned by the API. Only the fields the engine
/// consumes are modeled; the rest of the resource is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteEvent {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start: Option<EventTime>,
    #[serde(default)]
    pub end: Option<EventTime>,
}

#[derive(Debug, Deserialize)]
struct EventListing {
    #[serde(default)]
    items: Vec<RemoteEvent>,
}

/// Build the request body for one schedule entry on one day. Pure.
///
/// Entries without any explicit start (the bare-title fallback) render as
/// all-day events, like entries carrying the all-day marker. A missing
/// end is the start plus the configured default duration; an end that
/// wraps past midnight stays on the same calendar day.
pub fn build_event_body(
    entry: &ScheduleEntry,
    date: NaiveDate,
    time_zone: &str,
    note_path: &Path,
    default_duration_minutes: u32,
) -> EventBody {
    let key = make_event_key(date, &entry.raw_line);
    let description = format!(
        "{DESCRIPTION_NOTE}: {}\n{KEY_PREFIX}{key}",
        note_path.display()
    );

    match entry.start {
        Some(start) if !entry.all_day => {
            let end = resolve_end(entry, start, default_duration_minutes);
            EventBody {
                summary: entry.title.clone(),
                start: EventTime::wall_clock(date, start, time_zone),
                end: EventTime::wall_clock(date, end, time_zone),
                description,
            }
        }
        _ => EventBody {
            summary: entry.title.clone(),
            start: EventTime::all_day(date),
            end: EventTime::all_day(date + Duration::days(1)),
            description,
        },
    }
}

/// Extract the embedded sync key from an event description, if any.
pub fn event_key_from_description(description: &str) -> Option<&str> {
    description
        .lines()
        .find_map(|line| line.strip_prefix(KEY_PREFIX))
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

/// Key-to-event-id index over a remote listing, recovered from the
/// embedded description keys. Events without a key are skipped.
pub fn remote_key_index(events: &[RemoteEvent]) -> HashMap<String, String> {
    events
        .iter()
        .filter_map(|event| {
            let description = event.description.as_deref()?;
            let key = event_key_from_description(description)?;
            Some((key.to_string(), event.id.clone()))
        })
        .collect()
}

fn is_auth_rejection(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 401 | 403)
}

/// Calendar API client bound to one service account.
pub struct CalendarGateway {
    http: reqwest::Client,
    broker: TokenBroker,
    account: ServiceAccount,
    base_url: String,
}

impl CalendarGateway {
    pub fn new(account: ServiceAccount) -> Self {
        Self {
            http: reqwest::Client::new(),
            broker: TokenBroker::new(),
            account,
            base_url: CALENDAR_API_BASE.to_string(),
        }
    }

    /// Gateway talking to non-default endpoints (tests).
    pub fn with_endpoints(
        account: ServiceAccount,
        base_url: impl Into<String>,
        token_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            broker: TokenBroker::with_endpoint(token_endpoint),
            account,
            base_url: base_url.into(),
        }
    }

    /// Obtain (and cache) a token without performing any calendar call.
    /// Lets the sync cycle fail before mutating anything.
    pub async fn ensure_authenticated(&self) -> Result<(), AuthError> {
        self.broker.access_token(&self.account).await.map(|_| ())
    }

    /// Send a request, refreshing the token and retrying exactly once on
    /// 401/403. A second rejection is returned as an auth error.
    async fn send_with_reauth(
        &self,
        build: impl Fn(&str) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GatewayError> {
        let token = self.broker.access_token(&self.account).await?;
        let response = build(&token).send().await?;
        if !is_auth_rejection(response.status()) {
            return Ok(response);
        }

        log::debug!(
            "calendar API rejected credential ({}), refreshing token and retrying once",
            response.status()
        );
        self.broker.invalidate(&self.account);
        let token = self.broker.access_token(&self.account).await?;
        let response = build(&token).send().await?;
        if is_auth_rejection(response.status()) {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Auth(AuthError::Rejected { status, body }));
        }
        Ok(response)
    }

    async fn into_api_error(response: reqwest::Response) -> GatewayError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        GatewayError::Api { status, body }
    }

    /// Create an event, returning the stored resource.
    pub async fn create(
        &self,
        calendar_id: &str,
        body: &EventBody,
    ) -> Result<RemoteEvent, GatewayError> {
        let url = format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        );
        let response = self
            .send_with_reauth(|token| self.http.post(&url).bearer_auth(token).json(body))
            .await?;
        if !response.status().is_success() {
            return Err(Self::into_api_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// Patch an existing event, returning the stored resource.
    pub async fn patch(
        &self,
        calendar_id: &str,
        event_id: &str,
        body: &EventBody,
    ) -> Result<RemoteEvent, GatewayError> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            self.base_url,
            urlencoding::encode(calendar_id),
            urlencoding::encode(event_id)
        );
        let response = self
            .send_with_reauth(|token| self.http.patch(&url).bearer_auth(token).json(body))
            .await?;
        if !response.status().is_success() {
            return Err(Self::into_api_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// Delete an event. An already-gone event (404/410) is success.
    pub async fn delete(&self, calendar_id: &str, event_id: &str) -> Result<(), GatewayError> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            self.base_url,
            urlencoding::encode(calendar_id),
            urlencoding::encode(event_id)
        );
        let response = self
            .send_with_reauth(|token| self.http.delete(&url).bearer_auth(token))
            .await?;
        let status = response.status();
        if status.is_success() || matches!(status.as_u16(), 404 | 410) {
            return Ok(());
        }
        Err(Self::into_api_error(response).await)
    }

    /// List the events of one day: the half-open UTC window
    /// `[date 00:00Z, date+1 00:00Z)`, recurring events expanded.
    pub async fn list_for_date(
        &self,
        calendar_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<RemoteEvent>, GatewayError> {
        let time_min = format!("{}T00:00:00Z", date.format("%Y-%m-%d"));
        let time_max = format!("{}T00:00:00Z", (date + Duration::days(1)).format("%Y-%m-%d"));

        let params = [
            ("timeMin", time_min.as_str()),
            ("timeMax", time_max.as_str()),
            ("singleEvents", "true"),
            ("orderBy", "startTime"),
        ];
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!(
            "{}/calendars/{}/events?{}",
            self.base_url,
            urlencoding::encode(calendar_id),
            query
        );

        let response = self
            .send_with_reauth(|token| self.http.get(&url).bearer_auth(token))
            .await?;
        if !response.status().is_success() {
            return Err(Self::into_api_error(response).await);
        }
        let listing: EventListing = response.json().await?;
        Ok(listing.items)
    }
}
