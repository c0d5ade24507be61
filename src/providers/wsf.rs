//! WSDOT Ferries API client.
//!
//! Three REST feeds back the dot display:
//!
//! - `/vessels/rest/vessellocations` — every vessel on the water, with
//!   departing/arriving terminals, dock state, and arrival predictions.
//! - `/terminals/rest/terminalsailingspace` — per-terminal drive-on
//!   space for each imminent departing sailing.
//! - `/schedule/rest/schedule/{date}/{routeId}` — the day's scheduled
//!   departures for a route, grouped by terminal combination.
//!
//! All three take an `apiaccesscode` query parameter. Date fields come
//! back in the ASP.NET wire form `/Date(1483263600000-0800)/`: an epoch
//! millisecond integer with an optional signed four-digit offset. Only
//! the milliseconds are authoritative; the offset is accepted and
//! ignored.
//!
//! The three feeds fail independently. Callers treat any error from a
//! fetch as "feed unavailable" and degrade.

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

const WSF_VESSELLOCATIONS_URL: &str =
    "https://www.wsdot.wa.gov/ferries/api/vessels/rest/vessellocations";
const WSF_TERMINALSAILINGSPACE_URL: &str =
    "https://www.wsdot.wa.gov/ferries/api/terminals/rest/terminalsailingspace";
const WSF_SCHEDULE_BASE_URL: &str =
    "https://www.wsdot.wa.gov/ferries/api/schedule/rest/schedule";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
const RETRY_BACKOFF: Duration = Duration::from_millis(500);
const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Error)]
pub enum WsfError {
    #[error("WSF API access code is not configured")]
    MissingCredential,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Upstream returned HTTP {status}")]
    Http { status: u16 },
    #[error("Parse error: {0}")]
    Parse(String),
}

impl WsfError {
    /// Transient failures worth a second attempt: connection trouble,
    /// timeouts, and upstream 5xx. 4xx and parse errors are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            WsfError::Network(_) => true,
            WsfError::Http { status } => *status >= 500,
            WsfError::MissingCredential | WsfError::Parse(_) => false,
        }
    }
}

/// A vessel location record, normalised from the upstream shape.
#[derive(Debug, Clone)]
pub struct LiveVessel {
    pub vessel_id: i32,
    pub vessel_name: String,
    pub departing_terminal_id: Option<i32>,
    pub arriving_terminal_id: Option<i32>,
    pub at_dock: bool,
    pub left_dock: Option<DateTime<Utc>>,
    pub eta: Option<DateTime<Utc>>,
    pub scheduled_departure: Option<DateTime<Utc>>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Drive-on space advertised from one terminal, structurally as the
/// upstream reports it. Interpretation happens in the capacity deriver.
#[derive(Debug, Clone, Deserialize)]
pub struct TerminalSpace {
    #[serde(rename = "TerminalID")]
    pub terminal_id: i32,
    #[serde(rename = "DepartingSpaces", default)]
    pub departing_spaces: Vec<DepartingSpace>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepartingSpace {
    #[serde(rename = "Departure", deserialize_with = "dotnet_date::deserialize", default)]
    pub departure: Option<DateTime<Utc>>,
    #[serde(rename = "VesselID")]
    pub vessel_id: i32,
    #[serde(rename = "VesselName", default)]
    pub vessel_name: String,
    #[serde(rename = "SpaceForArrivalTerminals", default)]
    pub space_for_arrival_terminals: Vec<ArrivalSpace>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArrivalSpace {
    #[serde(rename = "TerminalID")]
    pub terminal_id: Option<i32>,
    #[serde(rename = "ArrivalTerminalIDs", default)]
    pub arrival_terminal_ids: Vec<i32>,
    /// May be absent upstream; never coerced to zero.
    #[serde(rename = "DriveUpSpaceCount")]
    pub drive_up_space_count: Option<i32>,
    #[serde(rename = "MaxSpaceCount")]
    pub max_space_count: Option<i32>,
}

/// One scheduled departure, flattened from the schedule payload's
/// nested `TerminalCombos[].Times[]` structure.
#[derive(Debug, Clone)]
pub struct ScheduleRow {
    pub route_id: i32,
    pub departing_terminal_id: i32,
    pub vessel_position_num: i32,
    pub vessel_id: i32,
    pub vessel_name: String,
}

// Raw upstream shapes, kept private to this module.

#[derive(Debug, Deserialize)]
struct VesselLocationDto {
    #[serde(rename = "VesselID")]
    vessel_id: i32,
    #[serde(rename = "VesselName", default)]
    vessel_name: String,
    #[serde(rename = "DepartingTerminalID")]
    departing_terminal_id: Option<i32>,
    #[serde(rename = "ArrivingTerminalID")]
    arriving_terminal_id: Option<i32>,
    #[serde(rename = "AtDock")]
    at_dock: bool,
    #[serde(rename = "LeftDock", deserialize_with = "dotnet_date::deserialize", default)]
    left_dock: Option<DateTime<Utc>>,
    #[serde(rename = "Eta", deserialize_with = "dotnet_date::deserialize", default)]
    eta: Option<DateTime<Utc>>,
    #[serde(
        rename = "ScheduledDeparture",
        deserialize_with = "dotnet_date::deserialize",
        default
    )]
    scheduled_departure: Option<DateTime<Utc>>,
    #[serde(rename = "TimeStamp", deserialize_with = "dotnet_date::deserialize", default)]
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ScheduleResponseDto {
    #[serde(rename = "TerminalCombos", default)]
    terminal_combos: Vec<TerminalComboDto>,
}

#[derive(Debug, Deserialize)]
struct TerminalComboDto {
    #[serde(rename = "DepartingTerminalID")]
    departing_terminal_id: i32,
    #[serde(rename = "Times", default)]
    times: Vec<ScheduleTimeDto>,
}

#[derive(Debug, Deserialize)]
struct ScheduleTimeDto {
    #[serde(rename = "VesselPositionNum")]
    vessel_position_num: Option<i32>,
    #[serde(rename = "VesselID")]
    vessel_id: Option<i32>,
    #[serde(rename = "VesselName")]
    vessel_name: Option<String>,
    #[serde(rename = "IsCancelled")]
    is_cancelled: Option<bool>,
}

/// Parse the upstream's `/Date(ms±zzzz)/` wrapper. The embedded epoch
/// milliseconds are the authoritative instant; the trailing offset only
/// describes the upstream's local rendering and is discarded.
pub fn parse_dotnet_date(raw: &str) -> Option<DateTime<Utc>> {
    let inner = raw.trim().strip_prefix("/Date(")?.strip_suffix(")/")?;
    let ms_text = match inner.find(['+', '-']) {
        Some(idx) => &inner[..idx],
        None => inner,
    };
    let ms: i64 = ms_text.parse().ok()?;
    Utc.timestamp_millis_opt(ms).single()
}

/// Serde adapter for optional `/Date(...)/` fields. Absent, null, and
/// malformed values all normalise to `None`.
pub mod dotnet_date {
    use super::parse_dotnet_date;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse_dotnet_date))
    }
}

/// HTTP client for the three WSF feeds.
pub struct WsfClient {
    client: Client,
    access_code: String,
}

impl WsfClient {
    /// Build a client from the process-wide access code. An absent or
    /// empty credential is a configuration error, surfaced once at
    /// start-up.
    pub fn new(access_code: &str) -> Result<Self, WsfError> {
        if access_code.trim().is_empty() {
            return Err(WsfError::MissingCredential);
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WsfError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            access_code: access_code.trim().to_string(),
        })
    }

    /// Fetch every vessel currently reporting a location.
    pub async fn fetch_vessels(&self) -> Result<Vec<LiveVessel>, WsfError> {
        let url = format!(
            "{}?apiaccesscode={}",
            WSF_VESSELLOCATIONS_URL,
            urlencoding::encode(&self.access_code)
        );
        let dtos: Vec<VesselLocationDto> = self.get_json("vessellocations", &url).await?;
        Ok(dtos
            .into_iter()
            .map(|dto| LiveVessel {
                vessel_id: dto.vessel_id,
                vessel_name: dto.vessel_name,
                departing_terminal_id: dto.departing_terminal_id,
                arriving_terminal_id: dto.arriving_terminal_id,
                at_dock: dto.at_dock,
                left_dock: dto.left_dock,
                eta: dto.eta,
                scheduled_departure: dto.scheduled_departure,
                timestamp: dto.timestamp,
            })
            .collect())
    }

    /// Fetch drive-on space for every terminal's imminent sailings.
    pub async fn fetch_terminal_spaces(&self) -> Result<Vec<TerminalSpace>, WsfError> {
        let url = format!(
            "{}?apiaccesscode={}",
            WSF_TERMINALSAILINGSPACE_URL,
            urlencoding::encode(&self.access_code)
        );
        self.get_json("terminalsailingspace", &url).await
    }

    /// Fetch the day's schedule for a route, flattened to rows.
    /// Cancelled sailings are dropped during flattening.
    pub async fn fetch_schedule(
        &self,
        route_id: i32,
        date_text: &str,
    ) -> Result<Vec<ScheduleRow>, WsfError> {
        let url = format!(
            "{}/{}/{}?apiaccesscode={}",
            WSF_SCHEDULE_BASE_URL,
            date_text,
            route_id,
            urlencoding::encode(&self.access_code)
        );
        let response: ScheduleResponseDto = self.get_json("schedule", &url).await?;
        Ok(flatten_schedule(route_id, response))
    }

    /// GET and decode a feed, retrying transient failures once after a
    /// fixed backoff.
    async fn get_json<T: DeserializeOwned>(&self, feed: &str, url: &str) -> Result<T, WsfError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.request_once(feed, url).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < MAX_ATTEMPTS && e.is_retryable() => {
                    warn!(feed, attempt, error = %e, "WSF request failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_once<T: DeserializeOwned>(
        &self,
        feed: &str,
        url: &str,
    ) -> Result<T, WsfError> {
        // The access code rides in the query string; log the feed name,
        // never the URL.
        let request_id = Uuid::new_v4();
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WsfError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                feed,
                request_id = %request_id,
                status = status.as_u16(),
                duration_ms = start.elapsed().as_millis() as u64,
                "WSF request failed"
            );
            return Err(WsfError::Http {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| WsfError::Network(e.to_string()))?;

        let parsed = serde_json::from_str(&body).map_err(|e| {
            warn!(
                feed,
                request_id = %request_id,
                error = %e,
                body_prefix = &body[..body.len().min(200)],
                "Failed to parse WSF response"
            );
            WsfError::Parse(e.to_string())
        })?;

        debug!(
            feed,
            request_id = %request_id,
            duration_ms = start.elapsed().as_millis() as u64,
            response_size = body.len(),
            "WSF request completed"
        );
        Ok(parsed)
    }
}

fn flatten_schedule(route_id: i32, response: ScheduleResponseDto) -> Vec<ScheduleRow> {
    let mut rows = Vec::new();
    for combo in response.terminal_combos {
        for time in combo.times {
            if time.is_cancelled.unwrap_or(false) {
                continue;
            }
            let (Some(position), Some(vessel_id)) = (time.vessel_position_num, time.vessel_id)
            else {
                continue;
            };
            rows.push(ScheduleRow {
                route_id,
                departing_terminal_id: combo.departing_terminal_id,
                vessel_position_num: position,
                vessel_id,
                vessel_name: time.vessel_name.unwrap_or_default(),
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_date_with_negative_offset() {
        let dt = parse_dotnet_date("/Date(1483263600000-0800)/").unwrap();
        assert_eq!(dt.timestamp_millis(), 1_483_263_600_000);
    }

    #[test]
    fn parses_date_with_positive_offset() {
        let dt = parse_dotnet_date("/Date(1483263600000+0100)/").unwrap();
        // Only the milliseconds are authoritative; the offset is ignored.
        assert_eq!(dt.timestamp_millis(), 1_483_263_600_000);
    }

    #[test]
    fn parses_date_without_offset() {
        let dt = parse_dotnet_date("/Date(1000)/").unwrap();
        assert_eq!(dt.timestamp_millis(), 1000);
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(parse_dotnet_date("2017-01-01T00:00:00Z").is_none());
        assert!(parse_dotnet_date("/Date()/").is_none());
        assert!(parse_dotnet_date("/Date(abc)/").is_none());
        assert!(parse_dotnet_date("").is_none());
    }

    #[test]
    fn vessel_location_deserializes() {
        let json = r#"{
            "VesselID": 36,
            "VesselName": "Tacoma",
            "DepartingTerminalID": 3,
            "ArrivingTerminalID": 7,
            "AtDock": false,
            "LeftDock": "/Date(1483263600000-0800)/",
            "Eta": "/Date(1483265700000-0800)/",
            "ScheduledDeparture": "/Date(1483263600000-0800)/",
            "TimeStamp": "/Date(1483264200000-0800)/"
        }"#;
        let dto: VesselLocationDto = serde_json::from_str(json).unwrap();
        assert_eq!(dto.vessel_id, 36);
        assert_eq!(dto.vessel_name, "Tacoma");
        assert!(!dto.at_dock);
        assert_eq!(dto.left_dock.unwrap().timestamp_millis(), 1_483_263_600_000);
        assert_eq!(dto.eta.unwrap().timestamp_millis(), 1_483_265_700_000);
    }

    #[test]
    fn vessel_location_tolerates_nulls() {
        let json = r#"{
            "VesselID": 17,
            "VesselName": "Issaquah",
            "DepartingTerminalID": 9,
            "ArrivingTerminalID": null,
            "AtDock": true,
            "LeftDock": null,
            "Eta": null,
            "ScheduledDeparture": null,
            "TimeStamp": "/Date(1483264200000-0800)/"
        }"#;
        let dto: VesselLocationDto = serde_json::from_str(json).unwrap();
        assert!(dto.at_dock);
        assert!(dto.arriving_terminal_id.is_none());
        assert!(dto.left_dock.is_none());
        assert!(dto.eta.is_none());
    }

    #[test]
    fn terminal_space_missing_drive_up_stays_none() {
        let json = r#"[{
            "TerminalID": 3,
            "DepartingSpaces": [{
                "Departure": "/Date(1483263600000-0800)/",
                "VesselID": 36,
                "VesselName": "Tacoma",
                "SpaceForArrivalTerminals": [
                    {"TerminalID": 7, "MaxSpaceCount": 202},
                    {"TerminalID": 7, "DriveUpSpaceCount": 34, "MaxSpaceCount": 202}
                ]
            }]
        }]"#;
        let spaces: Vec<TerminalSpace> = serde_json::from_str(json).unwrap();
        let arrivals = &spaces[0].departing_spaces[0].space_for_arrival_terminals;
        assert_eq!(arrivals[0].drive_up_space_count, None);
        assert_eq!(arrivals[1].drive_up_space_count, Some(34));
        assert_eq!(arrivals[1].max_space_count, Some(202));
    }

    #[test]
    fn schedule_flattens_terminal_combos() {
        let json = r#"{
            "TerminalCombos": [
                {
                    "DepartingTerminalID": 3,
                    "Times": [
                        {"VesselPositionNum": 1, "VesselID": 36, "VesselName": "Tacoma", "IsCancelled": false},
                        {"VesselPositionNum": 2, "VesselID": 25, "VesselName": "Chimacum", "IsCancelled": false}
                    ]
                },
                {
                    "DepartingTerminalID": 7,
                    "Times": [
                        {"VesselPositionNum": 1, "VesselID": 36, "VesselName": "Tacoma", "IsCancelled": false}
                    ]
                }
            ]
        }"#;
        let response: ScheduleResponseDto = serde_json::from_str(json).unwrap();
        let rows = flatten_schedule(5, response);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].route_id, 5);
        assert_eq!(rows[0].departing_terminal_id, 3);
        assert_eq!(rows[0].vessel_position_num, 1);
        assert_eq!(rows[1].vessel_name, "Chimacum");
        assert_eq!(rows[2].departing_terminal_id, 7);
    }

    #[test]
    fn schedule_drops_cancelled_and_incomplete_rows() {
        let json = r#"{
            "TerminalCombos": [{
                "DepartingTerminalID": 3,
                "Times": [
                    {"VesselPositionNum": 1, "VesselID": 36, "VesselName": "Tacoma", "IsCancelled": true},
                    {"VesselPositionNum": null, "VesselID": 25, "VesselName": "Chimacum"},
                    {"VesselPositionNum": 2, "VesselID": 25, "VesselName": "Chimacum", "IsCancelled": null}
                ]
            }]
        }"#;
        let response: ScheduleResponseDto = serde_json::from_str(json).unwrap();
        let rows = flatten_schedule(5, response);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].vessel_position_num, 2);
    }

    #[test]
    fn empty_access_code_is_a_configuration_error() {
        assert!(matches!(
            WsfClient::new("  "),
            Err(WsfError::MissingCredential)
        ));
    }

    #[test]
    fn retryable_classification() {
        assert!(WsfError::Network("connection reset".into()).is_retryable());
        assert!(WsfError::Http { status: 503 }.is_retryable());
        assert!(!WsfError::Http { status: 404 }.is_retryable());
        assert!(!WsfError::Parse("bad json".into()).is_retryable());
        assert!(!WsfError::MissingCredential.is_retryable());
    }
}
