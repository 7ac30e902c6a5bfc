//! Blocking client for the handful of Meraki Dashboard endpoints the checks read.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::checks::{ClientRecord, ConnectionStage, FailedConnection};
use crate::config::ApiConfig;

const API_KEY_HEADER: &str = "X-Cisco-Meraki-API-Key";

/// Lookback of the latency, connection and failed connection statistics.
pub const STATS_LOOKBACK: Duration = Duration::from_secs(3600);
/// Lookback of the connected clients listing.
pub const CLIENTS_TIMESPAN: Duration = Duration::from_secs(360);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API key is not a valid header value")]
    InvalidApiKey(#[from] reqwest::header::InvalidHeaderValue),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response body from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} returned no entries")]
    Empty { path: String },
}

/// A `t0`/`t1` pair in epoch seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub t0: u64,
    pub t1: u64,
}

impl Window {
    pub fn ending_at(end: SystemTime, span: Duration) -> Self {
        let t1 = end
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Window {
            t0: t1.saturating_sub(span.as_secs()),
            t1,
        }
    }

    pub fn last_hour() -> Self {
        Window::ending_at(SystemTime::now(), STATS_LOOKBACK)
    }

    fn query(&self) -> [(&'static str, String); 2] {
        [("t0", self.t0.to_string()), ("t1", self.t1.to_string())]
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseState {
    pub status: String,
    pub expiration_date: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Uplink {
    pub status: String,
    pub public_ip: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchPort {
    pub enabled: bool,
    pub poe_enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Ssid {
    pub name: String,
    pub enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyStats {
    pub latency_stats: TrafficLatency,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficLatency {
    pub best_effort_traffic: LatencyAggregate,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct LatencyAggregate {
    pub avg: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    pub connection_stats: ConnectionCounts,
}

/// Stages without events are left out of the response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionCounts {
    pub assoc: u64,
    pub auth: u64,
    pub dhcp: u64,
    pub dns: u64,
    pub success: u64,
}

impl ConnectionCounts {
    pub fn stage(&self, stage: ConnectionStage) -> u64 {
        match stage {
            ConnectionStage::Assoc => self.assoc,
            ConnectionStage::Auth => self.auth,
            ConnectionStage::Dhcp => self.dhcp,
            ConnectionStage::Dns => self.dns,
            ConnectionStage::Success => self.success,
        }
    }
}

/// The dashboard endpoints the checks depend on.
pub trait Dashboard {
    fn license_state(&self, org_id: u64) -> Result<LicenseState, ApiError>;
    fn device_uplinks(&self, network_id: &str, serial: &str) -> Result<Vec<Uplink>, ApiError>;
    fn switch_port(&self, serial: &str, port: u32) -> Result<SwitchPort, ApiError>;
    fn ssid(&self, network_id: &str, number: u32) -> Result<Ssid, ApiError>;
    fn latency_stats(
        &self,
        network_id: &str,
        serial: &str,
        window: Window,
    ) -> Result<LatencyStats, ApiError>;
    fn connection_stats(
        &self,
        network_id: &str,
        serial: &str,
        window: Window,
    ) -> Result<ConnectionStats, ApiError>;
    fn failed_connections(
        &self,
        network_id: &str,
        window: Window,
    ) -> Result<Vec<FailedConnection>, ApiError>;
    fn clients(&self, serial: &str, timespan: Duration) -> Result<Vec<ClientRecord>, ApiError>;
}

pub struct DashboardClient {
    http: Client,
    base_url: String,
}

impl DashboardClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut api_key = HeaderValue::from_str(&config.api_key)?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::Client)?;

        Ok(DashboardClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        let url = self.endpoint(path);
        let transport = |source: reqwest::Error| ApiError::Transport {
            path: path.to_owned(),
            source,
        };

        debug!(%url, ?query, "requesting dashboard endpoint");
        let mut request = self.http.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().map_err(transport)?;
        debug!(status = %response.status(), "dashboard responded");

        let body = response
            .error_for_status()
            .map_err(transport)?
            .text()
            .map_err(transport)?;

        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            path: path.to_owned(),
            source,
        })
    }
}

impl Dashboard for DashboardClient {
    fn license_state(&self, org_id: u64) -> Result<LicenseState, ApiError> {
        self.get(&format!("/organizations/{}/licenseState", org_id), &[])
    }

    fn device_uplinks(&self, network_id: &str, serial: &str) -> Result<Vec<Uplink>, ApiError> {
        self.get(
            &format!("/networks/{}/devices/{}/uplink", network_id, serial),
            &[],
        )
    }

    fn switch_port(&self, serial: &str, port: u32) -> Result<SwitchPort, ApiError> {
        self.get(&format!("/devices/{}/switchPorts/{}", serial, port), &[])
    }

    fn ssid(&self, network_id: &str, number: u32) -> Result<Ssid, ApiError> {
        self.get(&format!("/networks/{}/ssids/{}", network_id, number), &[])
    }

    fn latency_stats(
        &self,
        network_id: &str,
        serial: &str,
        window: Window,
    ) -> Result<LatencyStats, ApiError> {
        let [t0, t1] = window.query();
        self.get(
            &format!("/networks/{}/devices/{}/latencyStats", network_id, serial),
            &[t0, t1, ("fields", "avg".to_owned())],
        )
    }

    fn connection_stats(
        &self,
        network_id: &str,
        serial: &str,
        window: Window,
    ) -> Result<ConnectionStats, ApiError> {
        self.get(
            &format!("/networks/{}/devices/{}/connectionStats", network_id, serial),
            &window.query(),
        )
    }

    fn failed_connections(
        &self,
        network_id: &str,
        window: Window,
    ) -> Result<Vec<FailedConnection>, ApiError> {
        self.get(
            &format!("/networks/{}/failedConnections", network_id),
            &window.query(),
        )
    }

    fn clients(&self, serial: &str, timespan: Duration) -> Result<Vec<ClientRecord>, ApiError> {
        self.get(
            &format!("/devices/{}/clients", serial),
            &[("timespan", timespan.as_secs().to_string())],
        )
    }
}
