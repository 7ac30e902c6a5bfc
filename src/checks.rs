//! Evaluation of dashboard readings into check results.
//!
//! Every check is a pure function of the reading handed to [`evaluate`]; fetching the reading is
//! left to [`crate::plugin::collect`].

use std::fmt;

use serde::Deserialize;

use crate::{Metric, Resource, ServiceState, Thresholds, TriggerIfValue};

/// Average best-effort latency in milliseconds.
pub const LATENCY_MS: Thresholds<f64> =
    Thresholds::new(Some(128.0), Some(512.0), TriggerIfValue::AtOrAbove);
pub const ASSOCIATIONS: Thresholds<u64> =
    Thresholds::new(Some(5), Some(10), TriggerIfValue::AtOrAbove);
pub const AUTHENTICATIONS: Thresholds<u64> =
    Thresholds::new(Some(10), Some(20), TriggerIfValue::AtOrAbove);
pub const DHCP_REQUESTS: Thresholds<u64> =
    Thresholds::new(Some(10), Some(20), TriggerIfValue::AtOrAbove);
pub const DNS_QUERIES: Thresholds<u64> =
    Thresholds::new(Some(10), Some(20), TriggerIfValue::AtOrAbove);
/// No successful connection at all is critical, there is no warning tier.
pub const SUCCESSFUL_CONNECTIONS: Thresholds<u64> =
    Thresholds::new(None, Some(0), TriggerIfValue::AtOrBelow);
pub const FAILED_CONNECTIONS: Thresholds<usize> =
    Thresholds::new(Some(10), Some(20), TriggerIfValue::AtOrAbove);
/// Fewer than five connected clients is treated as degraded.
pub const CONNECTED_CLIENTS: Thresholds<usize> =
    Thresholds::new(None, Some(5), TriggerIfValue::Below);

// Values advertised in the performance data, kept for compatibility with existing graphs.
const FAILED_CONNECTIONS_REPORTED: (usize, usize) = (15, 25);
const CONNECTED_CLIENTS_REPORTED: (usize, usize) = (10, 0);

const LICENSE_OK: &str = "OK";
const UPLINK_ACTIVE: &str = "Active";
const UNCONFIGURED_SSID_PREFIX: &str = "Unconfigured";

/// The check selected for one invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum CheckKind {
    #[cfg_attr(feature = "cli", value(name = "license"))]
    LicenseState,
    #[cfg_attr(feature = "cli", value(name = "uplink"))]
    UplinkStatus,
    #[cfg_attr(feature = "cli", value(name = "port"))]
    PortEnabled,
    #[cfg_attr(feature = "cli", value(name = "poe"))]
    PoeEnabled,
    #[cfg_attr(feature = "cli", value(name = "latency"))]
    Latency,
    #[cfg_attr(feature = "cli", value(name = "ssid"))]
    SsidEnabled,
    #[cfg_attr(feature = "cli", value(name = "failconn"))]
    FailedConnections,
    #[cfg_attr(feature = "cli", value(name = "connassoc"))]
    ConnAssoc,
    #[cfg_attr(feature = "cli", value(name = "connauth"))]
    ConnAuth,
    #[cfg_attr(feature = "cli", value(name = "conndhcp"))]
    ConnDhcp,
    #[cfg_attr(feature = "cli", value(name = "conndns"))]
    ConnDns,
    #[cfg_attr(feature = "cli", value(name = "connsucc"))]
    ConnSuccess,
    #[cfg_attr(feature = "cli", value(name = "clients"))]
    ClientCount,
}

impl CheckKind {
    /// The name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::LicenseState => "license",
            CheckKind::UplinkStatus => "uplink",
            CheckKind::PortEnabled => "port",
            CheckKind::PoeEnabled => "poe",
            CheckKind::Latency => "latency",
            CheckKind::SsidEnabled => "ssid",
            CheckKind::FailedConnections => "failconn",
            CheckKind::ConnAssoc => "connassoc",
            CheckKind::ConnAuth => "connauth",
            CheckKind::ConnDhcp => "conndhcp",
            CheckKind::ConnDns => "conndns",
            CheckKind::ConnSuccess => "connsucc",
            CheckKind::ClientCount => "clients",
        }
    }

    /// The connection stage read by the `conn*` checks.
    pub fn connection_stage(&self) -> Option<ConnectionStage> {
        match self {
            CheckKind::ConnAssoc => Some(ConnectionStage::Assoc),
            CheckKind::ConnAuth => Some(ConnectionStage::Auth),
            CheckKind::ConnDhcp => Some(ConnectionStage::Dhcp),
            CheckKind::ConnDns => Some(ConnectionStage::Dns),
            CheckKind::ConnSuccess => Some(ConnectionStage::Success),
            _ => None,
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of device a check is run against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum DeviceKind {
    Switch,
    Ap,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Switch => "switch",
            DeviceKind::Ap => "ap",
        }
    }

    /// Port checks only exist on switches, wireless statistics only on access points.
    pub fn supports(&self, kind: CheckKind) -> bool {
        match kind {
            CheckKind::LicenseState | CheckKind::UplinkStatus => true,
            CheckKind::PortEnabled | CheckKind::PoeEnabled => *self == DeviceKind::Switch,
            _ => *self == DeviceKind::Ap,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stage of the wireless connection funnel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStage {
    Assoc,
    Auth,
    Dhcp,
    Dns,
    Success,
}

impl ConnectionStage {
    fn label(&self) -> &'static str {
        match self {
            ConnectionStage::Assoc => "Associations",
            ConnectionStage::Auth => "Authentications",
            ConnectionStage::Dhcp => "DHCP Requests",
            ConnectionStage::Dns => "DNS Queries",
            ConnectionStage::Success => "Successful connections",
        }
    }

    fn perf_key(&self) -> &'static str {
        match self {
            ConnectionStage::Assoc => "conn_assoc",
            ConnectionStage::Auth => "conn_auth",
            ConnectionStage::Dhcp => "conn_dhcp",
            ConnectionStage::Dns => "conn_dns",
            ConnectionStage::Success => "conn_succ",
        }
    }

    pub fn thresholds(&self) -> Thresholds<u64> {
        match self {
            ConnectionStage::Assoc => ASSOCIATIONS,
            ConnectionStage::Auth => AUTHENTICATIONS,
            ConnectionStage::Dhcp => DHCP_REQUESTS,
            ConnectionStage::Dns => DNS_QUERIES,
            ConnectionStage::Success => SUCCESSFUL_CONNECTIONS,
        }
    }
}

/// A wireless client that failed to join the network.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedConnection {
    pub client_mac: String,
    pub failure_step: String,
}

/// A client seen on a device. The dashboard leaves description and ip empty for some clients.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ClientRecord {
    pub description: Option<String>,
    pub ip: Option<String>,
    pub mac: String,
}

/// The reading a check is evaluated against.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricValue {
    Enabled(bool),
    License { status: String, expiration: String },
    Uplink { status: String, public_ip: String },
    Ssid { name: String, enabled: bool },
    Latency(f64),
    Count(u64),
    FailedConnections(Vec<FailedConnection>),
    Clients(Vec<ClientRecord>),
}

impl MetricValue {
    fn variant_name(&self) -> &'static str {
        match self {
            MetricValue::Enabled(_) => "enabled",
            MetricValue::License { .. } => "license",
            MetricValue::Uplink { .. } => "uplink",
            MetricValue::Ssid { .. } => "ssid",
            MetricValue::Latency(_) => "latency",
            MetricValue::Count(_) => "count",
            MetricValue::FailedConnections(_) => "failed connection",
            MetricValue::Clients(_) => "client",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("Invalid integer. SSID referenced is unconfigured.")]
    UnconfiguredSsid { name: String },
    #[error("check `{kind}` cannot evaluate a {found} reading")]
    UnexpectedValue {
        kind: CheckKind,
        found: &'static str,
    },
}

impl CheckError {
    /// An unconfigured SSID is a caller mistake reported as WARNING, independent of any tier.
    pub fn service_state(&self) -> ServiceState {
        match self {
            CheckError::UnconfiguredSsid { .. } => ServiceState::Warning,
            CheckError::UnexpectedValue { .. } => ServiceState::Unknown,
        }
    }
}

/// Evaluates one reading for the given check.
pub fn evaluate(kind: CheckKind, value: &MetricValue) -> Result<Resource, CheckError> {
    let resource = match (kind, value) {
        (CheckKind::LicenseState, MetricValue::License { status, expiration }) => {
            license_state(status, expiration)
        }
        (CheckKind::UplinkStatus, MetricValue::Uplink { status, public_ip }) => {
            uplink_status(status, public_ip)
        }
        (CheckKind::PortEnabled, MetricValue::Enabled(enabled)) => switched("Port", *enabled),
        (CheckKind::PoeEnabled, MetricValue::Enabled(enabled)) => switched("PoE", *enabled),
        (CheckKind::SsidEnabled, MetricValue::Ssid { name, enabled }) => {
            ssid_status(name, *enabled)?
        }
        (CheckKind::Latency, MetricValue::Latency(avg)) => latency(*avg),
        (CheckKind::FailedConnections, MetricValue::FailedConnections(failures)) => {
            failed_connections(failures)
        }
        (CheckKind::ClientCount, MetricValue::Clients(clients)) => connected_clients(clients),
        (_, MetricValue::Count(count)) => match kind.connection_stage() {
            Some(stage) => connection_stage(stage, *count),
            None => return Err(unexpected(kind, value)),
        },
        _ => return Err(unexpected(kind, value)),
    };

    Ok(resource)
}

fn unexpected(kind: CheckKind, value: &MetricValue) -> CheckError {
    CheckError::UnexpectedValue {
        kind,
        found: value.variant_name(),
    }
}

fn license_state(status: &str, expiration: &str) -> Resource {
    let state = if status == LICENSE_OK {
        ServiceState::Ok
    } else {
        ServiceState::Critical
    };

    Resource::new().with_state(state).with_description(format!(
        "License status is {}. Expiration Date: {}",
        status, expiration
    ))
}

fn uplink_status(status: &str, public_ip: &str) -> Resource {
    let state = if status == UPLINK_ACTIVE {
        ServiceState::Ok
    } else {
        ServiceState::Critical
    };

    Resource::new().with_state(state).with_description(format!(
        "Uplink status is {}. Public IP: {}",
        status, public_ip
    ))
}

// booleans have no warning tier
fn switched(subject: &str, enabled: bool) -> Resource {
    let (state, word) = if enabled {
        (ServiceState::Ok, "enabled")
    } else {
        (ServiceState::Critical, "disabled")
    };

    Resource::new()
        .with_state(state)
        .with_description(format!("{} is {}", subject, word))
}

fn ssid_status(name: &str, enabled: bool) -> Result<Resource, CheckError> {
    if name.starts_with(UNCONFIGURED_SSID_PREFIX) {
        return Err(CheckError::UnconfiguredSsid {
            name: name.to_owned(),
        });
    }

    let resource = if enabled {
        Resource::new()
            .with_state(ServiceState::Ok)
            .with_description(format!("{} is enabled and active.", name))
    } else {
        Resource::new()
            .with_state(ServiceState::Critical)
            .with_description(format!(
                "{} is not enabled and active. Please login to Meraki Dashboard to check.",
                name
            ))
    };

    Ok(resource)
}

// Whole-number averages print without a fraction, `128 ms` and `latency_stat=128`.
fn latency(avg: f64) -> Resource {
    Resource::new()
        .with_description(format!("Average latency for AP is: {} ms", avg))
        .with_state_label()
        .with_result(Metric::new("latency_stat", avg).with_thresholds(LATENCY_MS))
}

fn connection_stage(stage: ConnectionStage, count: u64) -> Resource {
    Resource::new()
        .with_description(format!("{} in the past hour: {}", stage.label(), count))
        .with_state_label()
        .with_result(Metric::new(stage.perf_key(), count).with_thresholds(stage.thresholds()))
}

fn failed_connections(failures: &[FailedConnection]) -> Resource {
    let (warning, critical) = FAILED_CONNECTIONS_REPORTED;

    Resource::new()
        .with_description(format!(
            "Number of failed connections in the past hour: {}",
            failures.len()
        ))
        .with_details(failures.iter().map(|failure| {
            format!(
                "Client {} failed to connect (step: {})",
                failure.client_mac, failure.failure_step
            )
        }))
        .with_result(
            Metric::new("fail_conn", failures.len())
                .with_thresholds(FAILED_CONNECTIONS)
                .with_reported_thresholds(Some(warning), Some(critical)),
        )
}

fn connected_clients(clients: &[ClientRecord]) -> Resource {
    let (warning, critical) = CONNECTED_CLIENTS_REPORTED;

    Resource::new()
        .with_description(format!("Number of clients connected: {}", clients.len()))
        .with_details(clients.iter().map(|client| {
            format!(
                "Client: {} (IP: {}, Mac Address: {})",
                client.description.as_deref().unwrap_or("None"),
                client.ip.as_deref().unwrap_or("None"),
                client.mac
            )
        }))
        .with_result(
            Metric::new("num_clients", clients.len())
                .with_thresholds(CONNECTED_CLIENTS)
                .with_reported_thresholds(Some(warning), Some(critical)),
        )
}
