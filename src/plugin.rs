//! One plugin invocation: validate the request, fetch one reading, evaluate it.

use tracing::debug;

use crate::api::{ApiError, Dashboard, Window, CLIENTS_TIMESPAN};
use crate::checks::{evaluate, CheckKind, ConnectionStage, DeviceKind, MetricValue};
use crate::{Error, Resource};

/// Identifiers of the dashboard objects a check looks at. Which of them are needed depends on
/// the check.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Target {
    pub org_id: Option<u64>,
    pub network_id: Option<String>,
    pub serial: Option<String>,
    pub ssid: Option<u32>,
    pub port: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckRequest {
    pub device: DeviceKind,
    pub kind: CheckKind,
    pub target: Target,
}

impl CheckRequest {
    pub fn validate(&self) -> Result<(), Error> {
        if !self.device.supports(self.kind) {
            return Err(Error::UnsupportedDevice {
                device: self.device,
                kind: self.kind,
            });
        }

        let t = &self.target;
        let missing = |present: bool, argument: &'static str| {
            if present {
                Ok(())
            } else {
                Err(Error::MissingArgument {
                    kind: self.kind,
                    argument,
                })
            }
        };

        match self.kind {
            CheckKind::LicenseState => missing(t.org_id.is_some(), "--orgid"),
            CheckKind::PortEnabled | CheckKind::PoeEnabled => {
                missing(t.serial.is_some(), "--serial")?;
                missing(t.port.is_some(), "--port")
            }
            CheckKind::SsidEnabled => {
                missing(t.network_id.is_some(), "--networkid")?;
                missing(t.ssid.is_some(), "--ssid")
            }
            CheckKind::FailedConnections => missing(t.network_id.is_some(), "--networkid"),
            CheckKind::ClientCount => missing(t.serial.is_some(), "--serial"),
            CheckKind::UplinkStatus
            | CheckKind::Latency
            | CheckKind::ConnAssoc
            | CheckKind::ConnAuth
            | CheckKind::ConnDhcp
            | CheckKind::ConnDns
            | CheckKind::ConnSuccess => {
                missing(t.network_id.is_some(), "--networkid")?;
                missing(t.serial.is_some(), "--serial")
            }
        }
    }
}

/// Performs the single fetch a check needs and extracts the reading from the response.
pub fn collect<D>(dashboard: &D, kind: CheckKind, target: &Target) -> Result<MetricValue, Error>
where
    D: Dashboard + ?Sized,
{
    let network_id = || required(kind, target.network_id.as_deref(), "--networkid");
    let serial = || required(kind, target.serial.as_deref(), "--serial");
    let connections = |stage: ConnectionStage| -> Result<MetricValue, Error> {
        let stats = dashboard.connection_stats(network_id()?, serial()?, Window::last_hour())?;
        Ok(MetricValue::Count(stats.connection_stats.stage(stage)))
    };

    let value = match kind {
        CheckKind::LicenseState => {
            let org_id = required(kind, target.org_id, "--orgid")?;
            let license = dashboard.license_state(org_id)?;
            MetricValue::License {
                status: license.status,
                expiration: license.expiration_date,
            }
        }
        CheckKind::UplinkStatus => {
            let (network_id, serial) = (network_id()?, serial()?);
            let uplink = dashboard
                .device_uplinks(network_id, serial)?
                .into_iter()
                .next()
                .ok_or_else(|| ApiError::Empty {
                    path: format!("/networks/{}/devices/{}/uplink", network_id, serial),
                })?;
            MetricValue::Uplink {
                status: uplink.status,
                public_ip: uplink.public_ip.unwrap_or_else(|| "None".to_owned()),
            }
        }
        CheckKind::PortEnabled | CheckKind::PoeEnabled => {
            let port = required(kind, target.port, "--port")?;
            let switch_port = dashboard.switch_port(serial()?, port)?;
            if kind == CheckKind::PoeEnabled {
                MetricValue::Enabled(switch_port.poe_enabled)
            } else {
                MetricValue::Enabled(switch_port.enabled)
            }
        }
        CheckKind::SsidEnabled => {
            let number = required(kind, target.ssid, "--ssid")?;
            let ssid = dashboard.ssid(network_id()?, number)?;
            MetricValue::Ssid {
                name: ssid.name,
                enabled: ssid.enabled,
            }
        }
        CheckKind::Latency => {
            let stats = dashboard.latency_stats(network_id()?, serial()?, Window::last_hour())?;
            MetricValue::Latency(stats.latency_stats.best_effort_traffic.avg)
        }
        CheckKind::FailedConnections => MetricValue::FailedConnections(
            dashboard.failed_connections(network_id()?, Window::last_hour())?,
        ),
        CheckKind::ClientCount => {
            MetricValue::Clients(dashboard.clients(serial()?, CLIENTS_TIMESPAN)?)
        }
        CheckKind::ConnAssoc => connections(ConnectionStage::Assoc)?,
        CheckKind::ConnAuth => connections(ConnectionStage::Auth)?,
        CheckKind::ConnDhcp => connections(ConnectionStage::Dhcp)?,
        CheckKind::ConnDns => connections(ConnectionStage::Dns)?,
        CheckKind::ConnSuccess => connections(ConnectionStage::Success)?,
    };

    debug!(%kind, ?value, "collected reading");
    Ok(value)
}

fn required<T>(kind: CheckKind, value: Option<T>, argument: &'static str) -> Result<T, Error> {
    value.ok_or(Error::MissingArgument { kind, argument })
}

/// Validates the request, collects the reading and evaluates it.
pub fn run_check<D>(dashboard: &D, request: &CheckRequest) -> Result<Resource, Error>
where
    D: Dashboard + ?Sized,
{
    request.validate()?;
    let value = collect(dashboard, request.kind, &request.target)?;
    Ok(evaluate(request.kind, &value)?)
}
