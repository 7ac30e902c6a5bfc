use thiserror::Error;

use crate::api::ApiError;
use crate::checks::{CheckError, CheckKind, DeviceKind};
use crate::config::ConfigError;
use crate::ServiceState;

#[derive(Debug, Error)]
pub enum Error {
    /// The detailed cause is only logged, the plugin output stays fixed.
    #[error("Unable to connect to Meraki Dashboard API.")]
    Api(#[from] ApiError),
    #[error(transparent)]
    Check(#[from] CheckError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("check `{kind}` requires {argument}")]
    MissingArgument {
        kind: CheckKind,
        argument: &'static str,
    },
    #[error("check `{kind}` is not available for device type `{device}`")]
    UnsupportedDevice { device: DeviceKind, kind: CheckKind },
}

impl Error {
    pub fn service_state(&self) -> ServiceState {
        match self {
            Error::Check(err) => err.service_state(),
            Error::Api(_)
            | Error::Config(_)
            | Error::MissingArgument { .. }
            | Error::UnsupportedDevice { .. } => ServiceState::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_failures_are_unknown_with_fixed_message() {
        let err = Error::from(ApiError::Empty {
            path: "/networks/N_1/devices/Q2XX/uplink".to_owned(),
        });
        assert_eq!(err.service_state(), ServiceState::Unknown);
        assert_eq!(err.to_string(), "Unable to connect to Meraki Dashboard API.");
    }

    #[test]
    fn check_errors_keep_their_state() {
        let err = Error::from(CheckError::UnconfiguredSsid {
            name: "Unconfigured SSID 4".to_owned(),
        });
        assert_eq!(err.service_state(), ServiceState::Warning);
        assert_eq!(
            err.to_string(),
            "Invalid integer. SSID referenced is unconfigured."
        );
    }

    #[test]
    fn usage_errors_are_unknown() {
        let err = Error::MissingArgument {
            kind: CheckKind::PortEnabled,
            argument: "--port",
        };
        assert_eq!(err.service_state().exit_code(), 3);
        assert_eq!(err.to_string(), "check `port` requires --port");

        let err = Error::UnsupportedDevice {
            device: DeviceKind::Switch,
            kind: CheckKind::Latency,
        };
        assert_eq!(
            err.to_string(),
            "check `latency` is not available for device type `switch`"
        );
    }
}
