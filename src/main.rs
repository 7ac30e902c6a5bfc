use std::error::Error as StdError;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use meraki_check::api::DashboardClient;
use meraki_check::checks::{CheckKind, DeviceKind};
use meraki_check::config::{ApiConfig, DEFAULT_BASE_URL};
use meraki_check::config_generator::print_icinga_command_config_if_env_and_exit;
use meraki_check::plugin::{run_check, CheckRequest, Target};
use meraki_check::{Error, Resource, Runner, ServiceState};

/// Information from the Meraki Dashboard API for nagios based monitoring systems.
///
/// license:   -t license -o <organization id>
/// uplink:    -t uplink -n <network id> -s <serial>
/// port, poe: -t port|poe -s <serial> -p <port>            (switch)
/// latency:   -t latency -n <network id> -s <serial>        (ap)
/// ssid:      -t ssid -n <network id> -w <ssid number>      (ap)
/// failconn:  -t failconn -n <network id>                   (ap)
/// conn*:     -t connassoc|connauth|conndhcp|conndns|connsucc -n <network id> -s <serial> (ap)
/// clients:   -t clients -s <serial>                        (ap)
#[derive(Parser, Debug)]
#[command(name = "check_meraki", version, verbatim_doc_comment)]
struct Cli {
    /// API key obtained from a Meraki Dashboard admin account
    #[arg(short = 'k', long, env = "MERAKI_API_KEY", hide_env_values = true)]
    api_key: String,
    /// Device type to be queried
    #[arg(short, long, value_enum)]
    device: DeviceKind,
    /// Check to run
    #[arg(short = 't', long = "type", value_enum)]
    kind: CheckKind,
    /// Organization ID
    #[arg(short, long)]
    orgid: Option<u64>,
    /// Network ID
    #[arg(short, long)]
    networkid: Option<String>,
    /// Device serial number, e.g. Q2XX-1234-ABCD
    #[arg(short, long)]
    serial: Option<String>,
    /// SSID number, e.g. 0
    #[arg(short = 'w', long)]
    ssid: Option<u32>,
    /// Switch port number
    #[arg(short, long)]
    port: Option<u32>,
    /// Dashboard API endpoint
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
    /// Request timeout in seconds
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,
    /// Log to stderr, repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn request(&self) -> CheckRequest {
        CheckRequest {
            device: self.device,
            kind: self.kind,
            target: Target {
                org_id: self.orgid,
                network_id: self.networkid.clone(),
                serial: self.serial.clone(),
                ssid: self.ssid,
                port: self.port,
            },
        }
    }

    fn api_config(&self) -> ApiConfig {
        ApiConfig::new(self.api_key.clone())
            .with_base_url(&self.base_url)
            .with_timeout(Duration::from_secs(self.timeout))
    }
}

fn main() {
    if let Err(err) = print_icinga_command_config_if_env_and_exit("meraki", &Cli::command()) {
        println!("{}: {}", ServiceState::Unknown, err);
        std::process::exit(ServiceState::Unknown.exit_code());
    }

    let cli = parse_cli();
    init_tracing(cli.verbose);

    Runner::new()
        .on_error(|err: &Error| {
            error!(error = %error_chain(err), "check failed");
            err.service_state()
        })
        .safe_run(|| run(&cli))
        .print_and_exit()
}

fn run(cli: &Cli) -> Result<Resource, Error> {
    let config = cli.api_config();
    config.validate()?;

    let request = cli.request();
    debug!(?config, ?request, "running check");

    let dashboard = DashboardClient::new(&config)?;
    run_check(&dashboard, &request)
}

/// Usage errors are reported as UNKNOWN instead of clap's default exit code.
fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.use_stderr() => {
            let _ = err.print();
            println!("{}: invalid command line arguments", ServiceState::Unknown);
            std::process::exit(ServiceState::Unknown.exit_code());
        }
        Err(err) => err.exit(),
    }
}

fn init_tracing(verbose: u8) {
    let default = if verbose == 0 { "warn" } else { "debug" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // stdout belongs to the plugin output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn error_chain(err: &dyn StdError) -> String {
    let mut s = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        s.push_str(": ");
        s.push_str(&cause.to_string());
        source = cause.source();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    use meraki_check::api::ApiError;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_short_flags() {
        let cli = Cli::try_parse_from([
            "check_meraki", "-k", "key", "-d", "switch", "-t", "poe", "-s", "Q2SW-0001", "-p", "7",
        ])
        .unwrap();

        assert_eq!(cli.kind, CheckKind::PoeEnabled);
        assert_eq!(
            cli.request(),
            CheckRequest {
                device: DeviceKind::Switch,
                kind: CheckKind::PoeEnabled,
                target: Target {
                    serial: Some("Q2SW-0001".to_owned()),
                    port: Some(7),
                    ..Target::default()
                },
            }
        );
        assert_eq!(cli.api_config().base_url, DEFAULT_BASE_URL);
        assert_eq!(cli.api_config().timeout, Duration::from_secs(10));
    }

    #[test]
    fn parses_every_check_type() {
        let types = [
            ("license", CheckKind::LicenseState),
            ("uplink", CheckKind::UplinkStatus),
            ("port", CheckKind::PortEnabled),
            ("poe", CheckKind::PoeEnabled),
            ("latency", CheckKind::Latency),
            ("ssid", CheckKind::SsidEnabled),
            ("failconn", CheckKind::FailedConnections),
            ("connassoc", CheckKind::ConnAssoc),
            ("connauth", CheckKind::ConnAuth),
            ("conndhcp", CheckKind::ConnDhcp),
            ("conndns", CheckKind::ConnDns),
            ("connsucc", CheckKind::ConnSuccess),
            ("clients", CheckKind::ClientCount),
        ];

        for (name, kind) in types {
            let cli = Cli::try_parse_from([
                "check_meraki",
                "--api-key",
                "key",
                "--device",
                "ap",
                "--type",
                name,
            ])
            .unwrap();
            assert_eq!(cli.kind, kind);
            assert_eq!(kind.as_str(), name);
        }
    }

    #[test]
    fn rejects_unknown_type_and_zero_timeout() {
        let base = ["check_meraki", "-k", "key", "-d", "ap"];

        let args = base.iter().copied().chain(["-t", "bandwidth"]);
        assert!(Cli::try_parse_from(args).is_err());

        let args = base
            .iter()
            .copied()
            .chain(["-t", "clients", "--timeout", "0"]);
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn verbose_flag_counts() {
        let base = ["check_meraki", "-k", "key", "-d", "ap", "-t", "clients"];

        assert_eq!(Cli::try_parse_from(base).unwrap().verbose, 0);
        let args = base.iter().copied().chain(["-v"]);
        assert_eq!(Cli::try_parse_from(args).unwrap().verbose, 1);
    }

    #[test]
    fn error_chain_includes_causes() {
        let err = Error::from(ApiError::Empty {
            path: "/networks/N_1/devices/Q2XX/uplink".to_owned(),
        });

        assert_eq!(
            error_chain(&err),
            "Unable to connect to Meraki Dashboard API.: /networks/N_1/devices/Q2XX/uplink returned no entries"
        );
    }
}
