use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Check that the path exists and is a file, matching the teacher's
/// `is_file` convention for path-shaped CLI arguments.
fn validate_existing_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("{value}: no such file"))
    }
}

fn validate_log_level(value: &str) -> Result<String, String> {
    match value {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_owned()),
        other => Err(format!(
            "{other}: must be one of trace, debug, info, warn, error"
        )),
    }
}

fn validate_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|e| e.to_string())
}

#[derive(Debug, Parser)]
#[command(name = "broker", version, about = "Multi-tenant pub/sub broker")]
pub struct Cli {
    /// TCP port to listen on, bound to localhost.
    #[arg(long)]
    pub port: u16,

    /// Forwarded to `tracing_subscriber::EnvFilter`; overridable by `RUST_LOG`.
    #[arg(long, default_value = "info", value_parser = validate_log_level)]
    pub log_level: String,

    /// How often the Dispatcher logs a status snapshot.
    #[arg(long, default_value = "60s", value_parser = validate_duration)]
    pub status_interval: Duration,

    /// Exact namespaces permitted to connect. Mutually exclusive with
    /// `--namespace-prefixes`; if neither is given, all namespaces are
    /// accepted.
    #[arg(long = "namespaces-allowed", value_name = "NAMESPACE", conflicts_with = "namespace_prefixes")]
    pub namespaces_allowed: Vec<String>,

    /// Namespace prefixes permitted to connect. Mutually exclusive with
    /// `--namespaces-allowed`.
    #[arg(long = "namespace-prefixes", value_name = "PREFIX")]
    pub namespace_prefixes: Vec<String>,

    /// PEM file containing the CA that issued client certificates.
    #[arg(long, value_parser = validate_existing_file)]
    pub ca_cert: PathBuf,

    /// PEM file containing this server's certificate chain.
    #[arg(long, value_parser = validate_existing_file)]
    pub server_cert: PathBuf,

    /// PEM file containing this server's private key.
    #[arg(long, value_parser = validate_existing_file)]
    pub server_key: PathBuf,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
