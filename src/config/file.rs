use std::path::PathBuf;

use serde::Deserialize;

use crate::api::ApiConfig;

fn default_check_interval() -> u64 {
    60
}

fn default_timeout() -> u64 {
    5
}

fn default_degraded_threshold() -> u64 {
    3000
}

fn default_failure_threshold() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(super) struct HealthCheckConfig {
    #[serde(default = "default_check_interval")]
    pub(super) check_interval_secs: u64,
    #[serde(default = "default_timeout")]
    pub(super) timeout_secs: u64,
    #[serde(default = "default_degraded_threshold")]
    pub(super) degraded_threshold_ms: u64,
    #[serde(default = "default_failure_threshold")]
    pub(super) failure_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            timeout_secs: default_timeout(),
            degraded_threshold_ms: default_degraded_threshold(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(super) struct LogConfig {
    #[serde(default = "default_log_level")]
    pub(super) level: String,
    #[serde(default)]
    pub(super) json: bool,
    #[serde(default)]
    pub(super) directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: None,
        }
    }
}

/// Consumed only by the DNS pre-flight collaborator (section 1's
/// Non-goals); the core never reads these fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub(super) struct DnsPreflightConfig {
    #[serde(default)]
    pub(super) enabled: bool,
    #[serde(default)]
    pub(super) strict: bool,
}

fn default_hosts_file() -> PathBuf {
    PathBuf::from("hosts.yaml")
}

fn default_static_routes_file() -> PathBuf {
    PathBuf::from("static-routes.yaml")
}

fn default_api() -> ApiConfig {
    ApiConfig {
        address: "127.0.0.1:8080".parse().unwrap(),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ConfigFile {
    #[serde(default = "default_hosts_file")]
    pub(super) hosts_file: PathBuf,

    #[serde(default = "default_static_routes_file")]
    pub(super) static_routes_file: PathBuf,

    #[serde(default = "default_api")]
    pub(super) api: ApiConfig,

    #[serde(default)]
    pub(super) health_check: HealthCheckConfig,

    #[serde(default)]
    pub(super) log: LogConfig,

    #[serde(default)]
    pub(super) dns_preflight: DnsPreflightConfig,
}
