//! Remote Docker Client (section 4.2): list/inspect/events, addressed by
//! host alias, dispatching to a local-socket or SSH-subprocess transport.

mod local;
mod ssh;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::hosts::Host;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum HostStatus {
    Connected,
    Timeout,
    Permission,
    Unreachable,
    Error,
    Unknown,
}

/// Classifies a transport failure by matching substrings in its message,
/// per section 4.2's failure classification table.
pub(crate) fn classify(message: &str) -> HostStatus {
    let lower = message.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        HostStatus::Timeout
    } else if lower.contains("permission") || lower.contains("auth") {
        HostStatus::Permission
    } else if lower.contains("connection refused") {
        HostStatus::Unreachable
    } else {
        HostStatus::Error
    }
}

/// An error from a docker-client operation, carrying the classification
/// used to update host status (section 3, "Host status").
#[derive(Debug, Clone)]
pub(crate) struct ClientError {
    pub(crate) status: HostStatus,
    pub(crate) message: String,
}

impl ClientError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: classify(&message),
            message,
        }
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ClientError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContainerState {
    Running,
    Stopped,
    Unknown,
}

/// The normalized container shape every transport must produce (section 9:
/// "Runtime type-checking of label / network / port fields" is fixed by
/// making this the only format-tolerant boundary in the crate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ContainerSummary {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) state: ContainerState,
    pub(crate) status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct ContainerDetail {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) image: Option<String>,
    pub(crate) state: ContainerState,
    pub(crate) created: Option<DateTime<Utc>>,
    pub(crate) labels: HashMap<String, String>,
    /// internal port -> external port, TCP bindings only.
    pub(crate) port_map: HashMap<u16, u16>,
}

impl Default for ContainerState {
    fn default() -> Self {
        ContainerState::Unknown
    }
}

#[derive(Debug, Clone)]
pub(crate) struct EventRecord {
    pub(crate) action: String,
    pub(crate) container_name: String,
}

/// Handle to a running event-stream subprocess/task; dropping it tears the
/// transport down (mirrors the teacher's `SpawnHandle` abort-on-drop).
pub(crate) struct EventHandle {
    _inner: Box<dyn Send + Sync>,
}

pub(crate) async fn list(host: &Host) -> Result<Vec<ContainerSummary>, ClientError> {
    if host.is_local {
        local::list().await
    } else {
        ssh::list(host).await
    }
}

pub(crate) async fn inspect(host: &Host, id: &str) -> Result<ContainerDetail, ClientError> {
    if host.is_local {
        local::inspect(id).await
    } else {
        ssh::inspect(host, id).await
    }
}

/// Spawns the event stream for this host and returns a handle; events are
/// sent, already filtered to container lifecycle actions, on `tx`.
pub(crate) fn spawn_events(host: &Host, tx: UnboundedSender<EventRecord>) -> EventHandle {
    if host.is_local {
        local::spawn_events(tx)
    } else {
        ssh::spawn_events(host, tx)
    }
}

pub(crate) const LIFECYCLE_ACTIONS: &[&str] =
    &["create", "start", "stop", "die", "destroy", "restart"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(classify("Connection timed out"), HostStatus::Timeout);
        assert_eq!(classify("Permission denied"), HostStatus::Permission);
        assert_eq!(classify("Connection refused"), HostStatus::Unreachable);
        assert_eq!(classify("something else broke"), HostStatus::Error);
    }
}
