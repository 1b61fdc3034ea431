//! Diagnostics (section 4.10): read-only aggregator of host status,
//! excluded containers, label/static-route errors, cache info and
//! event-listener stats.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::{builder::ExcludedContainer, docker::HostStatus};

#[derive(Debug, Clone, Serialize)]
pub(crate) struct HostStatusRecord {
    pub(crate) alias: String,
    pub(crate) hostname: String,
    pub(crate) status: HostStatus,
    pub(crate) last_attempt: Option<DateTime<Utc>>,
    pub(crate) last_success: Option<DateTime<Utc>>,
    pub(crate) connection_time_ms: Option<u64>,
    pub(crate) error_count: u64,
    pub(crate) last_error: Option<String>,
    pub(crate) running_count: usize,
    pub(crate) stopped_count: usize,
}

impl HostStatusRecord {
    pub(crate) fn new(alias: &str, hostname: &str) -> Self {
        Self {
            alias: alias.to_owned(),
            hostname: hostname.to_owned(),
            status: HostStatus::Unknown,
            last_attempt: None,
            last_success: None,
            connection_time_ms: None,
            error_count: 0,
            last_error: None,
            running_count: 0,
            stopped_count: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct EventListenerStats {
    pub(crate) status: String,
    pub(crate) events_received: u64,
}

#[derive(Default)]
pub(crate) struct Diagnostics {
    pub(crate) host_status: RwLock<HashMap<String, HostStatusRecord>>,
    pub(crate) excluded: RwLock<Vec<ExcludedContainer>>,
    pub(crate) label_errors: RwLock<Vec<String>>,
    pub(crate) static_route_errors: RwLock<Vec<String>>,
    pub(crate) processing_errors: RwLock<Vec<String>>,
    pub(crate) event_stats: RwLock<HashMap<String, EventListenerStats>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DiagnosticsSnapshot {
    pub(crate) hosts: Vec<HostStatusRecord>,
    pub(crate) excluded_containers: Vec<ExcludedContainer>,
    pub(crate) label_errors: Vec<String>,
    pub(crate) static_route_errors: Vec<String>,
    pub(crate) processing_errors: Vec<String>,
    pub(crate) event_listeners: HashMap<String, EventListenerStats>,
}

impl Diagnostics {
    pub(crate) async fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            hosts: self.host_status.read().await.values().cloned().collect(),
            excluded_containers: self.excluded.read().await.clone(),
            label_errors: self.label_errors.read().await.clone(),
            static_route_errors: self.static_route_errors.read().await.clone(),
            processing_errors: self.processing_errors.read().await.clone(),
            event_listeners: self.event_stats.read().await.clone(),
        }
    }

    pub(crate) async fn record_event(&self, alias: &str, status: &str) {
        let mut stats = self.event_stats.write().await;
        let entry = stats.entry(alias.to_owned()).or_default();
        entry.status = status.to_owned();
        entry.events_received += 1;
    }

    pub(crate) async fn set_listener_status(&self, alias: &str, status: &str) {
        let mut stats = self.event_stats.write().await;
        stats.entry(alias.to_owned()).or_default().status = status.to_owned();
    }
}
