//! Local-socket transport: used for hosts marked `is_local` in the host
//! registry. Grounded on the teacher's `sources/docker.rs` `connect`/
//! `fetch_state` pair, adapted from DNS record generation to the routing
//! container/detail shapes this crate needs.

use std::collections::HashMap;

use bollard::{
    container::{InspectContainerOptions, ListContainersOptions},
    models::{self, EventMessageTypeEnum},
    system::EventsOptions,
    Docker,
};
use chrono::DateTime;
use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;

use super::{
    ClientError, ContainerDetail, ContainerState, ContainerSummary, EventHandle, EventRecord,
    LIFECYCLE_ACTIONS,
};

fn connect() -> Result<Docker, ClientError> {
    Docker::connect_with_local_defaults().map_err(|e| ClientError::new(e.to_string()))
}

fn state_of(state: Option<&str>) -> ContainerState {
    match state {
        Some("running") => ContainerState::Running,
        Some(_) => ContainerState::Stopped,
        None => ContainerState::Unknown,
    }
}

pub(super) async fn list() -> Result<Vec<ContainerSummary>, ClientError> {
    let docker = connect()?;

    let options = ListContainersOptions::<&str> {
        all: true,
        ..Default::default()
    };

    let containers = docker
        .list_containers(Some(options))
        .await
        .map_err(|e| ClientError::new(e.to_string()))?;

    Ok(containers
        .into_iter()
        .filter_map(|c| {
            let id = c.id?;
            let name = c
                .names
                .unwrap_or_default()
                .first()
                .map(|n| n.trim_start_matches('/').to_owned())
                .unwrap_or_else(|| id.clone());

            Some(ContainerSummary {
                id,
                name,
                state: state_of(c.state.as_deref()),
                status: c.status.unwrap_or_default(),
            })
        })
        .collect())
}

pub(super) async fn inspect(id: &str) -> Result<ContainerDetail, ClientError> {
    let docker = connect()?;

    let detail = docker
        .inspect_container(id, None::<InspectContainerOptions>)
        .await
        .map_err(|e| ClientError::new(e.to_string()))?;

    let name = detail
        .name
        .clone()
        .map(|n| n.trim_start_matches('/').to_owned())
        .unwrap_or_else(|| id.to_owned());

    let labels = detail
        .config
        .as_ref()
        .and_then(|c| c.labels.clone())
        .unwrap_or_default();

    let state = detail
        .state
        .as_ref()
        .and_then(|s| s.status)
        .map(|status| match status {
            models::ContainerStateStatusEnum::RUNNING => ContainerState::Running,
            models::ContainerStateStatusEnum::EMPTY => ContainerState::Unknown,
            _ => ContainerState::Stopped,
        })
        .unwrap_or(ContainerState::Unknown);

    let created = detail
        .created
        .as_deref()
        .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc));

    let mut port_map = HashMap::new();
    if let Some(ports) = detail.network_settings.and_then(|ns| ns.ports) {
        for (binding, hosts) in ports {
            let Some((internal, proto)) = binding.split_once('/') else {
                continue;
            };
            if proto != "tcp" {
                continue;
            }
            let Ok(internal) = internal.parse::<u16>() else {
                continue;
            };

            if let Some(external) = hosts.into_iter().flatten().find_map(|h| {
                h.host_port.and_then(|p| p.parse::<u16>().ok())
            }) {
                port_map.insert(internal, external);
            }
        }
    }

    Ok(ContainerDetail {
        id: id.to_owned(),
        name,
        image: detail.config.and_then(|c| c.image),
        state,
        created,
        labels,
        port_map,
    })
}

pub(super) fn spawn_events(tx: UnboundedSender<EventRecord>) -> EventHandle {
    let handle = tokio::spawn(async move {
        let docker = match connect() {
            Ok(docker) => docker,
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to local docker daemon for events");
                return;
            }
        };

        let mut filters = HashMap::new();
        filters.insert("type".to_owned(), vec!["container".to_owned()]);
        filters.insert(
            "event".to_owned(),
            LIFECYCLE_ACTIONS.iter().map(|s| s.to_string()).collect(),
        );

        let mut events = docker.events(Some(EventsOptions {
            filters,
            ..Default::default()
        }));

        while let Some(event) = events.next().await {
            match event {
                Ok(ev) => {
                    if ev.typ != Some(EventMessageTypeEnum::CONTAINER) {
                        continue;
                    }

                    let Some(name) = ev
                        .actor
                        .and_then(|a| a.attributes)
                        .and_then(|mut attrs| attrs.remove("name"))
                    else {
                        continue;
                    };

                    let action = ev.action.unwrap_or_default();
                    if tx
                        .send(EventRecord {
                            action,
                            container_name: name,
                        })
                        .is_err()
                    {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Local docker event stream ended");
                    return;
                }
            }
        }
    });

    EventHandle {
        _inner: Box::new(AbortOnDrop(handle)),
    }
}

struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
