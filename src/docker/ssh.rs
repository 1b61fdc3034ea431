//! SSH-subprocess transport: shells out to the system `ssh` and `docker`
//! binories rather than speaking either protocol directly (section 4.2).
//! Grounded on the original Python provider's subprocess invocation
//! (`ssh {alias} "docker events --format '{{json .}}'"`).

use std::{collections::HashMap, process::Stdio};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
    sync::mpsc::UnboundedSender,
};

use crate::hosts::Host;

use super::{
    ClientError, ContainerDetail, ContainerState, ContainerSummary, EventHandle, EventRecord,
    LIFECYCLE_ACTIONS,
};

const CONNECT_TIMEOUT_SECS: u64 = 8;

fn ssh_command(host: &Host, remote_command: &str) -> Command {
    let mut command = Command::new("ssh");
    command
        .arg("-o")
        .arg("BatchMode=yes")
        .arg("-o")
        .arg(format!("ConnectTimeout={CONNECT_TIMEOUT_SECS}"))
        .arg("-p")
        .arg(host.port.to_string());

    let target = match &host.user {
        Some(user) => format!("{user}@{}", host.hostname),
        None => host.hostname.clone(),
    };
    command.arg(target).arg(remote_command);
    command.stdin(Stdio::null());
    command.kill_on_drop(true);
    command
}

async fn run(host: &Host, remote_command: &str) -> Result<String, ClientError> {
    let output = ssh_command(host, remote_command)
        .output()
        .await
        .map_err(|e| ClientError::new(format!("Failed to spawn ssh: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ClientError::new(if stderr.trim().is_empty() {
            format!("ssh exited with status {}", output.status)
        } else {
            stderr.trim().to_owned()
        }));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn parse_summary(line: &str) -> Option<ContainerSummary> {
    let value: Value = serde_json::from_str(line).ok()?;
    let id = value.get("ID")?.as_str()?.to_owned();
    let name = value
        .get("Names")
        .and_then(|v| v.as_str())
        .map(|s| s.trim_start_matches('/').to_owned())
        .unwrap_or_else(|| id.clone());
    let status = value
        .get("Status")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_owned();
    let state = match value.get("State").and_then(|v| v.as_str()) {
        Some("running") => ContainerState::Running,
        Some(_) => ContainerState::Stopped,
        None => ContainerState::Unknown,
    };

    Some(ContainerSummary {
        id,
        name,
        state,
        status,
    })
}

pub(super) async fn list(host: &Host) -> Result<Vec<ContainerSummary>, ClientError> {
    let output = run(host, "docker ps -a --format '{{json .}}'").await?;

    Ok(output.lines().filter_map(parse_summary).collect())
}

fn parse_detail(id: &str, value: &Value) -> ContainerDetail {
    let name = value
        .get("Name")
        .and_then(|v| v.as_str())
        .map(|s| s.trim_start_matches('/').to_owned())
        .unwrap_or_else(|| id.to_owned());

    let image = value
        .pointer("/Config/Image")
        .and_then(|v| v.as_str())
        .map(str::to_owned);

    let state = match value.pointer("/State/Status").and_then(|v| v.as_str()) {
        Some("running") => ContainerState::Running,
        Some(_) => ContainerState::Stopped,
        None => ContainerState::Unknown,
    };

    let created: Option<DateTime<Utc>> = value
        .get("Created")
        .and_then(|v| v.as_str())
        .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let labels = value
        .pointer("/Config/Labels")
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_owned())))
                .collect()
        })
        .unwrap_or_default();

    let mut port_map = HashMap::new();
    if let Some(ports) = value
        .pointer("/NetworkSettings/Ports")
        .and_then(|v| v.as_object())
    {
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

            let external = hosts
                .as_array()
                .and_then(|arr| arr.first())
                .and_then(|h| h.get("HostPort"))
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<u16>().ok());

            if let Some(external) = external {
                port_map.insert(internal, external);
            }
        }
    }

    ContainerDetail {
        id: id.to_owned(),
        name,
        image,
        state,
        created,
        labels,
        port_map,
    }
}

pub(super) async fn inspect(host: &Host, id: &str) -> Result<ContainerDetail, ClientError> {
    let output = run(host, &format!("docker inspect {id}")).await?;

    let values: Vec<Value> = serde_json::from_str(&output)
        .map_err(|e| ClientError::new(format!("Failed to parse docker inspect output: {e}")))?;

    let value = values
        .first()
        .ok_or_else(|| ClientError::new("docker inspect returned no results"))?;

    Ok(parse_detail(id, value))
}

pub(super) fn spawn_events(host: &Host, tx: UnboundedSender<EventRecord>) -> EventHandle {
    let host = host.clone();

    let handle = tokio::spawn(async move {
        let filter_args: String = LIFECYCLE_ACTIONS
            .iter()
            .map(|a| format!("--filter event={a}"))
            .collect::<Vec<_>>()
            .join(" ");

        let remote_command =
            format!("docker events --format '{{{{json .}}}}' --filter type=container {filter_args}");

        let mut child = match ssh_command(&host, &remote_command)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(alias = %host.alias, error = %e, "Failed to spawn ssh event stream");
                return;
            }
        };

        let Some(stdout) = child.stdout.take() else {
            return;
        };
        let mut lines = BufReader::new(stdout).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let Ok(value) = serde_json::from_str::<Value>(&line) else {
                        continue;
                    };

                    if value.get("Type").and_then(|v| v.as_str()) != Some("container") {
                        continue;
                    }

                    let Some(name) = value
                        .pointer("/Actor/Attributes/name")
                        .and_then(|v| v.as_str())
                    else {
                        continue;
                    };

                    let action = value
                        .get("Action")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_owned();

                    if tx
                        .send(EventRecord {
                            action,
                            container_name: name.to_owned(),
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::debug!(alias = %host.alias, "Event stream closed");
                    break;
                }
                Err(e) => {
                    tracing::warn!(alias = %host.alias, error = %e, "Error reading event stream");
                    break;
                }
            }
        }

        let _ = child.kill().await;
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

