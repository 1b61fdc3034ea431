//! Discovery Orchestrator (section 4.6): walks every enabled host, lists
//! and inspects its containers, and hands the result to the Config
//! Builder.

use std::{sync::Arc, time::Instant};

use chrono::Utc;

use crate::{
    builder::{self, ContainerInput, Metadata, RoutingDocument},
    diagnostics::{Diagnostics, HostStatusRecord},
    docker::{self, ContainerState, HostStatus},
    hosts::HostRegistry,
    routes::load_static_routes,
};

pub(crate) struct Orchestrator {
    pub(crate) hosts: Arc<HostRegistry>,
    pub(crate) static_routes_path: std::path::PathBuf,
    pub(crate) diagnostics: Arc<Diagnostics>,
}

impl Orchestrator {
    /// Runs one full discovery pass over every enabled host.
    pub(crate) async fn run(&self) -> RoutingDocument {
        let start = Instant::now();
        let aliases = self.hosts.enabled_aliases();

        let mut containers = Vec::new();
        let mut successful_hosts = Vec::new();
        let mut failed_hosts = Vec::new();

        for alias in &aliases {
            let Some(host) = self.hosts.get(alias) else {
                continue;
            };

            let attempt_start = Instant::now();
            let list_result = docker::list(host).await;

            let mut status_record = {
                let diagnostics = self.diagnostics.host_status.read().await;
                diagnostics
                    .get(alias)
                    .cloned()
                    .unwrap_or_else(|| HostStatusRecord::new(alias, &host.hostname))
            };
            status_record.last_attempt = Some(Utc::now());

            match list_result {
                Ok(summaries) => {
                    status_record.status = HostStatus::Connected;
                    status_record.last_success = Some(Utc::now());
                    status_record.connection_time_ms =
                        Some(attempt_start.elapsed().as_millis() as u64);
                    status_record.running_count = summaries
                        .iter()
                        .filter(|c| c.state == ContainerState::Running)
                        .count();
                    status_record.stopped_count = summaries
                        .iter()
                        .filter(|c| c.state == ContainerState::Stopped)
                        .count();

                    successful_hosts.push(alias.clone());

                    for summary in &summaries {
                        if summary.state != ContainerState::Running {
                            continue;
                        }

                        match docker::inspect(host, &summary.id).await {
                            Ok(detail) => containers.push(ContainerInput {
                                detail,
                                host_alias: alias.clone(),
                                hostname: host.hostname.clone(),
                            }),
                            Err(e) => {
                                tracing::warn!(
                                    alias,
                                    container = summary.id,
                                    error = %e,
                                    "Failed to inspect container"
                                );
                            }
                        }
                    }
                }
                Err(e) => {
                    status_record.status = e.status;
                    status_record.error_count += 1;
                    status_record.last_error = Some(e.message.clone());
                    failed_hosts.push(alias.clone());

                    tracing::error!(alias, error = %e, "Failed to list containers on host");
                }
            }

            self.diagnostics
                .host_status
                .write()
                .await
                .insert(alias.clone(), status_record);
        }

        let static_result = match load_static_routes(&self.static_routes_path) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load static routes");
                Default::default()
            }
        };

        let build_result = builder::build(&containers, &static_result.routes);

        *self.diagnostics.excluded.write().await = build_result.excluded.clone();
        *self.diagnostics.label_errors.write().await = build_result.label_errors.clone();
        *self.diagnostics.static_route_errors.write().await = static_result.errors.clone();
        *self.diagnostics.processing_errors.write().await = build_result.processing_errors.clone();

        let enabled_service_count = build_result.http.services.len();

        RoutingDocument {
            metadata: Metadata {
                generated_at: Utc::now(),
                hosts_queried: aliases,
                successful_hosts,
                failed_hosts,
                container_count: build_result.container_count,
                enabled_service_count,
                excluded_count: build_result.excluded.len(),
                static_route_count: static_result.routes.len(),
                processing_time_ms: start.elapsed().as_millis() as u64,
            },
            health_targets: build_result.health_targets,
            http: build_result.http,
        }
    }
}
