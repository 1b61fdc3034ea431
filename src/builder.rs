//! Config Builder (section 4.5): merges translated container routes and
//! static routes into a routing document, tracking excluded containers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    docker::ContainerDetail,
    labels,
    routes::{self, LoadBalancer, Middleware, RouteEntry, Router},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum ExcludedReason {
    NoRevpLabels,
    InvalidLabelConfiguration,
    LabelProcessingError,
    LabelExtractionError,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ExcludedContainer {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) host: String,
    pub(crate) reason: ExcludedReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) detail: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct HttpSection {
    pub(crate) routers: BTreeMap<String, Router>,
    pub(crate) services: BTreeMap<String, LoadBalancer>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) middlewares: BTreeMap<String, Middleware>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Metadata {
    pub(crate) generated_at: DateTime<Utc>,
    pub(crate) hosts_queried: Vec<String>,
    pub(crate) successful_hosts: Vec<String>,
    pub(crate) failed_hosts: Vec<String>,
    pub(crate) container_count: usize,
    pub(crate) enabled_service_count: usize,
    pub(crate) excluded_count: usize,
    pub(crate) static_route_count: usize,
    pub(crate) processing_time_ms: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct RoutingDocument {
    pub(crate) http: HttpSection,
    #[serde(rename = "_metadata")]
    pub(crate) metadata: Metadata,
    /// (service name, health-check URL), for services carrying a `health`
    /// label. Not part of the served JSON contract (section 6); the health
    /// checker (section 4.9) reads this to derive its monitor set.
    #[serde(skip)]
    pub(crate) health_targets: Vec<(String, String)>,
}

/// One container as seen by the builder: its detail, the host alias it was
/// discovered on, and the hostname to route backend traffic to.
pub(crate) struct ContainerInput {
    pub(crate) detail: ContainerDetail,
    pub(crate) host_alias: String,
    pub(crate) hostname: String,
}

#[derive(Default)]
pub(crate) struct BuildResult {
    pub(crate) http: HttpSection,
    pub(crate) excluded: Vec<ExcludedContainer>,
    pub(crate) label_errors: Vec<String>,
    pub(crate) processing_errors: Vec<String>,
    /// (service name, health-check URL) for services that carried a
    /// `health` label or field; feeds the health checker (section 4.9).
    pub(crate) health_targets: Vec<(String, String)>,
    pub(crate) container_count: usize,
}

struct Claim {
    http: HttpSection,
    claimed: std::collections::HashSet<String>,
    excluded: Vec<ExcludedContainer>,
    label_errors: Vec<String>,
    processing_errors: Vec<String>,
    health_targets: Vec<(String, String)>,
}

impl Claim {
    fn new() -> Self {
        Self {
            http: HttpSection::default(),
            claimed: Default::default(),
            excluded: Vec::new(),
            label_errors: Vec::new(),
            processing_errors: Vec::new(),
            health_targets: Vec::new(),
        }
    }

    /// Attempts to claim a route's service name. Returns false (and records
    /// a processing error) if another route already owns that name.
    fn try_claim(&mut self, route: &RouteEntry) -> bool {
        if self.claimed.contains(&route.service_name) {
            self.processing_errors.push(format!(
                "Service name '{}' is already in use, ignoring duplicate",
                route.service_name
            ));
            return false;
        }

        self.claimed.insert(route.service_name.clone());

        let materialized = routes::materialize(route);
        for (name, router) in materialized.routers {
            self.http.routers.insert(name, router);
        }
        self.http
            .services
            .insert(materialized.service.0, materialized.service.1);
        if let Some((name, middleware)) = materialized.middleware {
            self.http.middlewares.insert(name, middleware);
        }

        if let Some(health_url) = &route.health_url {
            self.health_targets
                .push((route.service_name.clone(), health_url.clone()));
        }

        true
    }
}

/// Runs the builder over one discovery pass's containers and the static
/// route table. Pure: performs no I/O.
pub(crate) fn build(containers: &[ContainerInput], static_routes: &[RouteEntry]) -> BuildResult {
    let mut claim = Claim::new();

    for input in containers {
        let name = input.detail.name.clone();
        let translation = labels::translate(
            &name,
            &input.detail.labels,
            &input.detail.port_map,
            &input.hostname,
        );

        if !translation.had_revp_labels {
            claim.excluded.push(ExcludedContainer {
                id: input.detail.id.clone(),
                name,
                host: input.host_alias.clone(),
                reason: ExcludedReason::NoRevpLabels,
                detail: None,
            });
            continue;
        }

        claim.label_errors.extend(translation.errors.iter().cloned());

        if translation.routes.is_empty() {
            claim.excluded.push(ExcludedContainer {
                id: input.detail.id.clone(),
                name,
                host: input.host_alias.clone(),
                reason: ExcludedReason::InvalidLabelConfiguration,
                detail: Some(translation.errors.join("; ")),
            });
            continue;
        }

        let mut claimed_any = false;
        let mut collisions = Vec::new();
        for route in &translation.routes {
            if claim.try_claim(route) {
                claimed_any = true;
            } else {
                collisions.push(route.service_name.clone());
            }
        }

        if !claimed_any {
            claim.excluded.push(ExcludedContainer {
                id: input.detail.id.clone(),
                name,
                host: input.host_alias.clone(),
                reason: ExcludedReason::LabelProcessingError,
                detail: Some(format!(
                    "All routes collided with existing services: {}",
                    collisions.join(", ")
                )),
            });
        }
    }

    for route in static_routes {
        claim.try_claim(route);
    }

    BuildResult {
        http: claim.http,
        excluded: claim.excluded,
        label_errors: claim.label_errors,
        processing_errors: claim.processing_errors,
        health_targets: claim.health_targets,
        container_count: containers.len(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::docker::ContainerState;

    use super::*;

    fn container(id: &str, name: &str, labels: &[(&str, &str)], ports: &[(u16, u16)]) -> ContainerInput {
        ContainerInput {
            detail: ContainerDetail {
                id: id.to_owned(),
                name: name.to_owned(),
                image: None,
                state: ContainerState::Running,
                created: None,
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                port_map: ports.iter().cloned().collect::<HashMap<_, _>>(),
            },
            host_alias: "fabric".to_owned(),
            hostname: "fabric.lan".to_owned(),
        }
    }

    #[test]
    fn referential_integrity() {
        let containers = vec![container(
            "c1",
            "uptime-kuma",
            &[("snadboy.revp.3001.domain", "kuma.example.com")],
            &[(3001, 3001)],
        )];

        let result = build(&containers, &[]);

        for router in result.http.routers.values() {
            assert!(result.http.services.contains_key(&router.service));
            for mw in &router.middlewares {
                assert!(result.http.middlewares.contains_key(mw));
            }
        }

        assert_eq!(result.http.routers.len(), 2);
        assert!(result
            .http
            .routers
            .contains_key("uptime-kuma-3001-https-router"));
        assert!(result
            .http
            .routers
            .contains_key("uptime-kuma-3001-http-router"));
    }

    #[test]
    fn collision_is_excluded() {
        let mut c2 = container(
            "c2",
            "app",
            &[("snadboy.revp.80.domain", "app.example.com")],
            &[(80, 80)],
        );
        c2.host_alias = "b".to_owned();

        let containers = vec![
            container(
                "c1",
                "app",
                &[("snadboy.revp.80.domain", "app.example.com")],
                &[(80, 80)],
            ),
            c2,
        ];

        let result = build(&containers, &[]);

        assert_eq!(result.http.services.len(), 1);
        assert_eq!(result.excluded.len(), 1);
        assert_eq!(result.excluded[0].reason, ExcludedReason::LabelProcessingError);
        assert_eq!(result.processing_errors.len(), 1);
    }

    #[test]
    fn no_labels_excluded() {
        let containers = vec![container("c1", "plain", &[], &[])];
        let result = build(&containers, &[]);

        assert_eq!(result.excluded.len(), 1);
        assert_eq!(result.excluded[0].reason, ExcludedReason::NoRevpLabels);
    }

    #[test]
    fn invalid_labels_excluded() {
        let containers = vec![container(
            "c1",
            "broken",
            &[("snadboy.revp.8080.backend-proto", "http")],
            &[],
        )];
        let result = build(&containers, &[]);

        assert_eq!(result.excluded.len(), 1);
        assert_eq!(
            result.excluded[0].reason,
            ExcludedReason::InvalidLabelConfiguration
        );
        assert_eq!(result.label_errors.len(), 1);
    }

    #[test]
    fn static_route_merged() {
        let static_routes = vec![RouteEntry {
            service_name: "static-wildcard-static-example-com".to_owned(),
            backend_url: "http://10.0.0.5:80".to_owned(),
            domains: vec!["*.static.example.com".to_owned()],
            https: true,
            redirect_https: true,
            health_url: None,
        }];

        let result = build(&[], &static_routes);
        assert_eq!(result.http.services.len(), 1);
        assert_eq!(result.http.routers.len(), 2);
    }
}
