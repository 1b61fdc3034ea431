//! Shared routing document types, and the static route loader (section 4.4).

use std::{collections::BTreeMap, fs};

use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct LoadBalancer {
    #[serde(rename = "loadBalancer")]
    pub(crate) load_balancer: LoadBalancerInner,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct LoadBalancerInner {
    pub(crate) servers: Vec<Server>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct Server {
    pub(crate) url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct Router {
    pub(crate) rule: String,
    pub(crate) service: String,
    #[serde(rename = "entryPoints")]
    pub(crate) entry_points: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) middlewares: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tls: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct RedirectScheme {
    pub(crate) scheme: String,
    pub(crate) permanent: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct Middleware {
    #[serde(rename = "redirectScheme")]
    pub(crate) redirect_scheme: RedirectScheme,
}

/// One fully materialized route, ready to merge into a [`RoutingDocument`].
///
/// Both the label translator and the static route loader produce these;
/// the builder never needs to know which source a route came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RouteEntry {
    pub(crate) service_name: String,
    pub(crate) backend_url: String,
    pub(crate) domains: Vec<String>,
    pub(crate) https: bool,
    pub(crate) redirect_https: bool,
    /// Health-check URL, if a `health` label/field was present.
    pub(crate) health_url: Option<String>,
}

pub(crate) fn https_router_name(service: &str) -> String {
    format!("{service}-https-router")
}

pub(crate) fn http_router_name(service: &str) -> String {
    format!("{service}-http-router")
}

pub(crate) fn redirect_middleware_name(service: &str) -> String {
    format!("{service}-redirect-https")
}

pub(crate) fn host_rule(domains: &[String]) -> String {
    domains
        .iter()
        .map(|d| format!("Host(`{d}`)"))
        .collect::<Vec<_>>()
        .join(" || ")
}

pub(crate) fn static_service_name(domain: &str) -> String {
    format!(
        "static-{}",
        domain.replace('*', "wildcard").replace('.', "-")
    )
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub(crate) struct StaticRoute {
    pub(crate) domain: Option<String>,
    pub(crate) target: Option<String>,
    #[serde(default = "default_true")]
    pub(crate) https: bool,
    #[serde(default = "default_true", rename = "redirect-https")]
    pub(crate) redirect_https: bool,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
struct StaticRoutesFile {
    #[serde(default)]
    static_routes: Vec<StaticRoute>,
}

#[derive(Debug, Default)]
pub(crate) struct StaticRouteResult {
    pub(crate) routes: Vec<RouteEntry>,
    pub(crate) errors: Vec<String>,
}

/// Loads the static-routes file. A missing file is not an error: it is
/// treated as an empty table (section 4.12).
pub(crate) fn load_static_routes(path: &std::path::Path) -> Result<StaticRouteResult, Error> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Static routes file does not exist, using an empty table");
        return Ok(StaticRouteResult::default());
    }

    let contents = fs::read_to_string(path)?;
    let file: StaticRoutesFile = serde_yaml::from_str(&contents)?;

    let mut result = StaticRouteResult::default();
    for entry in file.static_routes {
        let (Some(domain), Some(target)) = (entry.domain.clone(), entry.target.clone()) else {
            result
                .errors
                .push("Static route entry missing 'domain' or 'target'".to_owned());
            continue;
        };

        result.routes.push(RouteEntry {
            service_name: static_service_name(&domain),
            backend_url: target,
            domains: vec![domain],
            https: entry.https,
            redirect_https: entry.redirect_https,
            health_url: None,
        });
    }

    Ok(result)
}

/// Result of expanding one [`RouteEntry`] into its router/service/middleware
/// shape (section 3: "Exactly one of three router shapes per service").
pub(crate) struct Materialized {
    pub(crate) routers: Vec<(String, Router)>,
    pub(crate) service: (String, LoadBalancer),
    pub(crate) middleware: Option<(String, Middleware)>,
}

pub(crate) fn materialize(route: &RouteEntry) -> Materialized {
    let service = (
        route.service_name.clone(),
        LoadBalancer {
            load_balancer: LoadBalancerInner {
                servers: vec![Server {
                    url: route.backend_url.clone(),
                }],
            },
        },
    );

    let rule = host_rule(&route.domains);
    let mut routers = Vec::new();
    let mut middleware = None;

    match (route.https, route.redirect_https) {
        (true, true) => {
            routers.push((
                https_router_name(&route.service_name),
                Router {
                    rule: rule.clone(),
                    service: route.service_name.clone(),
                    entry_points: vec!["websecure".to_owned()],
                    middlewares: vec![],
                    tls: Some(BTreeMap::new()),
                },
            ));

            let mw_name = redirect_middleware_name(&route.service_name);
            routers.push((
                http_router_name(&route.service_name),
                Router {
                    rule,
                    service: route.service_name.clone(),
                    entry_points: vec!["web".to_owned()],
                    middlewares: vec![mw_name.clone()],
                    tls: None,
                },
            ));

            middleware = Some((
                mw_name,
                Middleware {
                    redirect_scheme: RedirectScheme {
                        scheme: "https".to_owned(),
                        permanent: true,
                    },
                },
            ));
        }
        (true, false) => {
            routers.push((
                https_router_name(&route.service_name),
                Router {
                    rule: rule.clone(),
                    service: route.service_name.clone(),
                    entry_points: vec!["websecure".to_owned()],
                    middlewares: vec![],
                    tls: Some(BTreeMap::new()),
                },
            ));
            routers.push((
                http_router_name(&route.service_name),
                Router {
                    rule,
                    service: route.service_name.clone(),
                    entry_points: vec!["web".to_owned()],
                    middlewares: vec![],
                    tls: None,
                },
            ));
        }
        (false, _) => {
            routers.push((
                http_router_name(&route.service_name),
                Router {
                    rule,
                    service: route.service_name.clone(),
                    entry_points: vec!["web".to_owned()],
                    middlewares: vec![],
                    tls: None,
                },
            ));
        }
    }

    Materialized {
        routers,
        service,
        middleware,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn static_service_naming() {
        assert_eq!(
            static_service_name("*.static.example.com"),
            "static-wildcard-static-example-com"
        );
    }

    #[test]
    fn missing_file_is_empty() {
        let result = load_static_routes(std::path::Path::new("/nonexistent/static.yaml")).unwrap();
        assert!(result.routes.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn parses_static_routes() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
static_routes:
  - domain: "*.static.example.com"
    target: "http://10.0.0.5:80"
    https: true
    redirect-https: true
  - target: "http://10.0.0.6:80"
"#
        )
        .unwrap();

        let result = load_static_routes(file.path()).unwrap();
        assert_eq!(result.routes.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.routes[0].service_name,
            "static-wildcard-static-example-com"
        );
    }
}
