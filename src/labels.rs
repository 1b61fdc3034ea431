//! Label Translator (section 4.3): turns `snadboy.revp.<port>.<setting>`
//! container labels into [`RouteEntry`] values.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use std::sync::LazyLock;

use crate::routes::RouteEntry;

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^snadboy\.revp\.(\d+)\.(.+)$").unwrap());

/// One `snadboy.revp.<port>.*` group, before resolution against the
/// container's port map.
#[derive(Debug, Default, Clone)]
struct PortGroup {
    domain: Option<String>,
    backend_proto: Option<String>,
    backend_path: Option<String>,
    https: Option<bool>,
    redirect_https: Option<bool>,
    health: Option<String>,
    // Recognized but never emitted (wildcard TLS is assumed).
    _certresolver: Option<String>,
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

/// Groups the label map by internal port, keeping only `snadboy.revp.*` keys.
fn group_labels(labels: &HashMap<String, String>) -> BTreeMap<u16, PortGroup> {
    let mut groups: BTreeMap<u16, PortGroup> = BTreeMap::new();

    for (key, value) in labels {
        let Some(captures) = LABEL_RE.captures(key) else {
            continue;
        };

        let Ok(port) = captures[1].parse::<u16>() else {
            continue;
        };

        let group = groups.entry(port).or_default();
        match &captures[2] {
            "domain" => group.domain = Some(value.clone()),
            "backend-proto" => group.backend_proto = Some(value.clone()),
            "backend-path" => group.backend_path = Some(value.clone()),
            "https" => group.https = Some(parse_bool(value)),
            "redirect-https" => group.redirect_https = Some(parse_bool(value)),
            "https-certresolver" => group._certresolver = Some(value.clone()),
            "health" => group.health = Some(value.clone()),
            _ => {}
        }
    }

    groups
}

/// Result of translating one container's labels.
#[derive(Debug, Default)]
pub(crate) struct TranslationResult {
    pub(crate) routes: Vec<RouteEntry>,
    /// One message per rejected port group (section 4.5, `label-parse-error`).
    pub(crate) errors: Vec<String>,
    /// True if the container carried at least one `snadboy.revp.*` label.
    pub(crate) had_revp_labels: bool,
}

/// Translates one container's labels into routes.
///
/// `container_name` is the already-normalized, slash-stripped name.
/// `port_map` maps internal port -> external port, as seen in the
/// container's port bindings.
/// `hostname` is the resolved address of the host the container runs on.
pub(crate) fn translate(
    container_name: &str,
    labels: &HashMap<String, String>,
    port_map: &HashMap<u16, u16>,
    hostname: &str,
) -> TranslationResult {
    let groups = group_labels(labels);
    let mut result = TranslationResult {
        had_revp_labels: !groups.is_empty(),
        ..Default::default()
    };

    for (internal_port, group) in groups {
        let Some(domain) = group.domain else {
            result.errors.push(format!(
                "Missing required 'domain' label for port {internal_port}"
            ));
            continue;
        };

        let external_port = port_map.get(&internal_port).copied().unwrap_or(internal_port);
        let proto = group.backend_proto.unwrap_or_else(|| "http".to_owned());
        let mut path = group.backend_path.unwrap_or_else(|| "/".to_owned());
        if !path.starts_with('/') {
            path = format!("/{path}");
        }

        let https = group.https.unwrap_or(true);
        let redirect_https = group.redirect_https.unwrap_or(true);

        let domains: Vec<String> = domain.split(',').map(|d| d.trim().to_owned()).collect();

        let backend_url = format!("{proto}://{hostname}:{external_port}{path}");
        let service_name = format!("{container_name}-{internal_port}");

        let health_url = group
            .health
            .map(|health_path| format!("{proto}://{hostname}:{external_port}{health_path}"));

        result.routes.push(RouteEntry {
            service_name,
            backend_url,
            domains,
            https,
            redirect_https,
            health_url,
        });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn https_redirect_default() {
        let result = translate(
            "uptime-kuma",
            &labels(&[("snadboy.revp.3001.domain", "kuma.example.com")]),
            &HashMap::from([(3001, 3001)]),
            "fabric.lan",
        );

        assert_eq!(result.routes.len(), 1);
        let route = &result.routes[0];
        assert_eq!(route.service_name, "uptime-kuma-3001");
        assert_eq!(route.backend_url, "http://fabric.lan:3001/");
        assert!(route.https);
        assert!(route.redirect_https);
    }

    #[test]
    fn http_only() {
        let result = translate(
            "uptime-kuma",
            &labels(&[
                ("snadboy.revp.3001.domain", "kuma.example.com"),
                ("snadboy.revp.3001.https", "false"),
            ]),
            &HashMap::from([(3001, 3001)]),
            "fabric.lan",
        );

        assert_eq!(result.routes.len(), 1);
        assert!(!result.routes[0].https);
    }

    #[test]
    fn multiple_domains() {
        let result = translate(
            "uptime-kuma",
            &labels(&[(
                "snadboy.revp.3001.domain",
                "a.example.com,b.example.com",
            )]),
            &HashMap::from([(3001, 3001)]),
            "fabric.lan",
        );

        assert_eq!(result.routes[0].domains, vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn missing_domain_errors() {
        let result = translate(
            "broken",
            &labels(&[("snadboy.revp.8080.backend-proto", "http")]),
            &HashMap::new(),
            "fabric.lan",
        );

        assert!(result.routes.is_empty());
        assert!(result.had_revp_labels);
        assert_eq!(
            result.errors,
            vec!["Missing required 'domain' label for port 8080".to_owned()]
        );
    }

    #[test]
    fn no_revp_labels() {
        let result = translate(
            "plain",
            &labels(&[("some.other.label", "value")]),
            &HashMap::new(),
            "fabric.lan",
        );

        assert!(result.routes.is_empty());
        assert!(!result.had_revp_labels);
    }

    #[test]
    fn path_normalized() {
        let result = translate(
            "app",
            &labels(&[
                ("snadboy.revp.80.domain", "app.example.com"),
                ("snadboy.revp.80.backend-path", "status"),
            ]),
            &HashMap::from([(80, 8080)]),
            "fabric.lan",
        );

        assert_eq!(result.routes[0].backend_url, "http://fabric.lan:8080/status");
    }
}
