//! Host Registry: the set of Docker hosts to discover containers from.

use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;

use crate::Error;

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    22
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub(crate) struct HostDefaults {
    #[serde(default)]
    pub(crate) user: Option<String>,
    #[serde(default = "default_port")]
    pub(crate) port: u16,
    #[serde(default = "default_true")]
    pub(crate) enabled: bool,
}

impl Default for HostDefaults {
    fn default() -> Self {
        Self {
            user: None,
            port: default_port(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub(crate) struct HostEntry {
    pub(crate) hostname: String,
    #[serde(default)]
    pub(crate) user: Option<String>,
    #[serde(default)]
    pub(crate) port: Option<u16>,
    #[serde(default)]
    pub(crate) enabled: Option<bool>,
    #[serde(default)]
    pub(crate) is_local: bool,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
struct HostsFile {
    #[serde(default)]
    defaults: HostDefaults,
    #[serde(default)]
    hosts: HashMap<String, HostEntry>,
}

/// A fully resolved host: registry defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Host {
    pub(crate) alias: String,
    pub(crate) hostname: String,
    pub(crate) user: Option<String>,
    pub(crate) port: u16,
    pub(crate) enabled: bool,
    pub(crate) is_local: bool,
}

/// Holds the resolved set of configured hosts, keyed by alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct HostRegistry {
    hosts: HashMap<String, Host>,
}

impl HostRegistry {
    pub(crate) fn from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;
        let file: HostsFile = serde_yaml::from_str(&contents)?;

        let mut hosts = HashMap::new();
        for (alias, entry) in file.hosts {
            let enabled = entry.enabled.unwrap_or(file.defaults.enabled);
            let port = entry.port.unwrap_or(file.defaults.port);
            let user = entry.user.or_else(|| file.defaults.user.clone());

            hosts.insert(
                alias.clone(),
                Host {
                    alias,
                    hostname: entry.hostname,
                    user,
                    port,
                    enabled,
                    is_local: entry.is_local,
                },
            );
        }

        Ok(Self { hosts })
    }

    /// Aliases of enabled hosts, in a stable (sorted) order.
    pub(crate) fn enabled_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self
            .hosts
            .values()
            .filter(|h| h.enabled)
            .map(|h| h.alias.clone())
            .collect();
        aliases.sort();
        aliases
    }

    pub(crate) fn get(&self, alias: &str) -> Option<&Host> {
        self.hosts.get(alias)
    }

    pub(crate) fn resolve(&self, alias: &str) -> Result<&str, Error> {
        self.hosts
            .get(alias)
            .map(|h| h.hostname.as_str())
            .ok_or_else(|| Error::UnknownHost {
                alias: alias.to_owned(),
            })
    }

    pub(crate) fn len(&self) -> usize {
        self.hosts.len()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::HostRegistry;

    fn write_hosts(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn resolves_defaults() {
        let file = write_hosts(
            r#"
defaults:
  user: deploy
  port: 2222
  enabled: true
hosts:
  fabric:
    hostname: fabric.lan
  archive:
    hostname: archive.lan
    enabled: false
    user: root
"#,
        );

        let registry = HostRegistry::from_file(file.path()).unwrap();
        assert_eq!(registry.enabled_aliases(), vec!["fabric".to_string()]);

        let fabric = registry.get("fabric").unwrap();
        assert_eq!(fabric.user.as_deref(), Some("deploy"));
        assert_eq!(fabric.port, 2222);

        let archive = registry.get("archive").unwrap();
        assert_eq!(archive.user.as_deref(), Some("root"));
        assert!(!archive.enabled);
    }

    #[test]
    fn missing_file_errors() {
        let result = HostRegistry::from_file(std::path::Path::new("/nonexistent/hosts.yaml"));
        assert!(result.is_err());
    }
}
