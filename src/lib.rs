#![deny(unreachable_pub)]
mod api;
mod backoff;
mod builder;
mod cache;
mod config;
mod debounce;
mod diagnostics;
mod docker;
mod error;
mod health;
mod hosts;
mod labels;
mod listener;
mod orchestrator;
mod routes;
mod watcher;

use std::{collections::HashMap, path::PathBuf, sync::Arc};

pub use config::Config;
pub use error::Error;
use tokio::sync::{Mutex, RwLock};

use crate::{
    api::ApiServer,
    cache::Cache,
    diagnostics::Diagnostics,
    health::HealthChecker,
    hosts::HostRegistry,
    listener::ListenerHandle,
    orchestrator::Orchestrator,
    watcher::{watch, FileEvent, WatchListener, Watcher},
};

/// Spawns one event listener per enabled host, replacing the previous set.
async fn spawn_listeners(
    hosts: &HostRegistry,
    cache: &Arc<Cache>,
    diagnostics: &Arc<Diagnostics>,
) -> HashMap<String, ListenerHandle> {
    let mut listeners = HashMap::new();

    for alias in hosts.enabled_aliases() {
        let Some(host) = hosts.get(&alias) else {
            continue;
        };

        listeners.insert(
            alias,
            listener::spawn(host.clone(), cache.clone(), diagnostics.clone()),
        );
    }

    listeners
}

struct HostsWatcher {
    hosts_file: PathBuf,
    hosts: Arc<RwLock<HostRegistry>>,
    listeners: Arc<Mutex<HashMap<String, ListenerHandle>>>,
    cache: Arc<Cache>,
    diagnostics: Arc<Diagnostics>,
}

impl WatchListener for HostsWatcher {
    async fn event(&mut self, _: FileEvent) {
        let registry = match HostRegistry::from_file(&self.hosts_file) {
            Ok(registry) => registry,
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload hosts file");
                return;
            }
        };

        tracing::info!("Hosts file changed, restarting event listeners");

        let new_listeners = spawn_listeners(&registry, &self.cache, &self.diagnostics).await;
        *self.listeners.lock().await = new_listeners;
        *self.hosts.write().await = registry;

        self.cache.schedule_refresh();
    }
}

struct StaticRoutesWatcher {
    cache: Arc<Cache>,
}

impl WatchListener for StaticRoutesWatcher {
    async fn event(&mut self, _: FileEvent) {
        tracing::info!("Static routes file changed, scheduling refresh");
        self.cache.schedule_refresh();
    }
}

/// Top-level handle to a running provider: owns the host registry, cache,
/// health checker, event listeners, file watchers and HTTP surface.
pub struct Server {
    hosts: Arc<RwLock<HostRegistry>>,
    cache: Arc<Cache>,
    diagnostics: Arc<Diagnostics>,
    health: Arc<HealthChecker>,
    listeners: Arc<Mutex<HashMap<String, ListenerHandle>>>,
    health_task: tokio::task::JoinHandle<()>,
    api_server: Mutex<Option<ApiServer>>,
    _hosts_watcher: Option<Watcher>,
    _routes_watcher: Option<Watcher>,
}

impl Server {
    pub async fn new(config: Config) -> Result<Self, Error> {
        let hosts = Arc::new(RwLock::new(HostRegistry::from_file(&config.hosts_file)?));
        let diagnostics = Arc::new(Diagnostics::default());
        let health = HealthChecker::new(config.health_config());

        let refresh_hosts = hosts.clone();
        let refresh_diagnostics = diagnostics.clone();
        let refresh_health = health.clone();
        let static_routes_file = config.static_routes_file.clone();

        let cache = Arc::new(Cache::new(move || {
            let hosts = refresh_hosts.clone();
            let diagnostics = refresh_diagnostics.clone();
            let health = refresh_health.clone();
            let static_routes_path = static_routes_file.clone();

            async move {
                let registry = Arc::new(hosts.read().await.clone());
                let orchestrator = Orchestrator {
                    hosts: registry,
                    static_routes_path,
                    diagnostics,
                };

                let document = orchestrator.run().await;
                health.update_services(&document.health_targets).await;
                document
            }
        }));

        cache.force_refresh().await;

        let initial_listeners = {
            let registry = hosts.read().await;
            spawn_listeners(&registry, &cache, &diagnostics).await
        };
        let listeners = Arc::new(Mutex::new(initial_listeners));

        let health_task = tokio::spawn(health.clone().run());

        let api_server = Mutex::new(ApiServer::new(
            &config.api,
            cache.clone(),
            diagnostics.clone(),
            health.clone(),
        ));

        let hosts_watcher = match watch(
            &config.hosts_file,
            HostsWatcher {
                hosts_file: config.hosts_file.clone(),
                hosts: hosts.clone(),
                listeners: listeners.clone(),
                cache: cache.clone(),
                diagnostics: diagnostics.clone(),
            },
        ) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::error!(error = %e, "Failed to watch hosts file, changes will not be detected");
                None
            }
        };

        let routes_watcher = match watch(
            &config.static_routes_file,
            StaticRoutesWatcher {
                cache: cache.clone(),
            },
        ) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::error!(error = %e, "Failed to watch static routes file, changes will not be detected");
                None
            }
        };

        Ok(Self {
            hosts,
            cache,
            diagnostics,
            health,
            listeners,
            health_task,
            api_server,
            _hosts_watcher: hosts_watcher,
            _routes_watcher: routes_watcher,
        })
    }

    pub async fn shutdown(&self) {
        tracing::info!("Server shutting down");

        self.health_task.abort();

        self.listeners.lock().await.clear();

        if let Some(api_server) = self.api_server.lock().await.take() {
            api_server.shutdown().await;
        }
    }

    pub async fn host_count(&self) -> usize {
        self.hosts.read().await.len()
    }

    pub async fn diagnostics(&self) -> diagnostics::DiagnosticsSnapshot {
        self.diagnostics.snapshot().await
    }
}
