//! Health Checker (section 4.9): periodically probes backend URLs
//! concurrently, tracks UP/DEGRADED/DOWN state per service, and notifies
//! registered callbacks on transition. Grounded on the original Python
//! provider's `health_checker.py` (interval/timeout/threshold defaults,
//! concurrent `gather`-based probing, isolated callback dispatch).

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio::{sync::RwLock, time::Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum HealthStatus {
    Unknown,
    Up,
    Degraded,
    Down,
}

#[derive(Debug, Clone)]
pub(crate) struct HealthConfig {
    pub(crate) check_interval: Duration,
    pub(crate) timeout: Duration,
    pub(crate) degraded_threshold_ms: u64,
    pub(crate) failure_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            timeout: Duration::from_secs(5),
            degraded_threshold_ms: 3000,
            failure_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ServiceHealth {
    pub(crate) name: String,
    pub(crate) url: String,
    pub(crate) status: HealthStatus,
    pub(crate) last_check: Option<DateTime<Utc>>,
    pub(crate) last_success: Option<DateTime<Utc>>,
    pub(crate) last_failure: Option<DateTime<Utc>>,
    pub(crate) last_response_time_ms: Option<u64>,
    pub(crate) last_status_code: Option<u16>,
    pub(crate) consecutive_successes: u32,
    pub(crate) consecutive_failures: u32,
    pub(crate) last_error: Option<String>,
}

impl ServiceHealth {
    fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_owned(),
            url: url.to_owned(),
            status: HealthStatus::Unknown,
            last_check: None,
            last_success: None,
            last_failure: None,
            last_response_time_ms: None,
            last_status_code: None,
            consecutive_successes: 0,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

pub(crate) type StatusCallback = Arc<dyn Fn(String, ServiceHealth, HealthStatus) + Send + Sync>;

pub(crate) struct HealthChecker {
    config: HealthConfig,
    client: Client,
    services: RwLock<HashMap<String, ServiceHealth>>,
    callbacks: RwLock<Vec<StatusCallback>>,
}

impl HealthChecker {
    pub(crate) fn new(config: HealthConfig) -> Arc<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(config.timeout)
            .build()
            .expect("reqwest client should always build with a fixed config");

        Arc::new(Self {
            config,
            client,
            services: RwLock::new(HashMap::new()),
            callbacks: RwLock::new(Vec::new()),
        })
    }

    pub(crate) async fn register_callback(&self, callback: StatusCallback) {
        self.callbacks.write().await.push(callback);
    }

    /// Reconciles the monitored set: adds new services, drops missing ones,
    /// and updates the URL of any that changed.
    pub(crate) async fn update_services(&self, targets: &[(String, String)]) {
        let mut services = self.services.write().await;

        let wanted: HashMap<&str, &str> = targets
            .iter()
            .map(|(name, url)| (name.as_str(), url.as_str()))
            .collect();

        services.retain(|name, _| wanted.contains_key(name.as_str()));

        for (name, url) in targets {
            match services.get_mut(name) {
                Some(existing) if existing.url != *url => {
                    existing.url = url.clone();
                }
                Some(_) => {}
                None => {
                    services.insert(name.clone(), ServiceHealth::new(name, url));
                }
            }
        }
    }

    /// Runs the check loop forever, waking every `check_interval`.
    pub(crate) async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.check_all().await;
        }
    }

    async fn check_all(&self) {
        let names: Vec<String> = self.services.read().await.keys().cloned().collect();

        let checks = names.iter().map(|name| self.check_now(name));
        futures::future::join_all(checks).await;
    }

    /// Forces an out-of-band probe of one service.
    pub(crate) async fn check_now(&self, name: &str) {
        let Some(url) = self
            .services
            .read()
            .await
            .get(name)
            .map(|s| s.url.clone())
        else {
            return;
        };

        let start = Instant::now();
        let probe = self.client.get(&url).send().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let (old, new) = {
            let mut services = self.services.write().await;
            let Some(entry) = services.get_mut(name) else {
                return;
            };

            let old_status = entry.status;
            entry.last_check = Some(Utc::now());
            entry.last_response_time_ms = Some(elapsed_ms);

            match probe {
                Ok(response) => {
                    let status_code = response.status().as_u16();
                    entry.last_status_code = Some(status_code);

                    let success = status_code < 400 || status_code == 401 || status_code == 403;
                    if success {
                        entry.consecutive_failures = 0;
                        entry.consecutive_successes += 1;
                        entry.last_success = Some(Utc::now());
                        entry.last_error = None;

                        entry.status = if elapsed_ms > self.config.degraded_threshold_ms {
                            HealthStatus::Degraded
                        } else {
                            HealthStatus::Up
                        };
                    } else {
                        entry.consecutive_successes = 0;
                        entry.consecutive_failures += 1;
                        entry.last_failure = Some(Utc::now());
                        entry.last_error = Some(format!("Unexpected status {status_code}"));

                        entry.status = if entry.consecutive_failures >= self.config.failure_threshold
                        {
                            HealthStatus::Down
                        } else if entry.status == HealthStatus::Up {
                            HealthStatus::Degraded
                        } else {
                            entry.status
                        };
                    }
                }
                Err(e) => {
                    entry.consecutive_successes = 0;
                    entry.consecutive_failures += 1;
                    entry.last_failure = Some(Utc::now());
                    entry.last_error = Some(e.to_string());

                    entry.status = if entry.consecutive_failures >= self.config.failure_threshold {
                        HealthStatus::Down
                    } else if entry.status == HealthStatus::Up {
                        HealthStatus::Degraded
                    } else {
                        entry.status
                    };
                }
            }

            (old_status, entry.clone())
        };

        if old != new.status {
            self.notify(name, new, old).await;
        }
    }

    async fn notify(&self, name: &str, snapshot: ServiceHealth, old_status: HealthStatus) {
        let callbacks = self.callbacks.read().await.clone();
        for callback in callbacks {
            callback(name.to_owned(), snapshot.clone(), old_status);
        }
    }

    pub(crate) async fn snapshot(&self) -> Vec<ServiceHealth> {
        self.services.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn reconciles_monitored_set() {
        let checker = HealthChecker::new(HealthConfig::default());

        checker
            .update_services(&[("a".to_owned(), "http://localhost:1/".to_owned())])
            .await;
        assert_eq!(checker.snapshot().await.len(), 1);

        checker
            .update_services(&[("b".to_owned(), "http://localhost:2/".to_owned())])
            .await;
        let snapshot = checker.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "b");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failure_threshold_reaches_down() {
        let checker = HealthChecker::new(HealthConfig {
            check_interval: Duration::from_secs(60),
            timeout: Duration::from_millis(200),
            degraded_threshold_ms: 3000,
            failure_threshold: 2,
        });

        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        checker
            .register_callback(Arc::new(move |_name, health, _old| {
                counted.fetch_add(1, Ordering::SeqCst);
                let _ = health.status;
            }))
            .await;

        checker
            .update_services(&[(
                "unreachable".to_owned(),
                "http://127.0.0.1:1/".to_owned(),
            )])
            .await;

        checker.check_now("unreachable").await;
        checker.check_now("unreachable").await;

        let snapshot = checker.snapshot().await;
        assert_eq!(snapshot[0].status, HealthStatus::Down);
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }
}
