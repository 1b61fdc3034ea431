//! Cache & Debouncer (section 4.7): holds the current routing document and
//! coalesces refresh requests inside a 2-second quiet window.

use std::{future::Future, sync::Arc, time::Instant};

use tokio::sync::RwLock;

use crate::{builder::RoutingDocument, debounce::Debounced};

pub(crate) const DEBOUNCE_MS: u64 = 2000;

struct CacheState {
    document: RwLock<Option<(Arc<RoutingDocument>, Instant)>>,
}

/// A refresh is run at most once at a time: the underlying [`Debounced`]
/// loop executes its callback sequentially, so a schedule_refresh() that
/// arrives mid-pass simply extends the tail rather than overlapping it.
pub(crate) struct Cache {
    state: Arc<CacheState>,
    refresh: Arc<dyn Fn() -> futures::future::BoxFuture<'static, RoutingDocument> + Send + Sync>,
    debounced: Debounced,
}

impl Cache {
    pub(crate) fn new<F, Fut>(refresh: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RoutingDocument> + Send + 'static,
    {
        let state = Arc::new(CacheState {
            document: RwLock::new(None),
        });

        let refresh: Arc<dyn Fn() -> futures::future::BoxFuture<'static, RoutingDocument> + Send + Sync> =
            Arc::new(move || Box::pin(refresh()));

        let debounce_state = state.clone();
        let debounce_refresh = refresh.clone();
        let debounced = Debounced::new(DEBOUNCE_MS, move || {
            let state = debounce_state.clone();
            let refresh = debounce_refresh.clone();
            async move {
                tracing::debug!("Debounce window elapsed, running discovery pass");
                let document = refresh().await;
                *state.document.write().await = Some((Arc::new(document), Instant::now()));
            }
        });

        Self {
            state,
            refresh,
            debounced,
        }
    }

    /// Runs discovery immediately, bypassing the debounce window. Used once
    /// at startup to populate the cache before event listeners start.
    pub(crate) async fn force_refresh(&self) -> Arc<RoutingDocument> {
        let document = Arc::new((self.refresh)().await);
        *self.state.document.write().await = Some((document.clone(), Instant::now()));
        document
    }

    pub(crate) async fn get(&self) -> Option<Arc<RoutingDocument>> {
        self.state
            .document
            .read()
            .await
            .as_ref()
            .map(|(doc, _)| doc.clone())
    }

    pub(crate) async fn age(&self) -> Option<std::time::Duration> {
        self.state
            .document
            .read()
            .await
            .as_ref()
            .map(|(_, at)| at.elapsed())
    }

    pub(crate) fn schedule_refresh(&self) {
        self.debounced.trigger();
    }

    /// True if `container_name` corresponds to a service in the current
    /// document, per section 4.8's event-relevance check.
    pub(crate) async fn is_relevant(&self, container_name: &str) -> bool {
        let Some((document, _)) = self.state.document.read().await.clone() else {
            return false;
        };

        let prefix = format!("{container_name}-");
        document.http.services.keys().any(|name| name.starts_with(&prefix))
            || document
                .http
                .services
                .values()
                .any(|svc| {
                    svc.load_balancer
                        .servers
                        .iter()
                        .any(|s| s.url.contains(container_name))
                })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::sleep;

    use crate::builder::{HttpSection, Metadata, RoutingDocument};

    use super::*;

    fn empty_document(pass: usize) -> RoutingDocument {
        RoutingDocument {
            http: HttpSection::default(),
            metadata: Metadata {
                generated_at: chrono::Utc::now(),
                hosts_queried: vec![],
                successful_hosts: vec![],
                failed_hosts: vec![],
                container_count: pass,
                enabled_service_count: 0,
                excluded_count: 0,
                static_route_count: 0,
                processing_time_ms: 0,
            },
            health_targets: vec![],
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn debounces_bursts_into_one_pass() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counted = runs.clone();

        let cache = Cache::new(move || {
            let runs = counted.clone();
            async move {
                let pass = runs.fetch_add(1, Ordering::SeqCst) + 1;
                empty_document(pass)
            }
        });

        cache.force_refresh().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        cache.schedule_refresh();
        sleep(std::time::Duration::from_millis(200)).await;
        cache.schedule_refresh();
        sleep(std::time::Duration::from_millis(200)).await;
        cache.schedule_refresh();

        sleep(std::time::Duration::from_millis(DEBOUNCE_MS + 500)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(cache.get().await.is_some());
    }
}
