//! Event Listener (section 4.8): one per host, subscribes to filtered
//! Docker events and schedules a debounced cache refresh when a
//! routing-relevant container event arrives. Reconnects with backoff.
//! Grounded on the teacher's `sources/docker.rs` retry-loop shape
//! (`LoopResult`/`Backoff::default()`), generalized from DNS record
//! regeneration to cache invalidation.

use std::sync::Arc;

use tokio::{sync::mpsc::unbounded_channel, time::sleep};

use crate::{backoff::Backoff, cache::Cache, diagnostics::Diagnostics, docker, hosts::Host};

/// Handle to a running listener task; dropping it stops the listener and
/// (via the underlying [`docker::EventHandle`]) kills its subprocess.
pub(crate) struct ListenerHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub(crate) fn spawn(host: Host, cache: Arc<Cache>, diagnostics: Arc<Diagnostics>) -> ListenerHandle {
    let handle = tokio::spawn(async move {
        let mut backoff = Backoff::default();

        loop {
            diagnostics.set_listener_status(&host.alias, "connecting").await;

            let (tx, mut rx) = unbounded_channel();
            let _events = docker::spawn_events(&host, tx);

            tracing::info!(alias = %host.alias, "Event listener connected");
            diagnostics.set_listener_status(&host.alias, "streaming").await;

            while let Some(event) = rx.recv().await {
                // Only a real event proves the stream is live; resetting on
                // mere connect would mask a subprocess that connects and
                // immediately dies, defeating the backoff schedule.
                backoff.reset();
                diagnostics.record_event(&host.alias, "streaming").await;

                if !docker::LIFECYCLE_ACTIONS.contains(&event.action.as_str()) {
                    continue;
                }

                if cache.is_relevant(&event.container_name).await {
                    tracing::debug!(
                        alias = %host.alias,
                        container = event.container_name,
                        action = event.action,
                        "Routing-relevant container event, scheduling refresh"
                    );
                    cache.schedule_refresh();
                } else {
                    tracing::trace!(
                        alias = %host.alias,
                        container = event.container_name,
                        "Ignoring event for unrelated container"
                    );
                }
            }

            tracing::warn!(alias = %host.alias, "Event stream ended, reconnecting with backoff");
            diagnostics.set_listener_status(&host.alias, "backoff").await;
            sleep(backoff.next()).await;
        }
    });

    ListenerHandle { handle }
}
