//! Generic debounce primitive used by the Cache & Debouncer (section 4.7).
//! Re-triggering before the quiet window elapses resets the window;
//! triggers arriving while the callback itself is running are queued and
//! open a fresh window as soon as it completes.

use std::{future::Future, time::Duration};

use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedSender},
    task::AbortHandle,
    time::timeout,
};

pub(crate) struct Debounced {
    sender: UnboundedSender<()>,
    handle: AbortHandle,
}

impl Debounced {
    pub(crate) fn new<F, Fut>(delay_ms: u64, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (sender, mut receiver) = unbounded_channel::<()>();
        let delay = Duration::from_millis(delay_ms);

        let join = tokio::spawn(async move {
            loop {
                if receiver.recv().await.is_none() {
                    return;
                }

                loop {
                    match timeout(delay, receiver.recv()).await {
                        Ok(Some(())) => continue,
                        Ok(None) => return,
                        Err(_) => break,
                    }
                }

                callback().await;
            }
        });

        Self {
            sender,
            handle: join.abort_handle(),
        }
    }

    pub(crate) fn trigger(&self) {
        if self.sender.send(()).is_err() {
            tracing::error!("Debounce loop has already stopped");
        }
    }
}

impl Drop for Debounced {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use tokio::time::sleep;

    use super::Debounced;

    #[tokio::test(flavor = "multi_thread")]
    async fn coalesces_bursts() {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();

        let debounced = Debounced::new(50, move || {
            let count = counted.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });

        debounced.trigger();
        sleep(Duration::from_millis(10)).await;
        debounced.trigger();
        sleep(Duration::from_millis(10)).await;
        debounced.trigger();

        sleep(Duration::from_millis(150)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
