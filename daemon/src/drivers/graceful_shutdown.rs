use super::driver::Driver;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinSet;

/// Runs drivers until ctrl+c, then tells them to stop and waits for them.
#[derive(Default)]
pub struct GracefulShutdown {
    drivers: Vec<Arc<dyn Driver>>,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_driver(&mut self, driver: impl Driver + 'static) {
        self.drivers.push(Arc::new(driver));
    }

    pub async fn watch(self, stop_notify: Arc<Notify>) {
        self.watch_until(stop_notify, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("cannot listen for ctrl+c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    pub async fn watch_until<S>(mut self, stop_notify: Arc<Notify>, signal: S)
    where
        S: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut join_set = JoinSet::new();
        for driver in self.drivers.drain(..) {
            join_set.spawn(async move {
                debug!("{:?} driver started", driver.get_driver_type());
                driver.run().await;
                debug!("{:?} driver finished", driver.get_driver_type());
            });
        }

        let notify = stop_notify.clone();
        let watcher = tokio::spawn(async move {
            signal.await;
            info!("shutting down");
            notify.notify_waiters();
        });

        debug!("graceful shutdown watching {} driver(s)", join_set.len());
        while let Some(joined) = join_set.join_next().await {
            if let Err(e) = joined {
                error!("driver task failed: {}", e);
            }
        }
        watcher.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::Drivers;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct WaitingDriver {
        stop: Arc<Notify>,
        stopped: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl Driver for WaitingDriver {
        async fn run(&self) {
            self.stop.notified().await;
            self.stopped.store(true, Ordering::SeqCst);
        }

        fn get_driver_type(&self) -> Drivers {
            Drivers::Poller
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_stops_drivers() {
        let stop = Arc::new(Notify::new());
        let stopped = Arc::new(AtomicBool::new(false));
        let mut gs = GracefulShutdown::new();
        gs.add_driver(WaitingDriver {
            stop: stop.clone(),
            stopped: stopped.clone(),
        });

        gs.watch_until(stop, tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert!(stopped.load(Ordering::SeqCst));
    }
}
