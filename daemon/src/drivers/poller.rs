use super::{Driver, Drivers};
use crate::poller::ReconciliationPoller;
use std::sync::Arc;
use tokio::sync::Notify;

pub struct PollerDriver {
    poller: Arc<ReconciliationPoller>,
    stop_notify: Arc<Notify>,
}

impl PollerDriver {
    pub fn new(poller: Arc<ReconciliationPoller>, stop_notify: Arc<Notify>) -> Self {
        Self {
            poller,
            stop_notify,
        }
    }
}

#[async_trait::async_trait]
impl Driver for PollerDriver {
    async fn run(&self) {
        self.poller.run(self.stop_notify.clone()).await;
    }

    fn get_driver_type(&self) -> Drivers {
        Drivers::Poller
    }
}
