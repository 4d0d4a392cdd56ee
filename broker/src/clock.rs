//! Periodic polling of the broker's clock.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, select, tick};
use log::{error, info};
use tradelink::Timestamp;

use crate::error::BrokerError;
use crate::hub::EventHub;

/// Background thread that asks the backend for its time every `interval`
/// and publishes the answer to time-update listeners.
///
/// Poll failures go to broker-error listeners; polling continues.
pub struct TimeSync {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl TimeSync {
    pub fn start<F>(interval: Duration, hub: EventHub, poll: F) -> Result<Self, BrokerError>
    where
        F: Fn() -> Result<Timestamp, BrokerError> + Send + 'static,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let ticker = tick(interval);
        let handle = thread::Builder::new()
            .name("time-sync".into())
            .spawn(move || {
                loop {
                    let due = select! {
                        recv(stop_rx) -> _ => false,
                        recv(ticker) -> _ => true,
                    };
                    if !due {
                        break;
                    }
                    match poll() {
                        Ok(time) => hub.publish_time(time),
                        Err(e) => hub.report_error(e),
                    }
                }
            })
            .map_err(|e| BrokerError::Other(format!("failed to spawn time sync: {e}")))?;

        info!("time sync every {interval:?}");
        Ok(Self {
            stop_tx,
            handle: Some(handle),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.stop_tx.try_send(());
        if handle.thread().id() != thread::current().id() && handle.join().is_err() {
            error!("time sync thread panicked");
        }
    }
}

impl Drop for TimeSync {
    fn drop(&mut self) {
        self.stop();
    }
}
