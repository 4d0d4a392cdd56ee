//! Serial delivery of order events on a dedicated thread.
//!
//! Backends push events into an unbounded queue from whatever thread they
//! run on. One worker drains the queue and hands each event to every
//! order-event listener before taking the next, so listeners observe events
//! in exactly the order they were pushed.
//!
//! Shutdown travels through the same queue as a stop marker.
//! A worker stops reading at its marker, so whatever follows belongs to
//! the next worker, which only begins once its predecessor has exited.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info};
use tradelink::OrderEvent;

use crate::error::BrokerError;
use crate::hub::Shared;

/// What travels on the order-event queue.
#[derive(Debug)]
pub(crate) enum Inbox {
    Event(OrderEvent),
    /// The worker that reads this exits.
    Stop,
}

struct Worker {
    stopping: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    /// Disconnects when the worker thread exits.
    exited: Receiver<()>,
}

/// A signalled worker that may still be finishing its current event.
///
/// Join it with no locks held: a listener on the worker may call back into
/// the client.
pub(crate) struct Retired {
    handle: JoinHandle<()>,
}

impl Retired {
    /// Wait for the worker to exit. Returns at once on the worker itself.
    pub(crate) fn join(self) {
        if self.handle.thread().id() == thread::current().id() {
            debug!("order event processor stopped from its own thread");
        } else if self.handle.join().is_err() {
            error!("order event processor thread panicked");
        }
    }
}

/// Owns the order-event queue and the thread that drains it.
///
/// The queue outlives the worker: events pushed while the processor is
/// stopped wait for the next `start`. Events queued when `stop` is called
/// are discarded.
pub struct OrderEventProcessor {
    shared: Arc<Shared>,
    sender: Sender<Inbox>,
    receiver: Receiver<Inbox>,
    worker: Option<Worker>,
    previous: Option<Receiver<()>>,
}

impl OrderEventProcessor {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            shared,
            sender,
            receiver,
            worker: None,
            previous: None,
        }
    }

    pub(crate) fn sender(&self) -> Sender<Inbox> {
        self.sender.clone()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Messages waiting in the queue, stop markers included.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Spawn the worker thread.
    ///
    /// If a previous worker is still finishing, the new one waits for it
    /// before reading the queue.
    pub fn start(&mut self) -> Result<(), BrokerError> {
        if self.worker.is_some() {
            return Err(BrokerError::ProcessorRunning);
        }
        let stopping = Arc::new(AtomicBool::new(false));
        let (exit_tx, exited) = crossbeam_channel::bounded::<()>(0);
        let shared = Arc::clone(&self.shared);
        let inbox = self.receiver.clone();
        let flag = Arc::clone(&stopping);
        let previous = self.previous.take();

        let handle = thread::Builder::new()
            .name("order-events".into())
            .spawn(move || {
                let _exit = exit_tx;
                if let Some(previous) = previous {
                    // Only ever disconnects; no message is sent.
                    let _ = previous.recv();
                }
                run(&shared, &inbox, &flag);
            })
            .map_err(|e| BrokerError::Other(format!("failed to spawn dispatcher: {e}")))?;

        info!("order event processor started");
        self.worker = Some(Worker {
            stopping,
            handle,
            exited,
        });
        Ok(())
    }

    /// Signal the worker to stop without waiting for it.
    ///
    /// Events queued from now until the worker reaches its stop marker are
    /// discarded. The caller joins the returned worker once it has released
    /// any lock a listener might need.
    pub(crate) fn retire(&mut self) -> Option<Retired> {
        let worker = self.worker.take()?;
        worker.stopping.store(true, Ordering::SeqCst);
        if self.sender.send(Inbox::Stop).is_err() {
            error!("order event queue closed while stopping");
        }
        self.previous = Some(worker.exited);
        Some(Retired {
            handle: worker.handle,
        })
    }

    /// Stop the worker and discard events still queued.
    ///
    /// The event being delivered when `stop` is called finishes first.
    /// Safe to call from a listener running on the worker itself; the join
    /// is skipped in that case.
    pub fn stop(&mut self) {
        if let Some(retired) = self.retire() {
            retired.join();
        }
    }
}

impl Drop for OrderEventProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &Shared, inbox: &Receiver<Inbox>, stopping: &AtomicBool) {
    let mut discarded = 0usize;
    for message in inbox.iter() {
        match message {
            Inbox::Stop => break,
            Inbox::Event(event) if stopping.load(Ordering::SeqCst) => {
                debug!("discarding event for order {} after stop", event.order_id);
                discarded += 1;
            }
            Inbox::Event(event) => shared.dispatch(&event),
        }
    }
    if discarded > 0 {
        info!("order event processor stopped, {discarded} queued events discarded");
    } else {
        info!("order event processor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use chrono::Utc;
    use parking_lot::Mutex;
    use tradelink::OrderId;

    fn wait_for(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn delivers_in_push_order() {
        let shared = Arc::new(Shared::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for name in ["l1", "l2"] {
            let seen = Arc::clone(&seen);
            shared
                .order_listeners
                .add(Arc::new(move |e: &OrderEvent| -> anyhow::Result<()> {
                    seen.lock().push(format!("{name}(E{})", e.order_id));
                    Ok(())
                }));
        }

        let mut processor = OrderEventProcessor::new(Arc::clone(&shared));
        let tx = processor.sender();
        processor.start().unwrap();
        let now = Utc::now();
        tx.send(Inbox::Event(OrderEvent::submitted(OrderId(1), now))).unwrap();
        tx.send(Inbox::Event(OrderEvent::submitted(OrderId(2), now))).unwrap();

        wait_for(|| seen.lock().len() == 4);
        assert_eq!(*seen.lock(), vec!["l1(E1)", "l2(E1)", "l1(E2)", "l2(E2)"]);
        processor.stop();
        assert!(!processor.is_running());
    }

    #[test]
    fn double_start_fails_and_restart_works() {
        let shared = Arc::new(Shared::default());
        let mut processor = OrderEventProcessor::new(shared);
        processor.start().unwrap();
        assert!(matches!(processor.start(), Err(BrokerError::ProcessorRunning)));
        processor.stop();
        processor.stop();
        processor.start().unwrap();
        assert!(processor.is_running());
    }

    #[test]
    fn events_wait_until_started() {
        let shared = Arc::new(Shared::default());
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        shared
            .order_listeners
            .add(Arc::new(move |_: &OrderEvent| -> anyhow::Result<()> {
                *c.lock() += 1;
                Ok(())
            }));

        let mut processor = OrderEventProcessor::new(shared);
        let tx = processor.sender();
        tx.send(Inbox::Event(OrderEvent::submitted(OrderId(7), Utc::now())))
            .unwrap();
        assert_eq!(processor.pending(), 1);

        processor.start().unwrap();
        wait_for(|| *count.lock() == 1);
        assert_eq!(processor.pending(), 0);
    }

    #[test]
    fn stop_discards_queue() {
        let shared = Arc::new(Shared::default());
        let mut processor = OrderEventProcessor::new(shared);
        let tx = processor.sender();
        for id in 0..10 {
            tx.send(Inbox::Event(OrderEvent::submitted(OrderId(id), Utc::now())))
                .unwrap();
        }
        processor.stop();
        assert_eq!(processor.pending(), 10);

        processor.start().unwrap();
        processor.stop();
        assert_eq!(processor.pending(), 0);
    }
}
