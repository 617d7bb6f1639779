//! A minimal channel probe for scenario tests, standing in for riker's
//! `riker_testkit::probe::channel::ChannelProbe` without pulling in that
//! crate: record events from inside actor bodies/handlers and assert on
//! them from the driving test, bounded by a timeout so a test never hangs
//! forever on a bug.

use std::time::Duration;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub struct Probe<T>(UnboundedSender<T>);

impl<T> Clone for Probe<T> {
    fn clone(&self) -> Self {
        Probe(self.0.clone())
    }
}

impl<T: Send + 'static> Probe<T> {
    pub fn event(&self, value: T) {
        let _ = self.0.send(value);
    }
}

pub fn probe<T>() -> (Probe<T>, UnboundedReceiver<T>) {
    let (tx, rx) = unbounded_channel();
    (Probe(tx), rx)
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn expect<T>(rx: &mut UnboundedReceiver<T>) -> T {
    tokio::time::timeout(DEFAULT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for probe event")
        .expect("probe channel closed before sending an event")
}
