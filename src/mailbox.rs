//! Per-actor FIFO mailbox with pattern-filtered selective receive and
//! high-water-mark signaling. Mirrors `spinoff`'s `Process.get`/
//! `Process.receive` (a list scanned for the first matching element, with a
//! single outstanding `Deferred` registered when nothing matches), wrapped
//! in riker's `kernel::mailbox`-style Rust idiom: a small owned struct
//! guarded by the cell, not a free-standing actor.

use std::collections::VecDeque;

use tokio::sync::oneshot;

use crate::error::MailboxAwaiterConflict;
use crate::message::{matches, Message, Pattern};

/// Delivered to a suspended `get()`: either the message that satisfied its
/// pattern, or a cancellation injected by `stop()`.
#[derive(Debug)]
pub enum Resolution {
    Matched(Message),
    Cancelled,
}

struct Awaiter {
    pattern: Pattern,
    resolver: oneshot::Sender<Resolution>,
}

/// Outcome of [`Mailbox::take`].
pub enum TakeOutcome {
    Immediate(Message),
    Pending(oneshot::Receiver<Resolution>),
}

/// Fires whenever the queue length crosses a multiple of the configured
/// high-water-mark, i.e. once per `floor(max_queue_len / hwm)` across a run.
#[derive(Debug, Clone, Copy)]
pub struct HighWaterMarkReached {
    pub queue_length: usize,
}

pub struct Mailbox {
    queue: VecDeque<Message>,
    awaiter: Option<Awaiter>,
    high_water_mark: usize,
}

impl Mailbox {
    pub fn new(high_water_mark: usize) -> Self {
        Mailbox {
            queue: VecDeque::new(),
            awaiter: None,
            high_water_mark,
        }
    }

    /// Delivers `message` to the outstanding awaiter if its pattern matches,
    /// otherwise appends it to the queue in arrival order. Returns a
    /// high-water-mark event when the post-enqueue length crosses a multiple
    /// of the configured threshold.
    pub fn enqueue(&mut self, message: Message) -> Option<HighWaterMarkReached> {
        if let Some(awaiter) = &self.awaiter {
            if matches(&awaiter.pattern, &message).is_some() {
                let awaiter = self.awaiter.take().unwrap();
                // The receiver may already be gone (get() was cancelled
                // concurrently); dropping the message in that case is
                // correct, it simply never overtakes further enqueues.
                let _ = awaiter.resolver.send(Resolution::Matched(message));
                return None;
            }
        }

        self.queue.push_back(message);
        let len = self.queue.len();
        if self.high_water_mark > 0 && len % self.high_water_mark == 0 {
            Some(HighWaterMarkReached { queue_length: len })
        } else {
            None
        }
    }

    /// Scans the queue in arrival order for the first message matching
    /// `pattern`. If found, it is removed and returned immediately without
    /// reordering the remaining queue. Otherwise a single awaiter is
    /// registered and a pending handle returned.
    pub fn take(&mut self, pattern: Pattern) -> Result<TakeOutcome, MailboxAwaiterConflict> {
        if self.awaiter.is_some() {
            return Err(MailboxAwaiterConflict);
        }

        let found = self
            .queue
            .iter()
            .position(|m| matches(&pattern, m).is_some());

        if let Some(ix) = found {
            let msg = self.queue.remove(ix).unwrap();
            return Ok(TakeOutcome::Immediate(msg));
        }

        let (tx, rx) = oneshot::channel();
        self.awaiter = Some(Awaiter {
            pattern,
            resolver: tx,
        });
        Ok(TakeOutcome::Pending(rx))
    }

    /// Drops the outstanding awaiter, if any, signalling its pending handle
    /// as cancelled.
    pub fn cancel_awaiter(&mut self) {
        if let Some(awaiter) = self.awaiter.take() {
            let _ = awaiter.resolver.send(Resolution::Cancelled);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Snapshot of the queue contents, for tests and diagnostics.
    pub fn drain(&mut self) -> Vec<Message> {
        self.queue.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_without_awaiter_appends_fifo() {
        let mut mbox = Mailbox::new(10_000);
        mbox.enqueue(Message::Int(1));
        mbox.enqueue(Message::Int(2));
        assert_eq!(mbox.len(), 2);
        assert_eq!(mbox.drain(), vec![Message::Int(1), Message::Int(2)]);
    }

    #[tokio::test]
    async fn selective_receive_leaves_non_matching_messages_in_place() {
        let mut mbox = Mailbox::new(10_000);
        let pattern = Pattern::tuple([Pattern::literal("baz"), Pattern::any()]);

        let rx = match mbox.take(pattern).unwrap() {
            TakeOutcome::Pending(rx) => rx,
            TakeOutcome::Immediate(_) => panic!("queue was empty"),
        };

        mbox.enqueue(Message::tuple([Message::from("foo"), Message::Int(1)]));
        mbox.enqueue(Message::tuple([Message::from("baz"), Message::Int(2)]));

        let bound = rx.await.unwrap();
        match bound {
            Resolution::Matched(m) => {
                assert_eq!(m, Message::tuple([Message::from("baz"), Message::Int(2)]))
            }
            Resolution::Cancelled => panic!("expected a match"),
        }

        // m1 is still queued, untouched.
        match mbox.take(Pattern::any()).unwrap() {
            TakeOutcome::Immediate(m) => {
                assert_eq!(m, Message::tuple([Message::from("foo"), Message::Int(1)]))
            }
            TakeOutcome::Pending(_) => panic!("m1 should still be queued"),
        }
    }

    #[test]
    fn second_get_while_outstanding_is_rejected() {
        let mut mbox = Mailbox::new(10_000);
        let _rx = mbox.take(Pattern::any()).unwrap();
        assert!(mbox.take(Pattern::any()).is_err());
    }

    #[test]
    fn high_water_mark_fires_on_each_crossed_multiple() {
        let mut mbox = Mailbox::new(2);
        assert!(mbox.enqueue(Message::Int(1)).is_none());
        assert!(mbox.enqueue(Message::Int(2)).is_some());
        assert!(mbox.enqueue(Message::Int(3)).is_none());
        assert!(mbox.enqueue(Message::Int(4)).is_some());
    }

    #[tokio::test]
    async fn cancel_awaiter_signals_cancelled() {
        let mut mbox = Mailbox::new(10_000);
        let rx = match mbox.take(Pattern::any()).unwrap() {
            TakeOutcome::Pending(rx) => rx,
            TakeOutcome::Immediate(_) => panic!("queue was empty"),
        };
        mbox.cancel_awaiter();
        match rx.await.unwrap() {
            Resolution::Cancelled => {}
            Resolution::Matched(_) => panic!("expected cancellation"),
        }
    }
}
