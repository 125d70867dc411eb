//! Ordered delivery onto the worker's stdin.
//!
//! Frames go into a bounded channel drained by the writer thread. When the
//! channel reports full, the sender stops sending directly and queues frames
//! in FIFO order until the writer signals that it drained what it had.
//! Nothing is dropped and nothing overtakes a queued frame.

use std::collections::VecDeque;

use crossbeam_channel::{Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::CheckerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SendPolicy {
    /// Send directly while the channel has room.
    #[default]
    Direct,
    /// Treat every send as having filled the channel: at most one frame is
    /// outstanding between drain notifications.
    Conservative,
}

impl SendPolicy {
    /// Conservative on Windows, where pipe writes to a busy child are known to
    /// stall.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            SendPolicy::Conservative
        } else {
            SendPolicy::Direct
        }
    }
}

#[derive(Debug)]
struct QueueState {
    free: bool,
    queue: VecDeque<Vec<u8>>,
}

#[derive(Debug)]
pub struct QueuedSender {
    tx: Sender<Vec<u8>>,
    policy: SendPolicy,
    state: Mutex<QueueState>,
}

impl QueuedSender {
    pub fn new(tx: Sender<Vec<u8>>, policy: SendPolicy) -> Self {
        Self {
            tx,
            policy,
            state: Mutex::new(QueueState {
                free: true,
                queue: VecDeque::new(),
            }),
        }
    }

    pub fn policy(&self) -> SendPolicy {
        self.policy
    }

    /// Deliver `frame`, or queue it behind earlier frames.
    pub fn send(&self, frame: Vec<u8>) -> Result<(), CheckerError> {
        let mut state = self.state.lock();
        if !state.free {
            trace!(queued = state.queue.len() + 1, "channel busy, queueing frame");
            state.queue.push_back(frame);
            return Ok(());
        }

        match self.tx.try_send(frame) {
            Ok(()) => {
                if self.policy == SendPolicy::Conservative {
                    state.free = false;
                }
                Ok(())
            }
            Err(TrySendError::Full(frame)) => {
                trace!("channel full, queueing frame");
                state.free = false;
                state.queue.push_back(frame);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(CheckerError::WorkerExited),
        }
    }

    /// Drain notification from the writer: flush queued frames in order until
    /// the channel fills again.
    pub fn on_drained(&self) {
        let mut state = self.state.lock();
        while let Some(frame) = state.queue.pop_front() {
            match self.tx.try_send(frame) {
                Ok(()) => {
                    if self.policy == SendPolicy::Conservative {
                        return;
                    }
                }
                Err(TrySendError::Full(frame)) => {
                    state.queue.push_front(frame);
                    return;
                }
                Err(TrySendError::Disconnected(_)) => {
                    state.queue.clear();
                    return;
                }
            }
        }
        state.free = true;
    }

    pub fn is_free(&self) -> bool {
        self.state.lock().free
    }

    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }
}

#[cfg(test)]
#[path = "../tests/queued_sender_tests.rs"]
mod queued_sender_tests;
