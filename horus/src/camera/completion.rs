// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Handing request completions from the camera stack's thread to the capturing thread.
//!
//! The camera stack calls back on a thread it owns whenever a request finishes. That callback only
//! gets a [`CompletionNotifier`], which drops a token into a single-slot channel when the request
//! completed successfully. The capturing thread holds the [`Completion`] and waits on the other
//! end of the channel, with a timeout so a stalled or failing camera can't hang it forever.
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;

use tracing::{trace, warn};

use crate::error::CameraError;

/// How a request finished, as reported by the camera stack.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RequestStatus {
    Complete,
    Cancelled,
}

/// The sending half, given to the camera stack's completion callback.
#[derive(Clone, Debug)]
pub struct CompletionNotifier {
    sender: SyncSender<()>,
}

impl CompletionNotifier {
    /// Report a finished request.
    ///
    /// Only successful completions wake the waiter. Anything else is logged and dropped, which
    /// leaves the waiter to run into its timeout.
    pub fn notify(&self, status: RequestStatus) {
        if status != RequestStatus::Complete {
            warn!(?status, "request did not complete");
            return;
        }
        match self.sender.try_send(()) {
            Ok(()) => trace!("request completed"),
            // There's already an unconsumed completion waiting, which is just as good.
            Err(TrySendError::Full(())) => (),
            Err(TrySendError::Disconnected(())) => {
                warn!("request completed after the capture gave up on it")
            }
        }
    }
}

/// The receiving half, owned by the capture controller.
#[derive(Debug)]
pub struct Completion {
    // Keeping a sender here means the channel never disconnects while we're waiting on it.
    sender: SyncSender<()>,
    receiver: Receiver<()>,
}

impl Completion {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::sync_channel(1);
        Self { sender, receiver }
    }

    pub fn notifier(&self) -> CompletionNotifier {
        CompletionNotifier {
            sender: self.sender.clone(),
        }
    }

    /// Throw away any completion that arrived before the next submission.
    pub fn reset(&self) {
        while self.receiver.try_recv().is_ok() {}
    }

    /// Block until a successful completion arrives, or `timeout` passes.
    pub fn wait(&self, timeout: Duration) -> Result<(), CameraError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                Err(CameraError::CaptureTimeout(timeout))
            }
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use std::thread;
    use std::time::{Duration, Instant};

    use super::{Completion, RequestStatus};
    use crate::error::CameraError;

    const SHORT: Duration = Duration::from_millis(50);

    #[test]
    fn completion_from_another_thread() {
        let completion = Completion::new();
        let notifier = completion.notifier();
        let handle = thread::spawn(move || notifier.notify(RequestStatus::Complete));
        completion.wait(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn failed_request_times_out() {
        let completion = Completion::new();
        let notifier = completion.notifier();
        thread::spawn(move || notifier.notify(RequestStatus::Cancelled))
            .join()
            .unwrap();
        let started = Instant::now();
        let err = completion.wait(SHORT).unwrap_err();
        assert!(matches!(err, CameraError::CaptureTimeout(timeout) if timeout == SHORT));
        assert!(started.elapsed() >= SHORT);
    }

    #[test]
    fn reset_discards_stale_completion() {
        let completion = Completion::new();
        completion.notifier().notify(RequestStatus::Complete);
        completion.reset();
        assert!(matches!(
            completion.wait(SHORT),
            Err(CameraError::CaptureTimeout(_))
        ));
    }

    #[test]
    fn extra_completions_do_not_block() {
        let completion = Completion::new();
        let notifier = completion.notifier();
        // The slot only holds one, the rest are dropped without blocking the notifier.
        for _ in 0..3 {
            notifier.notify(RequestStatus::Complete);
        }
        completion.wait(SHORT).unwrap();
        assert!(completion.wait(SHORT).is_err());
    }
}
