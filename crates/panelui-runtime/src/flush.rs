#![forbid(unsafe_code)]

//! Threaded hardware flush.
//!
//! The compute loop never blocks on the panel bus: composited bytes are
//! handed to a dedicated thread through a single-slot mailbox. The
//! producer holds the lock only long enough to swap the job in; pixel
//! extraction happens before, bus I/O after, both outside the lock.
//!
//! The mailbox holds one job. Submitting while a job is still pending
//! displaces it and returns it to the caller, which folds the displaced
//! rect back into the next frame's stale area; nothing is silently
//! dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use panelui_core::geometry::Rect;

use crate::drivers::{DriverError, PanelDriver};

/// One region's worth of packed pixel bytes bound for the panel.
#[derive(Debug, Clone)]
pub struct FlushJob {
    /// Panel window to write.
    pub rect: Rect,
    /// Row-major bytes exactly covering `rect`.
    pub bytes: Vec<u8>,
}

struct Mailbox {
    job: Mutex<Option<FlushJob>>,
    ready: Condvar,
    stop: AtomicBool,
    last_error: Mutex<Option<DriverError>>,
}

/// Handle to the panel-writer thread.
pub struct FlushThread {
    mailbox: Arc<Mailbox>,
    worker: Option<JoinHandle<()>>,
}

impl FlushThread {
    /// Move `panel` onto a new writer thread.
    #[must_use]
    pub fn spawn(mut panel: impl PanelDriver + Send + 'static) -> Self {
        let mailbox = Arc::new(Mailbox {
            job: Mutex::new(None),
            ready: Condvar::new(),
            stop: AtomicBool::new(false),
            last_error: Mutex::new(None),
        });
        let shared = mailbox.clone();
        let worker = std::thread::Builder::new()
            .name("panel-flush".into())
            .spawn(move || {
                loop {
                    let job = {
                        let Ok(mut slot) = shared.job.lock() else {
                            return;
                        };
                        loop {
                            if shared.stop.load(Ordering::Acquire) {
                                return;
                            }
                            if let Some(job) = slot.take() {
                                break job;
                            }
                            slot = match shared.ready.wait(slot) {
                                Ok(guard) => guard,
                                Err(_) => return,
                            };
                        }
                    };
                    // Bus I/O runs with the mailbox unlocked.
                    if let Err(err) = panel.refresh(job.rect, &job.bytes) {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(error = %err, "panel refresh failed");
                        if let Ok(mut last) = shared.last_error.lock() {
                            *last = Some(err);
                        }
                    }
                }
            })
            .ok();
        Self {
            mailbox,
            worker,
        }
    }

    /// Swap a job into the mailbox and wake the writer.
    ///
    /// Returns the displaced pending job, if the writer had not picked
    /// the previous one up yet.
    pub fn submit(&self, job: FlushJob) -> Option<FlushJob> {
        let displaced = match self.mailbox.job.lock() {
            Ok(mut slot) => slot.replace(job),
            Err(_) => None,
        };
        self.mailbox.ready.notify_one();
        displaced
    }

    /// The most recent refresh failure, cleared on read.
    #[must_use]
    pub fn take_error(&self) -> Option<DriverError> {
        self.mailbox
            .last_error
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
    }

    /// Stop the writer after its current refresh and join it.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.mailbox.stop.store(true, Ordering::Release);
        self.mailbox.ready.notify_one();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for FlushThread {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use panelui_core::geometry::Size;

    use super::*;

    /// Panel forwarding refreshes over a channel so tests can observe
    /// the worker from outside.
    struct ChannelPanel {
        tx: mpsc::Sender<(Rect, usize)>,
        fail: bool,
    }

    impl PanelDriver for ChannelPanel {
        fn size(&self) -> Size {
            Size::new(100, 100)
        }

        fn refresh(&mut self, rect: Rect, bytes: &[u8]) -> Result<(), DriverError> {
            let _ = self.tx.send((rect, bytes.len()));
            if self.fail {
                Err(DriverError::new("bus fault"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn jobs_reach_the_panel_thread() {
        let (tx, rx) = mpsc::channel();
        let flush = FlushThread::spawn(ChannelPanel { tx, fail: false });
        let rect = Rect::new(2, 3, 4, 5);
        let displaced = flush.submit(FlushJob {
            rect,
            bytes: vec![0; 4 * 5 * 2],
        });
        assert!(displaced.is_none());

        let (seen, len) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(seen, rect);
        assert_eq!(len, 40);
        flush.shutdown();
    }

    #[test]
    fn refresh_errors_are_captured_not_fatal() {
        let (tx, rx) = mpsc::channel();
        let flush = FlushThread::spawn(ChannelPanel { tx, fail: true });
        flush.submit(FlushJob {
            rect: Rect::new(0, 0, 1, 1),
            bytes: vec![0; 2],
        });
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        // Give the worker a moment to record the error.
        let mut err = None;
        for _ in 0..50 {
            err = flush.take_error();
            if err.is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(err, Some(DriverError::new("bus fault")));
        flush.shutdown();
    }

    #[test]
    fn shutdown_joins_cleanly_with_no_work() {
        let (tx, _rx) = mpsc::channel();
        let flush = FlushThread::spawn(ChannelPanel { tx, fail: false });
        flush.shutdown();
    }
}
