//! Single background thread that runs purge jobs one after another.
//!
//! Event handlers must not block on host enumeration or close calls, so
//! triggers are queued here. Jobs run in submission order; bursts of
//! triggers queue up instead of overlapping.

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use crate::dispatcher::{PurgeTrigger, ServiceCore};
use crate::error::{Result, TidyError};

enum Job {
    Purge(PurgeTrigger),
    Flush(Sender<()>),
}

pub(crate) struct PurgeWorker {
    sender: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl PurgeWorker {
    pub(crate) fn spawn(core: Arc<ServiceCore>) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name("tidytabs-purge".to_string())
            .spawn(move || {
                for job in receiver {
                    match job {
                        Job::Purge(trigger) => {
                            core.run_trigger(trigger);
                        }
                        Job::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
                debug!("Purge worker stopped");
            })
            .map_err(|source| TidyError::Io {
                context: "spawning purge worker".to_string(),
                source,
            })?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    pub(crate) fn submit(&self, trigger: PurgeTrigger) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(Job::Purge(trigger)).is_err() {
            warn!(trigger = ?trigger, "Purge worker is gone; trigger dropped");
        }
    }

    /// Blocks until every job submitted before this call has finished.
    pub(crate) fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (done_tx, done_rx) = mpsc::channel();
        if sender.send(Job::Flush(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }
}

impl Drop for PurgeWorker {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is queued and exit.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Purge worker panicked");
            }
        }
    }
}
