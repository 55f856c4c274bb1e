//! Background mail queue.
//!
//! Handlers enqueue jobs and return immediately. A single worker task owned by
//! the process delivers them through a [`Mailer`]; delivery failures are
//! logged and dropped. The queue is bounded; when it is full new jobs are
//! logged and dropped rather than buffered. On shutdown the queue stops accepting jobs, drains what
//! is buffered, and is cancelled outright once the grace period runs out.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::mailer::Mailer;

/// Backlog size used by the server binary.
pub const DEFAULT_MAIL_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum MailJob {
    Confirmation {
        to: String,
        username: String,
        base_url: String,
        token: String,
    },
    PasswordReset {
        to: String,
        base_url: String,
        token: String,
    },
}

impl MailJob {
    fn recipient(&self) -> &str {
        match self {
            MailJob::Confirmation { to, .. } | MailJob::PasswordReset { to, .. } => to,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            MailJob::Confirmation { .. } => "confirmation",
            MailJob::PasswordReset { .. } => "password_reset",
        }
    }
}

/// Sending half, cloned into request state.
#[derive(Clone)]
pub struct MailQueue {
    tx: mpsc::Sender<MailJob>,
}

impl MailQueue {
    /// Spawn the worker on the current runtime. At most `capacity` jobs wait
    /// behind the one being delivered.
    pub fn start(mailer: Arc<dyn Mailer>, capacity: usize) -> (MailQueue, MailWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let draining = CancellationToken::new();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(rx, mailer, draining.clone(), cancel.clone()));
        (
            MailQueue { tx },
            MailWorker {
                handle,
                draining,
                cancel,
            },
        )
    }

    /// Fire-and-forget. Never blocks and never fails the caller.
    pub fn enqueue(&self, job: MailJob) {
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                warn!(to = %job.recipient(), kind = job.kind(), "mail queue full, dropping email");
            }
            Err(TrySendError::Closed(job)) => {
                warn!(to = %job.recipient(), kind = job.kind(), "mail queue closed, dropping email");
            }
        }
    }
}

/// Owner handle for the worker task.
pub struct MailWorker {
    handle: JoinHandle<()>,
    draining: CancellationToken,
    cancel: CancellationToken,
}

impl MailWorker {
    /// Stop accepting jobs, deliver the backlog, and cancel whatever is left
    /// after `grace`.
    pub async fn shutdown(self, grace: Duration) {
        self.draining.cancel();
        let mut handle = self.handle;
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            warn!("mail queue did not drain in time, cancelling");
            self.cancel.cancel();
            let _ = handle.await;
        }
    }
}

async fn run(
    mut rx: mpsc::Receiver<MailJob>,
    mailer: Arc<dyn Mailer>,
    draining: CancellationToken,
    cancel: CancellationToken,
) {
    let mut closed = false;
    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = draining.cancelled(), if !closed => {
                rx.close();
                closed = true;
                continue;
            }
            job = rx.recv() => job,
        };
        let Some(job) = job else { break };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(to = %job.recipient(), kind = job.kind(), "mail delivery cancelled");
                break;
            }
            _ = deliver(mailer.as_ref(), &job) => {}
        }
    }
    debug!("mail worker stopped");
}

async fn deliver(mailer: &dyn Mailer, job: &MailJob) {
    let result = match job {
        MailJob::Confirmation {
            to,
            username,
            base_url,
            token,
        } => mailer.send_confirmation(to, username, base_url, token).await,
        MailJob::PasswordReset {
            to,
            base_url,
            token,
        } => mailer.send_password_reset(to, base_url, token).await,
    };
    match result {
        Ok(()) => debug!(to = %job.recipient(), kind = job.kind(), "email sent"),
        Err(e) => warn!(to = %job.recipient(), kind = job.kind(), error = %e, "email delivery failed"),
    }
}
