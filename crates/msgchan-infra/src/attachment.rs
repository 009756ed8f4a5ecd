//! Handle for the background tasks that pump a transport.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TransportError;

/// Pump tasks attached to one channel endpoint.
///
/// Dropping the attachment leaves the tasks running; they stop on their own
/// once the transport closes or the channel is dropped. Use
/// [`close`](Self::close) to stop them early.
pub struct Attachment {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<Result<(), TransportError>>>,
}

impl Attachment {
    pub(crate) fn new(
        cancel: CancellationToken,
        tasks: Vec<JoinHandle<Result<(), TransportError>>>,
    ) -> Self {
        Self { cancel, tasks }
    }

    /// Ask every pump task to stop.
    pub fn close(&self) {
        debug!(tasks = self.tasks.len(), "closing transport attachment");
        self.cancel.cancel();
    }

    /// True once every pump task has finished.
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|task| task.is_finished())
    }

    /// Wait for every pump task and return the first error, if any.
    pub async fn closed(self) -> Result<(), TransportError> {
        let mut first_error = None;
        for task in self.tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(join_err) => Err(TransportError::Task(join_err.to_string())),
            };
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("tasks", &self.tasks.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
