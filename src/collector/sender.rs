//! Worker side of the result channel.

use crate::result::TestResult;

/// Cloneable handle workers use to deliver results.
///
/// The collector stops once every clone has been dropped.
#[derive(Debug, Clone)]
pub struct ResultSender {
    sender: async_channel::Sender<TestResult>,
}

/// The collector is gone; the result is handed back.
#[derive(Debug, thiserror::Error)]
#[error("result channel closed before result for `{}` was delivered", .0.output)]
pub struct SendResultError(pub TestResult);

impl ResultSender {
    pub(crate) fn new(sender: async_channel::Sender<TestResult>) -> Self {
        Self { sender }
    }

    /// Send from a blocking worker thread, waiting for room when the channel is bounded.
    ///
    /// Must not be called from inside an async task.
    pub fn send_blocking(&self, result: TestResult) -> Result<(), SendResultError> {
        self.sender
            .send_blocking(result)
            .map_err(|error| SendResultError(error.into_inner()))
    }
}
