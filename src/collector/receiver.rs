//! Collector side of the result channel.

use crate::aggregate::ResultAggregate;
use crate::result::TestResult;
use tracing::trace;

/// Receiving end owned by the collector task.
///
/// # Examples
///
/// ```rust
/// use raster_regress::collector::{result_channel, ChannelConfig};
/// use raster_regress::metric::ComparisonMetric;
/// use raster_regress::result::{TestResult, Verdict};
///
/// let (sender, receiver) = result_channel(&ChannelConfig::unbounded());
/// sender
///     .send_blocking(TestResult::scored("a.xml", "a.ppm.png", 0.99, ComparisonMetric::Ssim, Verdict::Pass))
///     .unwrap();
/// drop(sender);
///
/// let aggregate = tokio_test::block_on(receiver.drain());
/// assert_eq!(aggregate.passes().len(), 1);
/// ```
#[derive(Debug)]
pub struct ResultReceiver {
    receiver: async_channel::Receiver<TestResult>,
}

impl ResultReceiver {
    pub(crate) fn new(receiver: async_channel::Receiver<TestResult>) -> Self {
        Self { receiver }
    }

    /// Collect every result until all senders have been dropped.
    ///
    /// This is the collector task: it is the only owner of the aggregate, so
    /// appends never race.
    pub async fn drain(self) -> ResultAggregate {
        let mut aggregate = ResultAggregate::new();
        while let Ok(result) = self.receiver.recv().await {
            trace!(output = %result.output, verdict = ?result.verdict, "collected result");
            aggregate.push(result);
        }
        aggregate
    }
}
