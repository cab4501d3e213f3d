//! Background task that redraws a percentage line until the run completes.

use super::ProgressCounter;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

/// Polling reporter over a [`ProgressCounter`].
///
/// Every `interval` it rewrites the current line of `output` with
/// `\rProgress: NN.NN% (done/max)`. Once stopped it draws one last line and
/// ends it with a newline.
pub struct ProgressReporter<W> {
    counter: ProgressCounter,
    interval: Duration,
    output: W,
}

impl<W: Write + Send + 'static> ProgressReporter<W> {
    pub fn new(counter: ProgressCounter, interval: Duration, output: W) -> Self {
        Self {
            counter,
            interval,
            output,
        }
    }

    pub fn status_line(counter: &ProgressCounter) -> String {
        format!(
            "\rProgress: {:6.2}% ({}/{})",
            counter.percentage(),
            counter.completed(),
            counter.max()
        )
    }

    fn draw(&mut self) {
        let line = Self::status_line(&self.counter);
        if let Err(error) = self
            .output
            .write_all(line.as_bytes())
            .and_then(|_| self.output.flush())
        {
            warn!(%error, "failed to draw progress line");
        }
    }

    async fn run(mut self, done: Arc<AtomicBool>, wake: Arc<Notify>) -> W {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !done.load(Ordering::Acquire) {
            tokio::select! {
                _ = ticker.tick() => self.draw(),
                _ = wake.notified() => {}
            }
        }

        self.draw();
        let _ = writeln!(self.output);
        let _ = self.output.flush();
        self.output
    }

    /// Start the reporter on the runtime.
    pub fn spawn(self) -> ReporterHandle<W> {
        let done = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let task = tokio::spawn(self.run(Arc::clone(&done), Arc::clone(&wake)));
        ReporterHandle { done, wake, task }
    }
}

/// Owner's side of a running reporter.
pub struct ReporterHandle<W> {
    done: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: JoinHandle<W>,
}

impl<W> ReporterHandle<W> {
    /// Set the completion flag and wait until the reporter has drawn its final line.
    ///
    /// Returns the reporter's output sink, or `None` if the task panicked.
    pub async fn stop(self) -> Option<W> {
        self.done.store(true, Ordering::Release);
        self.wake.notify_one();
        match self.task.await {
            Ok(output) => Some(output),
            Err(error) => {
                warn!(%error, "progress reporter task failed");
                None
            }
        }
    }
}
