//! Result collection
//!
//! Workers never touch the aggregate directly. They send each result over
//! an `async_channel` to a single collector task that owns the pass and fail
//! collections.

pub mod configuration;
pub mod receiver;
pub mod sender;

pub use configuration::ChannelConfig;
pub use receiver::ResultReceiver;
pub use sender::{ResultSender, SendResultError};

use crate::aggregate::ResultAggregate;
use tokio::task::JoinHandle;

/// Create a connected sender/receiver pair.
pub fn result_channel(config: &ChannelConfig) -> (ResultSender, ResultReceiver) {
    let (sender, receiver) = match config.buffer_size {
        Some(size) => async_channel::bounded(size),
        None => async_channel::unbounded(),
    };
    (ResultSender::new(sender), ResultReceiver::new(receiver))
}

/// Run the collector on the runtime; the handle resolves once all senders are dropped.
pub fn spawn_collector(receiver: ResultReceiver) -> JoinHandle<ResultAggregate> {
    tokio::spawn(receiver.drain())
}
