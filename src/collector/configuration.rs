/// Buffering of the channel that carries results from workers to the collector.
///
/// Workers block on a full bounded channel, so a slow collector applies
/// backpressure instead of losing results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Optional buffer size for the channel. If None, the channel is unbounded.
    pub buffer_size: Option<usize>,
}

impl Default for ChannelConfig {
    /// Bounded at 1024 results.
    fn default() -> Self {
        Self {
            buffer_size: Some(1024),
        }
    }
}

impl ChannelConfig {
    pub fn unbounded() -> Self {
        Self { buffer_size: None }
    }

    /// A zero size is treated as a capacity of one.
    pub fn bounded(size: usize) -> Self {
        Self {
            buffer_size: Some(size.max(1)),
        }
    }
}
