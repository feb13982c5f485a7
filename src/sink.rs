//! Delivering messages to channels.

use crate::error::{Result, WatchError};
use async_trait::async_trait;
use std::time::Duration;

/// Destination for reports, alerts and command replies.
///
/// Implement this for a messaging transport. Each call delivers one message
/// to one channel; batching and failure aggregation live in [`broadcast`].
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `text` to `channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects or cannot reach the channel.
    async fn send(&self, channel: &str, text: &str) -> Result<()>;
}

/// Send one message with a delivery budget.
///
/// # Errors
///
/// Returns the transport error, or [`WatchError::Timeout`] when the budget
/// runs out.
pub async fn send_with_timeout(
    sink: &dyn NotificationSink,
    channel: &str,
    text: &str,
    timeout: Duration,
) -> Result<()> {
    match tokio::time::timeout(timeout, sink.send(channel, text)).await {
        Ok(result) => result,
        Err(_) => Err(WatchError::Timeout {
            operation: format!("Sending to channel {}", channel),
            elapsed: timeout,
        }),
    }
}

/// Send `text` to every channel in order.
///
/// A failing channel is recorded and the remaining channels are still
/// attempted. Returns one error per channel that failed.
pub async fn broadcast(
    sink: &dyn NotificationSink,
    channels: &[String],
    text: &str,
    timeout: Duration,
) -> Vec<WatchError> {
    let mut errors = Vec::new();
    let mut delivered = 0usize;

    for channel in channels {
        match send_with_timeout(sink, channel, text, timeout).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "Delivery failed");
                errors.push(e);
            }
        }
    }

    tracing::debug!(delivered, failed = errors.len(), "Broadcast finished");
    errors
}

/// Sink that writes every message to the log instead of delivering it.
///
/// Useful for dry runs and for the console demo.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn send(&self, channel: &str, text: &str) -> Result<()> {
        tracing::info!(channel = %channel, "{}", text);
        Ok(())
    }
}
