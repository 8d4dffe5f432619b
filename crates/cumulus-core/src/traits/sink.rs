//! Realtime progress sink trait.

use async_trait::async_trait;

use crate::events::job::JobEvent;

/// Consumer of job lifecycle events — the seam to the realtime
/// notification transport, which is an external collaborator.
///
/// Delivery is fire-and-forget: the engine never fails a job because an
/// event could not be delivered.
#[async_trait]
pub trait ProgressSink: Send + Sync + std::fmt::Debug + 'static {
    /// Deliver a job event.
    async fn publish(&self, event: JobEvent);
}

/// A sink that logs events at debug level, used when no realtime
/// transport is attached.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl ProgressSink for LogSink {
    async fn publish(&self, event: JobEvent) {
        let (kind, job_id) = event.job();
        tracing::debug!(kind = %kind, job_id = %job_id, event = ?event, "Job event");
    }
}
