use std::fmt;

use tracing::debug;

use crate::Metric;

/// A sink for diagnostics emitted by the server while it runs.
///
/// Reporters are called from the serve loop, so they must not block.
pub trait Reporter: Send + Sync {
    /// Records a debug-level diagnostic message.
    ///
    /// Callers build the message with [`format_args!`], so nothing is allocated unless the reporter decides to keep it.
    fn on_debug(&self, args: fmt::Arguments<'_>);
}

/// A [`Reporter`] that forwards every diagnostic to [`tracing`] at the debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn on_debug(&self, args: fmt::Arguments<'_>) {
        debug!("{}", args);
    }
}

/// The downstream stage that ultimately receives the lines read by the server.
///
/// The server itself only requires that a consumer is present before it starts reading; lines reach the consumer
/// through the transfer channel, drained by the caller.
pub trait MetricsConsumer: Send + Sync {
    /// Consumes a single metric line.
    fn consume(&self, metric: Metric);
}

impl<F> MetricsConsumer for F
where
    F: Fn(Metric) + Send + Sync,
{
    fn consume(&self, metric: Metric) {
        self(metric);
    }
}
