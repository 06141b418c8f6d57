//! Progress reporting
//!
//! A scrape run emits one human-readable line per meaningful step. Lines go
//! to the tracing log and, when a [`ProgressStream`] is attached, to its
//! consumer.

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Sending half of the progress channel
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<UnboundedSender<String>>,
}

/// Receiving half of the progress channel
///
/// Finite and non-restartable: it yields every message sent during the run
/// and ends once the reporter and all its clones are dropped.
#[derive(Debug)]
pub struct ProgressStream {
    rx: UnboundedReceiver<String>,
}

impl ProgressReporter {
    /// Creates a connected reporter and stream
    pub fn channel() -> (ProgressReporter, ProgressStream) {
        let (tx, rx) = unbounded_channel();
        (ProgressReporter { tx: Some(tx) }, ProgressStream { rx })
    }

    /// A reporter that only logs
    pub fn log_only() -> Self {
        Self { tx: None }
    }

    /// Emits a progress message
    pub fn report(&self, message: impl Into<String>) {
        let message = message.into();

        match &self.tx {
            Some(tx) => {
                // The listener shows the message, the log keeps a quiet copy
                tracing::debug!("{}", message);
                // A dropped stream only means nobody is listening
                let _ = tx.send(message);
            }
            None => tracing::info!("{}", message),
        }
    }
}

impl ProgressStream {
    /// Waits for the next message; `None` once the run is over
    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_ends_when_reporter_dropped() {
        let (reporter, mut stream) = ProgressReporter::channel();
        reporter.report("Logging in");
        reporter.report(format!("Page {}", 1));
        drop(reporter);

        assert_eq!(stream.next().await.as_deref(), Some("Logging in"));
        assert_eq!(stream.next().await.as_deref(), Some("Page 1"));
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn test_report_without_listener() {
        let (reporter, stream) = ProgressReporter::channel();
        drop(stream);
        reporter.report("nobody listens");
        ProgressReporter::log_only().report("only logged");
    }
}
