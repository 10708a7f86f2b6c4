//! Notification stream for the panel's message area.
//!
//! Publishing never blocks: when the subscriber falls behind, events are
//! dropped and counted instead of stalling the session.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, PanelError, PanelResult};

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Successful outcome.
    Info,
    /// Rejected input the user can fix.
    Warning,
    /// Failed load or engine call.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// One message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity.
    pub severity: Severity,
    /// Short heading.
    pub title: String,
    /// Body text.
    pub message: String,
    /// When it was published.
    pub at: DateTime<Utc>,
}

impl Notification {
    /// Creates a notification stamped now.
    #[must_use]
    pub fn new(severity: Severity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Publishing side of the stream.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Sender<Notification>,
    dropped: Arc<AtomicU64>,
}

impl Notifier {
    /// Creates a notifier and its stream with the given buffer size.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, NotificationStream) {
        let (tx, rx) = bounded(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        (
            Self {
                tx,
                dropped: Arc::clone(&dropped),
            },
            NotificationStream { rx, dropped },
        )
    }

    /// Publishes without blocking.
    ///
    /// Returns false if the event was dropped.
    pub fn publish(&self, notification: Notification) -> bool {
        match self.tx.try_send(notification) {
            Ok(()) => true,
            Err(TrySendError::Full(n)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(title = %n.title, "notification buffer full; dropping");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Publishes an info notification.
    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) -> bool {
        self.publish(Notification::new(Severity::Info, title, message))
    }

    /// Publishes a warning notification.
    pub fn warning(&self, title: impl Into<String>, message: impl Into<String>) -> bool {
        self.publish(Notification::new(Severity::Warning, title, message))
    }

    /// Publishes an error notification.
    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) -> bool {
        self.publish(Notification::new(Severity::Error, title, message))
    }
}

/// Receiving side of the stream.
#[derive(Debug)]
pub struct NotificationStream {
    rx: Receiver<Notification>,
    dropped: Arc<AtomicU64>,
}

impl NotificationStream {
    /// Receive the next notification (blocking).
    pub fn recv(&self) -> PanelResult<Notification> {
        self.rx.recv().map_err(|_| PanelError::from(DispatchError::Disconnected))
    }

    /// Receive the next notification with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> PanelResult<Notification> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => PanelError::from(DispatchError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            RecvTimeoutError::Disconnected => PanelError::from(DispatchError::Disconnected),
        })
    }

    /// Takes everything currently buffered.
    pub fn drain(&self) -> Vec<Notification> {
        self.rx.try_iter().collect()
    }

    /// Number of notifications dropped because the buffer was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn published_notifications_arrive_in_order() {
        let (notifier, stream) = Notifier::channel(8);
        notifier.warning("Missing selection", "Please select at least one variable in R");
        notifier.info("Reset", "Selections cleared");

        let got = stream.drain();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].severity, Severity::Warning);
        assert_eq!(got[1].title, "Reset");
    }

    #[test]
    fn full_buffer_drops_and_counts() {
        let (notifier, stream) = Notifier::channel(1);
        assert!(notifier.error("a", "first"));
        assert!(!notifier.error("b", "second"));
        assert_eq!(stream.dropped(), 1);
        assert_eq!(stream.recv().unwrap().message, "first");
    }

    #[test]
    fn recv_timeout_on_empty_stream() {
        let (_notifier, stream) = Notifier::channel(1);
        let err = stream.recv_timeout(Duration::from_millis(5)).unwrap_err();
        assert!(err.is_dispatch());
    }

    #[test]
    fn publish_after_stream_dropped_is_harmless() {
        let (notifier, stream) = Notifier::channel(1);
        drop(stream);
        assert!(!notifier.info("x", "y"));
    }
}
