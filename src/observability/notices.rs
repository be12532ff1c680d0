//! User-visible notices.
//!
//! The engine reports a handful of state changes (balancer switched,
//! interception toggled, stats reset) to whatever surface the host provides.
//! Delivery is fire-and-forget and never affects relaying.

use std::fmt;
use std::sync::Mutex;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoticeLevel::Info => f.write_str("info"),
            NoticeLevel::Warning => f.write_str("warning"),
            NoticeLevel::Error => f.write_str("error"),
        }
    }
}

/// Notification surface.
pub trait Notifier: Send + Sync {
    fn show(&self, message: &str, level: NoticeLevel);
}

/// Notifier that writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, message: &str, level: NoticeLevel) {
        match level {
            NoticeLevel::Info => tracing::info!(notice = %message, "Relay notice"),
            NoticeLevel::Warning => tracing::warn!(notice = %message, "Relay notice"),
            NoticeLevel::Error => tracing::error!(notice = %message, "Relay notice"),
        }
    }
}

/// Notifier that keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices shown so far.
    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, message: &str, level: NoticeLevel) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push((level, message.to_string()));
        }
    }
}
