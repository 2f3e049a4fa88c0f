//! User-facing notices
//!
//! Components raise notices through the [`Notifier`] port instead of drawing
//! anything themselves. The CLI prints them; tests collect them.

use std::sync::Mutex;

use otter_types::MAX_NOTICE_DESCRIPTION_LEN;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: Option<String>,
    /// Block explorer link, when the chain has one
    pub link: Option<String>,
}

impl Notice {
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            description: None,
            link: None,
        }
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            ..Self::success(title)
        }
    }

    /// Error notice; the description is cut to the display limit
    pub fn error(title: impl Into<String>, description: &str) -> Self {
        Self {
            level: NoticeLevel::Error,
            description: Some(truncate_description(description)),
            ..Self::success(title)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_link(mut self, link: String) -> Self {
        if !link.is_empty() {
            self.link = Some(link);
        }
        self
    }
}

/// First 80 characters, never splitting a code point
pub fn truncate_description(text: &str) -> String {
    text.chars().take(MAX_NOTICE_DESCRIPTION_LEN).collect()
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Emits notices as log lines
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        let description = notice.description.as_deref().unwrap_or("");
        match notice.level {
            NoticeLevel::Success => info!(title = %notice.title, link = ?notice.link, "{}", description),
            NoticeLevel::Info => info!(title = %notice.title, "{}", description),
            NoticeLevel::Error => error!(title = %notice.title, "{}", description),
        }
    }
}

/// Keeps every notice in memory, in order
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(notices) => notices.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn errors(&self) -> Vec<Notice> {
        self.notices()
            .into_iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        match self.notices.lock() {
            Ok(mut notices) => notices.push(notice),
            Err(_) => warn!("Notice recorder poisoned, dropping {}", notice.title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_description_is_cut() {
        let long = "x".repeat(200);
        let notice = Notice::error("Deposit failed", &long);
        assert_eq!(notice.description.unwrap().len(), 80);

        let short = Notice::error("Deposit failed", "User rejected the request.");
        assert_eq!(short.description.as_deref(), Some("User rejected the request."));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "é".repeat(100);
        assert_eq!(truncate_description(&text).chars().count(), 80);
    }

    #[test]
    fn test_empty_link_is_dropped() {
        assert_eq!(Notice::success("ok").with_link(String::new()).link, None);
    }

    #[test]
    fn test_recorder_filters_errors() {
        let recorder = RecordingNotifier::new();
        recorder.notify(Notice::success("a"));
        recorder.notify(Notice::error("b", "boom"));
        assert_eq!(recorder.notices().len(), 2);
        assert_eq!(recorder.errors().len(), 1);
    }
}
