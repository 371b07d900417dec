//! User-notification collaborator.
//!
//! Mutation outcomes are routed to a [`Notifier`] as `{title, text, icon}`
//! messages. The UI decides how to show them; [`TracingNotifier`] just logs.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

/// Icon / severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationIcon {
    Success,
    Error,
    Warning,
    Info,
    Question,
}

/// Callback run when the user accepts a confirmation prompt.
pub type ConfirmCallback = Arc<dyn Fn() + Send + Sync>;

/// A message for the user.
#[derive(Clone)]
pub struct Notification {
    pub title: String,
    pub text: String,
    pub icon: NotificationIcon,
    pub on_confirm: Option<ConfirmCallback>,
}

impl Notification {
    pub fn new(icon: NotificationIcon, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            icon,
            on_confirm: None,
        }
    }

    pub fn success(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(NotificationIcon::Success, title, text)
    }

    pub fn error(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(NotificationIcon::Error, title, text)
    }

    pub fn warning(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(NotificationIcon::Warning, title, text)
    }

    /// A yes/no prompt.
    pub fn question(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(NotificationIcon::Question, title, text)
    }

    pub fn on_confirm(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_confirm = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("title", &self.title)
            .field("text", &self.text)
            .field("icon", &self.icon)
            .field("on_confirm", &self.on_confirm.is_some())
            .finish()
    }
}

/// Displays notifications and confirmation prompts.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show a message. Must not block.
    fn notify(&self, notification: Notification);

    /// Ask the user to confirm. Returns whether they accepted; on accept,
    /// the prompt's `on_confirm` callback runs.
    ///
    /// The default accepts immediately.
    async fn confirm(&self, prompt: Notification) -> bool {
        if let Some(callback) = &prompt.on_confirm {
            callback();
        }
        true
    }
}

/// Notifier that writes every message to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.icon {
            NotificationIcon::Error => error!(title = %n.title, "{}", n.text),
            NotificationIcon::Warning => warn!(title = %n.title, "{}", n.text),
            _ => info!(title = %n.title, "{}", n.text),
        }
    }
}
