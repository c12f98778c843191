use std::{fmt, path::Path, str::FromStr, sync::Arc};

use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Started,
    Saved { path: String },
    Failed { message: String },
}

impl Notification {
    pub fn saved(path: &Path) -> Self {
        Notification::Saved {
            path: path.display().to_string(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Notification::Started => "Export started",
            Notification::Saved { .. } => "Export complete",
            Notification::Failed { .. } => "Export failed",
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notification::Started => "Generating the audit log export.".to_string(),
            Notification::Saved { path } => format!("File saved at:\n{path}"),
            Notification::Failed { message } => message.clone(),
        }
    }
}

/// Fire-and-forget messages to the operator. Implementations swallow their own
/// delivery failures; a notification can never fail a run.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        match notification {
            Notification::Failed { .. } => {
                error!("{}: {}", notification.title(), notification.body())
            }
            _ => info!("{}: {}", notification.title(), notification.body()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _notification: &Notification) {}
}

/// Desktop popups through the platform notification service.
#[cfg(feature = "desktop-notifications")]
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifier;

#[cfg(feature = "desktop-notifications")]
impl Notifier for DesktopNotifier {
    fn notify(&self, notification: &Notification) {
        LogNotifier.notify(notification);
        if let Err(e) = notify_rust::Notification::new()
            .appname("audit-log-export")
            .summary(notification.title())
            .body(&notification.body())
            .show()
        {
            tracing::warn!("Failed to show desktop notification: {}", e);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifierKind {
    #[default]
    Log,
    Desktop,
    None,
}

impl FromStr for NotifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "log" => Ok(NotifierKind::Log),
            "desktop" => Ok(NotifierKind::Desktop),
            "none" => Ok(NotifierKind::None),
            other => Err(format!("Unknown notifier: {other}")),
        }
    }
}

impl fmt::Display for NotifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotifierKind::Log => "log",
            NotifierKind::Desktop => "desktop",
            NotifierKind::None => "none",
        };
        f.write_str(name)
    }
}

impl NotifierKind {
    pub fn build(self) -> Arc<dyn Notifier> {
        match self {
            NotifierKind::Log => Arc::new(LogNotifier),
            NotifierKind::None => Arc::new(NoopNotifier),
            #[cfg(feature = "desktop-notifications")]
            NotifierKind::Desktop => Arc::new(DesktopNotifier),
            #[cfg(not(feature = "desktop-notifications"))]
            NotifierKind::Desktop => {
                tracing::warn!(
                    "Built without desktop-notifications, falling back to log notifications"
                );
                Arc::new(LogNotifier)
            }
        }
    }
}
