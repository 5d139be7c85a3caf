use anyhow::Result;
use notify_rust::Notification;
use tracing::info;

use super::{machine::Completion, TimerMode};

/// Announces a finished countdown to the user.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, completion: &Completion) -> Result<()>;
}

pub fn completion_message(finished: TimerMode) -> (&'static str, &'static str) {
    match finished {
        TimerMode::Focus => ("Time for a break!", "Your focus time is over."),
        TimerMode::Break => ("Time to focus!", "Your break is over."),
    }
}

/// Shows a desktop notification through the platform notification service.
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn notify(&self, completion: &Completion) -> Result<()> {
        let (summary, body) = completion_message(completion.mode);
        Notification::new()
            .appname("pomosync")
            .summary(summary)
            .body(body)
            .show()?;
        Ok(())
    }
}

/// Used when notifications are turned off.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, completion: &Completion) -> Result<()> {
        let (summary, body) = completion_message(completion.mode);
        info!("{summary} {body}");
        Ok(())
    }
}

pub fn notifier_for(enabled: bool) -> Box<dyn Notifier> {
    if enabled {
        Box::new(DesktopNotifier)
    } else {
        Box::new(LogNotifier)
    }
}
