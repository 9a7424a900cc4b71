/// User-facing notifications raised by the core for the UI layer to present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    LoggedOut,
    NewVersionAvailable { version: String, build_number: u32 },
    /// Logout gave up waiting on background jobs.
    JobsStillRunning { remaining: usize },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::LoggedOut => "logged-out",
            Notification::NewVersionAvailable { .. } => "new-version",
            Notification::JobsStillRunning { .. } => "jobs-running",
        }
    }
}

/// Owning-thread queue of notifications, drained once per frame by the UI.
#[derive(Debug, Default)]
pub struct EventBus {
    events: Vec<Notification>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, notification: Notification) {
        tracing::debug!(kind = notification.kind(), "notification raised");
        self.events.push(notification);
    }

    pub fn events(&self) -> &[Notification] {
        &self.events
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.events.iter().any(|e| e.kind() == kind)
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.events)
    }
}
