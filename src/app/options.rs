use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Re-validate after every edit instead of only on submit.
    pub auto_validate: bool,
    /// Capacity of the session's event queue.
    pub event_buffer: usize,
    /// Upper bound for a single save call; `None` waits indefinitely.
    pub save_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auto_validate: false,
            event_buffer: 64,
            save_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl SessionOptions {
    pub fn with_auto_validate(mut self, enabled: bool) -> Self {
        self.auto_validate = enabled;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn with_save_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.save_timeout = timeout;
        self
    }
}
