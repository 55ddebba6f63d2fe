use serde::Serialize;

/// One timed segment of a debate. Built once by the queue builder and then
/// only read.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Speech {
    pub id: String,
    pub title: String,
    /// Total seconds allotted.
    pub duration: u32,
    pub protected_seconds: u32,
    pub is_prep: bool,
    /// Remaining-seconds checkpoints, in the order they were resolved.
    pub alarm_times: Vec<u32>,
    pub skip_initial_bell: bool,
}

impl Speech {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        duration: u32,
        protected_seconds: u32,
        alarm_times: Vec<u32>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration,
            protected_seconds,
            is_prep: false,
            alarm_times,
            skip_initial_bell: false,
        }
    }
}
