//! Per-task progress narrative.

use tracing::info;

/// Append-only list of human-readable progress messages for one task.
///
/// Every message is also mirrored to the process log.
#[derive(Debug, Clone, Default)]
pub struct Narrative {
    task_id: String,
    messages: Vec<String>,
}

impl Narrative {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            messages: Vec::new(),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(task = %self.task_id, "{}", message);
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_keep_order() {
        let mut narrative = Narrative::new("7");
        narrative.push("navigating");
        narrative.push(String::from("done"));
        assert_eq!(narrative.task_id(), "7");
        assert_eq!(narrative.into_messages(), vec!["navigating", "done"]);
    }
}
