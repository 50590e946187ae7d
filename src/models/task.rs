//! Task and task result models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of work: a page that should carry attachments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "url")]
    pub source_url: String,
}

impl Task {
    pub fn new(id: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
        }
    }
}

/// Final outcome of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    NoContent,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NoContent => "no_content",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result handed back to the caller for every task, including failed ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(rename = "ID")]
    pub task_id: String,
    pub url: String,
    pub status: TaskStatus,
    #[serde(rename = "uploaded")]
    pub uploaded_file_names: Vec<String>,
    /// Ordered narrative of what happened, separate from process logging.
    pub messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TaskResult {
    /// One-line summary used in batch reports.
    pub fn summary_line(&self) -> String {
        match self.status {
            TaskStatus::Success => {
                let shown: Vec<&str> = self
                    .uploaded_file_names
                    .iter()
                    .take(3)
                    .map(String::as_str)
                    .collect();
                let more = if self.uploaded_file_names.len() > 3 {
                    "..."
                } else {
                    ""
                };
                format!(
                    "ID {}: uploaded {} -> {}{}",
                    self.task_id,
                    self.uploaded_file_names.len(),
                    shown.join(", "),
                    more
                )
            }
            TaskStatus::NoContent => format!("ID {}: no attachments found", self.task_id),
            TaskStatus::Error => format!(
                "ID {}: failed - {}",
                self.task_id,
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: TaskStatus, uploaded: &[&str]) -> TaskResult {
        TaskResult {
            task_id: "7".to_string(),
            url: "http://site/detail/7".to_string(),
            status,
            uploaded_file_names: uploaded.iter().map(|s| s.to_string()).collect(),
            messages: Vec::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::NoContent).unwrap();
        assert_eq!(json, "\"no_content\"");
    }

    #[test]
    fn test_summary_truncates_after_three_names() {
        let r = result(TaskStatus::Success, &["a", "b", "c", "d"]);
        assert_eq!(r.summary_line(), "ID 7: uploaded 4 -> a, b, c...");
    }

    #[test]
    fn test_summary_for_no_content_and_error() {
        assert_eq!(
            result(TaskStatus::NoContent, &[]).summary_line(),
            "ID 7: no attachments found"
        );
        let mut failed = result(TaskStatus::Error, &[]);
        failed.error = Some("navigation timed out".to_string());
        assert_eq!(failed.summary_line(), "ID 7: failed - navigation timed out");
    }
}
