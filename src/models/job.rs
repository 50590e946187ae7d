//! Job submission parsing and batch reports.
//!
//! Submissions arrive as a single `{"ID": .., "url": ..}` object, as an
//! `{"arg1": "<one JSON object per line>"}` envelope, or as raw
//! newline-delimited JSON objects.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::{Task, TaskResult};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("no tasks found: expected {{ID, url}} or {{arg1}} with one JSON object per line")]
    NoTasks,
}

/// Parse a job submission into tasks.
pub fn parse_job_submission(text: &str) -> Result<Vec<Task>, JobError> {
    let text = text.trim();

    let tasks = match serde_json::from_str::<Value>(text) {
        Ok(value) => {
            if let Some(task) = task_from_value(&value) {
                vec![task]
            } else if let Some(lines) = value.get("arg1").and_then(Value::as_str) {
                tasks_from_lines(lines)
            } else {
                Vec::new()
            }
        }
        Err(_) => tasks_from_lines(text),
    };

    if tasks.is_empty() {
        return Err(JobError::NoTasks);
    }
    Ok(tasks)
}

fn tasks_from_lines(lines: &str) -> Vec<Task> {
    lines
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<Value>(line) {
            Ok(value) => task_from_value(&value),
            Err(_) => {
                let preview: String = line.chars().take(120).collect();
                warn!("Could not parse submission line: {}", preview);
                None
            }
        })
        .collect()
}

fn task_from_value(value: &Value) -> Option<Task> {
    let id = value.get("ID").or_else(|| value.get("id"))?;
    let id = match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let url = value.get("url")?.as_str()?;
    Some(Task::new(id, url))
}

/// Aggregate report for a batch of tasks.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub status: &'static str,
    pub report: String,
    pub details: Vec<TaskResult>,
}

impl BatchReport {
    pub fn new(details: Vec<TaskResult>) -> Self {
        let report = details
            .iter()
            .map(TaskResult::summary_line)
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            status: "ok",
            report,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_object_with_numeric_id() {
        let tasks = parse_job_submission(r#"{"ID": 7, "url": "http://site/detail/7"}"#).unwrap();
        assert_eq!(tasks, vec![Task::new("7", "http://site/detail/7")]);
    }

    #[test]
    fn test_arg1_envelope_skips_bad_lines() {
        let body = serde_json::json!({
            "arg1": "{\"ID\":\"1\",\"url\":\"http://a/1\"}\nnot json\n\n{\"ID\":\"2\",\"url\":\"http://a/2\"}"
        })
        .to_string();
        let tasks = parse_job_submission(&body).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].id, "2");
    }

    #[test]
    fn test_raw_json_lines() {
        let body = "{\"id\":\"a\",\"url\":\"http://x/a\"}\n{\"id\":\"b\",\"url\":\"http://x/b\"}\n";
        let tasks = parse_job_submission(body).unwrap();
        assert_eq!(tasks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn test_empty_submission_is_rejected() {
        assert!(matches!(parse_job_submission("{}"), Err(JobError::NoTasks)));
        assert!(matches!(parse_job_submission(""), Err(JobError::NoTasks)));
    }
}
