//! Data models for attachment tasks.

mod attachment;
mod job;
mod task;

pub use attachment::{AttachmentCandidate, DiscoveredVia, DownloadedFile, ResolvedAttachment};
pub use job::{parse_job_submission, BatchReport, JobError};
pub use task::{Task, TaskResult, TaskStatus};
