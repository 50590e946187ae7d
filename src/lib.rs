//! attachd - attachment retrieval for script-driven pages.
//!
//! Opens a page in a headless browser, works through popup triggers,
//! embedded frames and validation-gated links until it finds real file
//! URLs, downloads them with the browser's cookies, then hands every file
//! (expanding archives first) to a knowledge store upload endpoint.

pub mod config;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod utils;

pub use config::{Config, Settings};
pub use models::{
    AttachmentCandidate, DiscoveredVia, DownloadedFile, ResolvedAttachment, Task, TaskResult,
    TaskStatus,
};
pub use services::orchestrator::TaskOrchestrator;
