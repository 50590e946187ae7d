//! Service layer: attachment resolution, uploads and task sequencing.
//!
//! Services take a browser session and a narrative explicitly, so the CLI
//! and tests drive them the same way.

pub mod archive;
pub mod narrative;
pub mod orchestrator;
pub mod pipeline;
pub mod resolver;
pub mod upload;

pub use archive::{ArchiveError, ArchiveKind};
pub use narrative::Narrative;
pub use orchestrator::{TaskError, TaskOrchestrator};
pub use pipeline::{UploadNaming, UploadPipeline};
pub use resolver::{Resolution, Resolver, ResolverState};
pub use upload::{HttpKnowledgeStore, KnowledgeStore, UploadError, UploadOutcome};
