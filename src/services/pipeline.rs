//! Archive expansion and upload of downloaded files.

use std::path::Path;

use tracing::warn;

use super::archive::{self, ArchiveKind};
use super::narrative::Narrative;
use super::upload::{KnowledgeStore, UploadOutcome};
use crate::models::DownloadedFile;

/// Marker between the task prefix and the original file name.
pub const ATTACHMENT_MARKER: &str = "附件";

/// Deterministic upload names for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadNaming {
    prefix: String,
}

impl UploadNaming {
    pub fn new(task_id: &str, short_title: &str) -> Self {
        Self {
            prefix: format!("{}{}{}", task_id, short_title, ATTACHMENT_MARKER),
        }
    }

    /// `{taskId}{shortTitle}附件{name}`
    pub fn file(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// `{taskId}{shortTitle}附件{archiveName}_{inner}`
    pub fn archive_entry(&self, archive_name: &str, inner: &str) -> String {
        format!("{}{}_{}", self.prefix, archive_name, inner)
    }
}

/// Offers downloaded files to a knowledge store, one upload per file.
pub struct UploadPipeline<'a> {
    store: &'a dyn KnowledgeStore,
}

impl<'a> UploadPipeline<'a> {
    pub fn new(store: &'a dyn KnowledgeStore) -> Self {
        Self { store }
    }

    /// Upload `file`, or every file inside it when it is an archive.
    ///
    /// Returns the names that uploaded successfully. Expansion and upload
    /// failures are recorded in the narrative and never abort the caller.
    pub async fn process(
        &self,
        file: &DownloadedFile,
        naming: &UploadNaming,
        narrative: &mut Narrative,
    ) -> Vec<String> {
        let local_name = file
            .local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.original_name.clone());

        if !file.local_path.exists() {
            narrative.push(format!("  Missing file: {}", file.local_path.display()));
            return Vec::new();
        }

        let Some(kind) = ArchiveKind::detect(&file.local_path) else {
            let upload_name = naming.file(&local_name);
            return self
                .upload_one(&file.local_path, upload_name, narrative)
                .await
                .into_iter()
                .collect();
        };

        let entries = match archive::expand(&file.local_path, kind).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Expanding {} failed: {}", file.local_path.display(), e);
                narrative.push(format!("  Could not expand {} archive {}: {}", kind.as_str(), local_name, e));
                return Vec::new();
            }
        };
        narrative.push(format!(
            "  Expanded {} archive {} ({} file(s))",
            kind.as_str(),
            local_name,
            entries.len()
        ));

        let mut uploaded = Vec::new();
        for entry in &entries {
            let upload_name = naming.archive_entry(&local_name, &entry.flat_name());
            if let Some(name) = self.upload_one(&entry.path, upload_name, narrative).await {
                uploaded.push(name);
            }
        }
        uploaded
    }

    async fn upload_one(
        &self,
        path: &Path,
        upload_name: String,
        narrative: &mut Narrative,
    ) -> Option<String> {
        let outcome = UploadOutcome::from(self.store.upload(path, &upload_name).await);
        narrative.push(format!(
            "    Upload '{}' => {} ({})",
            upload_name, outcome.ok, outcome.info
        ));
        outcome.ok.then_some(upload_name)
    }
}
