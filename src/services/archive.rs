//! Archive expansion.
//!
//! Zip files are expanded in-process. Rar and 7z files go through whichever
//! of `unrar`, `7z` or `bsdtar` is installed.

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;

/// Errors that can occur during archive operations.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("no tool available to expand {0} archives")]
    ToolMissing(&'static str),

    #[error("{tool} exited with {status}")]
    ToolFailed { tool: String, status: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Rar,
    SevenZip,
}

impl ArchiveKind {
    /// Archive format named by the file extension.
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "zip" => Some(Self::Zip),
            "rar" => Some(Self::Rar),
            "7z" => Some(Self::SevenZip),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Rar => "rar",
            Self::SevenZip => "7z",
        }
    }

    /// External tools able to expand this format, in order of preference.
    fn tools(&self) -> &'static [&'static str] {
        match self {
            Self::Zip => &[],
            Self::Rar => &["unrar", "7z", "bsdtar"],
            Self::SevenZip => &["7z", "bsdtar"],
        }
    }
}

/// A file taken out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    pub path: PathBuf,
    /// Path inside the archive, `/`-separated.
    pub relative: String,
}

impl ExtractedEntry {
    /// Relative path flattened into one file name component.
    pub fn flat_name(&self) -> String {
        self.relative.replace(['/', '\\'], "_")
    }
}

/// Directory an archive is expanded into: `_extracted_<file name>` next to it.
///
/// Keyed on the whole file name so `x.zip` and `x.rar` never share one.
pub fn extraction_dir(archive: &Path) -> PathBuf {
    let name = archive
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    archive
        .parent()
        .unwrap_or(Path::new("."))
        .join(format!("_extracted_{}", name))
}

/// Expand `archive` and list every regular file it held, sorted by path.
pub async fn expand(archive: &Path, kind: ArchiveKind) -> Result<Vec<ExtractedEntry>, ArchiveError> {
    let dest = extraction_dir(archive);
    tokio::fs::create_dir_all(&dest).await?;

    match kind {
        ArchiveKind::Zip => {
            let archive = archive.to_path_buf();
            let target = dest.clone();
            tokio::task::spawn_blocking(move || extract_zip(&archive, &target))
                .await
                .map_err(|e| std::io::Error::other(e.to_string()))??;
        }
        ArchiveKind::Rar | ArchiveKind::SevenZip => extract_with_tool(archive, &dest, kind).await?,
    }

    let mut entries = Vec::new();
    collect_files(&dest, &dest, &mut entries)?;
    entries.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(entries)
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() || entry.name().starts_with("__MACOSX") {
            continue;
        }
        // enclosed_name rejects absolute paths and `..` traversal
        let Some(relative) = entry.enclosed_name() else {
            debug!("Skipping unsafe zip entry {}", entry.name());
            continue;
        };
        let out_path = dest.join(relative);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut outfile)?;
    }

    Ok(())
}

async fn extract_with_tool(
    archive: &Path,
    dest: &Path,
    kind: ArchiveKind,
) -> Result<(), ArchiveError> {
    let (tool, path) = kind
        .tools()
        .iter()
        .find_map(|tool| which::which(tool).ok().map(|path| (*tool, path)))
        .ok_or(ArchiveError::ToolMissing(kind.as_str()))?;

    let mut command = tokio::process::Command::new(&path);
    match tool {
        "unrar" => {
            command
                .arg("x")
                .arg("-o+")
                .arg("-y")
                .arg(archive)
                .arg(format!("{}/", dest.display()));
        }
        "7z" => {
            command
                .arg("x")
                .arg("-y")
                .arg(format!("-o{}", dest.display()))
                .arg(archive);
        }
        _ => {
            command.arg("-xf").arg(archive).arg("-C").arg(dest);
        }
    }

    debug!("Expanding {} with {}", archive.display(), path.display());
    let output = command.output().await?;
    if !output.status.success() {
        return Err(ArchiveError::ToolFailed {
            tool: tool.to_string(),
            status: output.status.to_string(),
        });
    }
    Ok(())
}

fn collect_files(
    root: &Path,
    dir: &Path,
    out: &mut Vec<ExtractedEntry>,
) -> Result<(), std::io::Error> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if entry.file_name() != "__MACOSX" {
                collect_files(root, &path, out)?;
            }
        } else if file_type.is_file() {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/");
            out.push(ExtractedEntry { path, relative });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, data) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(data).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(ArchiveKind::detect(Path::new("a/x.ZIP")), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::detect(Path::new("x.rar")), Some(ArchiveKind::Rar));
        assert_eq!(ArchiveKind::detect(Path::new("x.7z")), Some(ArchiveKind::SevenZip));
        assert_eq!(ArchiveKind::detect(Path::new("x.pdf")), None);
        assert_eq!(ArchiveKind::detect(Path::new("zip")), None);
    }

    #[test]
    fn test_extraction_dir_sits_next_to_archive() {
        assert_eq!(
            extraction_dir(Path::new("/work/7/x.zip")),
            PathBuf::from("/work/7/_extracted_x.zip")
        );
        assert_ne!(
            extraction_dir(Path::new("/work/7/x.zip")),
            extraction_dir(Path::new("/work/7/x.rar"))
        );
    }

    #[tokio::test]
    async fn test_expand_zip_skips_metadata_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("x.zip");
        write_zip(
            &archive,
            &[
                ("docs/", b""),
                ("docs/b.pdf", b"pdf"),
                ("a.txt", b"text"),
                ("__MACOSX/._a.txt", b"junk"),
            ],
        );

        let entries = expand(&archive, ArchiveKind::Zip).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.relative.as_str()).collect();
        assert_eq!(names, ["a.txt", "docs/b.pdf"]);
        assert_eq!(entries[1].flat_name(), "docs_b.pdf");
        assert_eq!(std::fs::read(&entries[1].path).unwrap(), b"pdf");
        assert!(entries[0].path.starts_with(dir.path().join("_extracted_x.zip")));
    }

    #[tokio::test]
    async fn test_corrupt_zip_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bad.zip");
        std::fs::write(&archive, b"not a zip").unwrap();
        assert!(matches!(
            expand(&archive, ArchiveKind::Zip).await,
            Err(ArchiveError::Zip(_))
        ));
    }
}
