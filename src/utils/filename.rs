//! File name sanitizing and derivation.

use std::path::{Path, PathBuf};

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use url::Url;

static FORBIDDEN_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|\r\n]+"#).expect("forbidden-char regex should compile"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

const MAX_FILENAME_CHARS: usize = 200;

/// Make a string safe to use as a single path component.
pub fn sanitize_filename(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let s = FORBIDDEN_CHARS.replace_all(name, "_");
    let s = WHITESPACE.replace_all(&s, "_");
    s.trim().chars().take(MAX_FILENAME_CHARS).collect()
}

/// Separates the readable part of a hashed directory name from its digest.
/// Ids containing it are always hashed, so plain and hashed names never meet.
const DIGEST_SEPARATOR: char = '~';

/// Directory name owned by one task id.
///
/// Ids that are already safe path components are used as-is. Anything else
/// (separators, `.`/`..`, over-long or empty ids) gets a readable prefix plus
/// a digest of the raw id, so distinct ids never share a directory.
pub fn task_dir_name(task_id: &str) -> String {
    let sanitized = sanitize_filename(task_id);
    let plain = sanitized == task_id
        && !sanitized.is_empty()
        && !sanitized.contains(DIGEST_SEPARATOR)
        && !sanitized.trim_start_matches('.').is_empty();
    if plain {
        return sanitized;
    }

    let digest = hex::encode(Sha256::digest(task_id.as_bytes()));
    let readable: String = sanitized
        .trim_start_matches('.')
        .replace(DIGEST_SEPARATOR, "_")
        .chars()
        .take(64)
        .collect();
    let readable = if readable.is_empty() { "task" } else { readable.as_str() };
    format!("{}{}{}", readable, DIGEST_SEPARATOR, &digest[..16])
}

/// Sanitized title cut to `max_chars` characters, used inside upload names.
pub fn short_title(text: &str, max_chars: usize) -> String {
    sanitize_filename(text.trim()).chars().take(max_chars).collect()
}

/// Last path segment of a URL (percent-decoded), else its fragment, else `download`.
pub fn filename_from_url(url: &str) -> String {
    let (path, fragment) = match Url::parse(url) {
        Ok(parsed) => (
            parsed.path().to_string(),
            parsed.fragment().map(str::to_string),
        ),
        Err(_) => {
            let without_fragment = url.split('#').next().unwrap_or_default();
            let path = without_fragment.split('?').next().unwrap_or_default();
            (path.to_string(), url.split_once('#').map(|(_, f)| f.to_string()))
        }
    };

    let segment = path.rsplit('/').next().unwrap_or_default();
    let raw = if !segment.is_empty() {
        segment.to_string()
    } else if let Some(f) = fragment.filter(|f| !f.is_empty()) {
        f
    } else {
        "download".to_string()
    };

    let decoded = urlencoding::decode(&raw)
        .map(|d| d.into_owned())
        .unwrap_or(raw);
    let name = sanitize_filename(&decoded);
    if name.is_empty() {
        "download".to_string()
    } else {
        name
    }
}

/// First path under `dir` named `name`, or `stem_N.ext` if taken.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, n, ext));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_dir_name_keeps_plain_ids() {
        assert_eq!(task_dir_name("7"), "7");
        assert_eq!(task_dir_name("job-2024_03"), "job-2024_03");
    }

    #[test]
    fn test_task_dir_name_never_escapes_or_collides() {
        for id in ["", ".", "..", "...", "a/b", "a_b~x", "../etc"] {
            let name = task_dir_name(id);
            assert!(!name.is_empty());
            assert!(name != "." && name != "..");
            assert!(!name.contains('/') && !name.contains('\\'));
        }
        assert_ne!(task_dir_name("a/b"), task_dir_name("a_b"));
        assert_ne!(task_dir_name("a/b"), task_dir_name("a:b"));
        assert!(task_dir_name("..").starts_with("task~"));
        assert!(task_dir_name("a/b").starts_with("a_b~"));
    }

    #[test]
    fn test_sanitize_replaces_forbidden_and_whitespace() {
        assert_eq!(sanitize_filename(r#"a/b:c*"d"#), "a_b_c_d");
        assert_eq!(sanitize_filename("two  words\tand\nmore"), "two_words_and_more");
        assert_eq!(sanitize_filename(""), "");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "x".repeat(300);
        assert_eq!(sanitize_filename(&long).chars().count(), 200);
    }

    #[test]
    fn test_short_title_counts_characters() {
        assert_eq!(short_title("关于某某项目的招标公告以及附件下载说明", 15), "关于某某项目的招标公告以及附件");
        assert_eq!(short_title("  Short  ", 15), "Short");
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url("http://files/a.pdf"), "a.pdf");
        assert_eq!(filename_from_url("http://files/dir/%E6%8A%A5%E5%91%8A.doc?x=1"), "报告.doc");
        assert_eq!(filename_from_url("http://files/#frag"), "frag");
        assert_eq!(filename_from_url("http://files/"), "download");
    }

    #[test]
    fn test_unique_path_adds_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_path(dir.path(), "a.pdf");
        assert_eq!(first, dir.path().join("a.pdf"));
        std::fs::write(&first, b"x").unwrap();
        assert_eq!(unique_path(dir.path(), "a.pdf"), dir.path().join("a_1.pdf"));
    }
}
