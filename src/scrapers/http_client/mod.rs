//! Download client seeded with the browser's cookies.
//!
//! Files are fetched outside the browser: the session's cookies are copied
//! into a reqwest jar and the body is streamed straight to disk.

mod disposition;
mod user_agent;

pub use disposition::parse_content_disposition_filename;
pub use user_agent::resolve_user_agent;

use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::Settings;
use crate::models::DownloadedFile;
use crate::scrapers::browser::BrowserCookie;
use crate::utils::{filename_from_url, sanitize_filename, unique_path};

/// A single URL could not be fetched. Never fatal to a task.
#[derive(Debug, Error)]
#[error("download of {url} failed: {cause}")]
pub struct DownloadError {
    pub url: String,
    pub cause: String,
}

impl DownloadError {
    fn new(url: &str, cause: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Plain HTTP client carrying a browser session's cookies.
#[derive(Clone)]
pub struct AttachmentClient {
    client: Client,
}

impl AttachmentClient {
    /// Build a client whose jar holds `cookies`.
    pub fn from_cookies(
        cookies: &[BrowserCookie],
        settings: &Settings,
    ) -> Result<Self, reqwest::Error> {
        let jar = Arc::new(Jar::default());
        for cookie in cookies {
            if cookie.name.is_empty() || cookie.domain.is_empty() {
                continue;
            }
            let host = cookie.domain.trim_start_matches('.');
            let scheme = if cookie.secure { "https" } else { "http" };
            let path = if cookie.path.is_empty() { "/" } else { cookie.path.as_str() };
            let Ok(origin) = format!("{}://{}{}", scheme, host, path).parse::<reqwest::Url>() else {
                debug!("Skipping cookie {} with unusable domain {}", cookie.name, cookie.domain);
                continue;
            };
            // A leading dot marks a domain cookie; anything else is host-only.
            let cookie_str = if cookie.domain.starts_with('.') {
                format!(
                    "{}={}; Domain={}; Path={}",
                    cookie.name, cookie.value, host, path
                )
            } else {
                format!("{}={}; Path={}", cookie.name, cookie.value, path)
            };
            jar.add_cookie_str(&cookie_str, &origin);
        }

        let client = Client::builder()
            .cookie_provider(jar)
            .user_agent(resolve_user_agent(&settings.user_agent))
            .timeout(settings.download_timeout())
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .redirect(reqwest::redirect::Policy::limited(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    /// Stream `url` into `dest_dir`.
    ///
    /// The file name is `name_override`, else the `Content-Disposition`
    /// filename, else the last URL segment; taken names get a `_N` suffix.
    /// A partial file is removed when the transfer fails.
    pub async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        name_override: Option<&str>,
    ) -> Result<DownloadedFile, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::new(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::new(url, format!("HTTP {}", status.as_u16())));
        }

        let disposition_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_disposition_filename);

        let original_name = name_override
            .map(sanitize_filename)
            .filter(|n| !n.is_empty())
            .or_else(|| disposition_name.map(|n| sanitize_filename(&n)).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| filename_from_url(url));

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| DownloadError::new(url, e))?;
        let local_path = unique_path(dest_dir, &original_name);

        let mut file = tokio::fs::File::create(&local_path)
            .await
            .map_err(|e| DownloadError::new(url, e))?;

        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        let copied: Result<(), DownloadError> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| DownloadError::new(url, e))?;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| DownloadError::new(url, e))?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(|e| DownloadError::new(url, e))
        }
        .await;

        if let Err(e) = copied {
            drop(file);
            let _ = tokio::fs::remove_file(&local_path).await;
            return Err(e);
        }

        info!("Downloaded {} ({} bytes) -> {}", url, written, local_path.display());

        Ok(DownloadedFile {
            local_path,
            origin_url: url.to_string(),
            original_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(cookies: &[BrowserCookie]) -> AttachmentClient {
        AttachmentClient::from_cookies(cookies, &Settings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_download_uses_url_name_and_suffixes_collisions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/a.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/files/a.pdf", server.uri());
        let c = client(&[]);

        let first = c.download(&url, dir.path(), None).await.unwrap();
        assert_eq!(first.original_name, "a.pdf");
        assert_eq!(first.local_path, dir.path().join("a.pdf"));
        assert_eq!(std::fs::read(&first.local_path).unwrap(), b"%PDF-1.4");

        let second = c.download(&url, dir.path(), None).await.unwrap();
        assert_eq!(second.local_path, dir.path().join("a_1.pdf"));
    }

    #[tokio::test]
    async fn test_download_prefers_override_then_disposition() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Disposition", "attachment; filename=\"report.docx\"")
                    .set_body_bytes(b"doc".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/get", server.uri());
        let c = client(&[]);

        let named = c.download(&url, dir.path(), None).await.unwrap();
        assert_eq!(named.original_name, "report.docx");

        let overridden = c.download(&url, dir.path(), Some("x.docx")).await.unwrap();
        assert_eq!(overridden.original_name, "x.docx");
    }

    #[tokio::test]
    async fn test_download_sends_browser_cookies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secure/b.zip"))
            .and(header("cookie", "SESSION=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK".to_vec()))
            .mount(&server)
            .await;

        let cookie = BrowserCookie {
            name: "SESSION".into(),
            value: "abc".into(),
            domain: "127.0.0.1".into(),
            path: "/".into(),
            secure: false,
            http_only: true,
        };
        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/secure/b.zip", server.uri());
        let file = client(&[cookie]).download(&url, dir.path(), None).await.unwrap();
        assert_eq!(file.original_name, "b.zip");
    }

    #[tokio::test]
    async fn test_http_error_is_download_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/missing.pdf", server.uri());
        let err = client(&[]).download(&url, dir.path(), None).await.unwrap_err();
        assert_eq!(err.url, url);
        assert_eq!(err.cause, "HTTP 404");
        assert!(!dir.path().join("missing.pdf").exists());
    }
}
