//! Knowledge store uploads.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use thiserror::Error;
use tracing::debug;

use crate::config::StoreSettings;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store answered HTTP {0}")]
    Status(u16),
}

/// Per-file upload result as reported in the narrative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub ok: bool,
    /// `HTTP<code>` on success, `UploadFailed: <cause>` otherwise.
    pub info: String,
}

impl From<Result<u16, UploadError>> for UploadOutcome {
    fn from(result: Result<u16, UploadError>) -> Self {
        match result {
            Ok(code) => Self {
                ok: true,
                info: format!("HTTP{}", code),
            },
            Err(e) => Self {
                ok: false,
                info: format!("UploadFailed: {}", e),
            },
        }
    }
}

/// Destination for finished files.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Upload the file at `path` under `upload_name`; returns the HTTP status.
    async fn upload(&self, path: &Path, upload_name: &str) -> Result<u16, UploadError>;
}

/// Multipart upload to `{base_url}/api/v2/filelib/file/{knowledge_base_id}`.
pub struct HttpKnowledgeStore {
    client: Client,
    endpoint: String,
}

impl HttpKnowledgeStore {
    pub fn new(store: &StoreSettings, accept_invalid_certs: bool) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(store.upload_timeout())
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self {
            client,
            endpoint: store.upload_endpoint(),
        })
    }
}

#[async_trait]
impl KnowledgeStore for HttpKnowledgeStore {
    async fn upload(&self, path: &Path, upload_name: &str) -> Result<u16, UploadError> {
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();
        let mime = mime_guess::from_path(upload_name).first_or_octet_stream();
        let part = Part::stream_with_length(Body::from(file), length)
            .file_name(upload_name.to_string())
            .mime_str(mime.essence_str())?;
        // Raw UTF-8 file names; the store does not decode percent escapes.
        let form = Form::new().percent_encode_noop().part("file", part);

        debug!("Uploading {} to {}", upload_name, self.endpoint);
        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status(status.as_u16()));
        }
        Ok(status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> HttpKnowledgeStore {
        let settings = StoreSettings {
            base_url: server.uri(),
            knowledge_base_id: 254,
            upload_timeout: 5,
        };
        HttpKnowledgeStore::new(&settings, true).unwrap()
    }

    #[tokio::test]
    async fn test_upload_posts_multipart_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/filelib/file/254"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.pdf");
        std::fs::write(&file, b"%PDF").unwrap();

        let outcome: UploadOutcome = store_for(&server).upload(&file, "7Title附件a.pdf").await.into();
        assert_eq!(
            outcome,
            UploadOutcome {
                ok: true,
                info: "HTTP200".into()
            }
        );

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"file\""));
        assert!(body.contains("7Title附件a.pdf"));
        assert!(body.contains("application/pdf"));
        assert!(body.contains("%PDF"));
    }

    #[tokio::test]
    async fn test_large_file_is_sent_whole() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.zip");
        let content: Vec<u8> = (0..3_000_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&file, &content).unwrap();

        let code = store_for(&server).upload(&file, "big.zip").await.unwrap();
        assert_eq!(code, 201);

        let requests = server.received_requests().await.unwrap();
        let body = &requests[0].body;
        let start = body
            .windows(8)
            .position(|w| w == &content[..8])
            .unwrap();
        assert_eq!(&body[start..start + content.len()], &content[..]);
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();

        let outcome: UploadOutcome = store_for(&server).upload(&file, "a.txt").await.into();
        assert!(!outcome.ok);
        assert!(outcome.info.starts_with("UploadFailed: "));
        assert!(outcome.info.contains("500"));
    }
}
