//! Translation memory kept as a JSON file in a GitHub repository.
//!
//! Uses the repository contents API. The blob SHA of the file is the version
//! token: GitHub refuses a write whose `sha` no longer matches the file.

use crate::config::GitHubConfig;
use crate::memory::TranslationMemory;
use crate::retry::{with_retry_if, RetryConfig};
use crate::store::{MemoryStore, StoreError, VersionToken};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const USER_AGENT: &str = concat!("xml-strings-translator/", env!("CARGO_PKG_VERSION"));
const COMMIT_MESSAGE: &str = "Update translation memory";

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
    sha: String,
}

/// Files over 1 MB come back from the contents API without content; the
/// blob API serves them base64-encoded up to 100 MB.
#[derive(Debug, Deserialize)]
struct BlobResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

pub struct GitHubStore {
    client: reqwest::Client,
    config: GitHubConfig,
    read_retry: RetryConfig,
}

impl GitHubStore {
    pub fn new(client: reqwest::Client, config: GitHubConfig) -> Self {
        Self {
            client,
            config,
            read_retry: RetryConfig::store_read(),
        }
    }

    /// Override the retry policy used for reads
    pub fn with_read_retry(mut self, retry: RetryConfig) -> Self {
        self.read_retry = retry;
        self
    }

    fn api_url(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.api_url(),
            self.config.repo,
            self.config.file_path.trim_start_matches('/')
        )
    }

    fn blob_url(&self, sha: &str) -> String {
        format!("{}/repos/{}/git/blobs/{}", self.api_url(), self.config.repo, sha)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.config.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", USER_AGENT)
    }

    async fn fetch(&self) -> Result<(TranslationMemory, VersionToken), StoreError> {
        let response = self
            .request(reqwest::Method::GET, &self.contents_url())
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::transport(None, format!("GitHub request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(self.describe()));
        }
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        let contents: ContentsResponse = response
            .json()
            .await
            .map_err(|e| StoreError::DecodeError(format!("unexpected GitHub response: {}", e)))?;

        let memory = match contents.encoding.as_str() {
            "base64" => TranslationMemory::decode(&contents.content)?,
            "none" => {
                debug!(
                    "{} is too large for the contents API, reading blob {}",
                    self.describe(),
                    contents.sha
                );
                self.fetch_blob(&contents.sha).await?
            }
            other => {
                return Err(StoreError::DecodeError(format!(
                    "unsupported content encoding '{}'",
                    other
                )))
            }
        };

        Ok((memory, VersionToken::new(contents.sha)))
    }

    async fn fetch_blob(&self, sha: &str) -> Result<TranslationMemory, StoreError> {
        let response = self
            .request(reqwest::Method::GET, &self.blob_url(sha))
            .send()
            .await
            .map_err(|e| StoreError::transport(None, format!("GitHub request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        let blob: BlobResponse = response
            .json()
            .await
            .map_err(|e| StoreError::DecodeError(format!("unexpected GitHub blob response: {}", e)))?;

        if blob.encoding != "base64" {
            return Err(StoreError::DecodeError(format!(
                "unsupported blob encoding '{}'",
                blob.encoding
            )));
        }

        TranslationMemory::decode(&blob.content)
    }
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> StoreError {
    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
    StoreError::transport(
        Some(status.as_u16()),
        format!("GitHub API error ({}): {}", status, body),
    )
}

#[async_trait]
impl MemoryStore for GitHubStore {
    async fn load(&self) -> Result<(TranslationMemory, VersionToken), StoreError> {
        let (memory, version) = with_retry_if(
            &self.read_retry,
            "Load translation memory",
            || self.fetch(),
            StoreError::is_transient,
        )
        .await?;

        info!(
            "Loaded translation memory from {} ({} languages, {} keys, sha {})",
            self.describe(),
            memory.language_count(),
            memory.key_count(),
            version
        );
        Ok((memory, version))
    }

    async fn save(
        &self,
        memory: &TranslationMemory,
        version: Option<&VersionToken>,
    ) -> Result<(), StoreError> {
        let request = UpdateRequest {
            message: COMMIT_MESSAGE,
            content: memory.encode()?,
            branch: &self.config.branch,
            sha: version.map(VersionToken::as_str),
        };

        debug!("Writing translation memory to {}", self.describe());

        let response = self
            .request(reqwest::Method::PUT, &self.contents_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| StoreError::transport(None, format!("GitHub request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            info!("✓ Saved translation memory to {}", self.describe());
            return Ok(());
        }

        match status {
            // sha does not match the file
            StatusCode::CONFLICT => Err(StoreError::Conflict),
            // sha missing or stale for an existing file; other 422s are validation errors
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ErrorBody>(&body)
                    .unwrap_or_default()
                    .message;
                if message.contains("sha") {
                    Err(StoreError::Conflict)
                } else {
                    Err(StoreError::transport(
                        Some(status.as_u16()),
                        format!("GitHub API error ({}): {}", status, body),
                    ))
                }
            }
            // 404 on write also means the token cannot write to the repository
            _ => Err(api_error(status, response).await),
        }
    }

    fn describe(&self) -> String {
        format!(
            "github:{}/{}@{}",
            self.config.repo, self.config.file_path, self.config.branch
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use wiremock::{
        matchers::{body_partial_json, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    const CONTENTS_PATH: &str = "/repos/acme/strings/contents/memory/translations.json";

    // ==================== Helper Functions ====================

    fn create_store(api_url: &str) -> GitHubStore {
        let config = GitHubConfig {
            token: "test-github-token".to_string(),
            repo: "acme/strings".to_string(),
            file_path: "memory/translations.json".to_string(),
            branch: "main".to_string(),
            api_url: api_url.to_string(),
        };
        GitHubStore::new(reqwest::Client::new(), config).with_read_retry(RetryConfig::none())
    }

    fn contents_body(json: &str, sha: &str) -> serde_json::Value {
        // GitHub wraps base64 content at 60 columns
        let encoded = BASE64.encode(json);
        let wrapped = encoded
            .as_bytes()
            .chunks(60)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::json!({
            "type": "file",
            "encoding": "base64",
            "name": "translations.json",
            "path": "memory/translations.json",
            "content": wrapped,
            "sha": sha
        })
    }

    fn hindi_memory() -> TranslationMemory {
        let mut memory = TranslationMemory::new();
        let mut hindi = BTreeMap::new();
        hindi.insert("greet".to_string(), "नमस्ते".to_string());
        memory.merge("Hindi", &hindi);
        memory
    }

    // ==================== load Tests ====================

    #[tokio::test]
    async fn test_load_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .and(query_param("ref", "main"))
            .and(header("Authorization", "Bearer test-github-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(contents_body(
                r#"{"Hindi": {"greet": "नमस्ते"}, "Spanish": {"greet": "Hola", "bye": "Adiós"}}"#,
                "sha-1",
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = create_store(&mock_server.uri());
        let (memory, version) = store.load().await.expect("Should load");

        assert_eq!(version.as_str(), "sha-1");
        assert_eq!(memory.get("Hindi", "greet"), Some("नमस्ते"));
        assert_eq!(memory.get("Spanish", "bye"), Some("Adiós"));
        assert_eq!(memory.key_count(), 3);
    }

    #[tokio::test]
    async fn test_load_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({"message": "Not Found"})),
            )
            .mount(&mock_server)
            .await;

        let store = create_store(&mock_server.uri());
        let err = store.load().await.expect_err("Should be missing");

        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_load_invalid_json_is_decode_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(contents_body("this is not json", "sha-1")),
            )
            .mount(&mock_server)
            .await;

        let store = create_store(&mock_server.uri());
        let err = store.load().await.expect_err("Should fail to decode");

        assert!(matches!(err, StoreError::DecodeError(_)));
    }

    #[tokio::test]
    async fn test_load_unauthorized_is_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = create_store(&mock_server.uri())
            .with_read_retry(RetryConfig::new(3, Duration::from_millis(1)));
        let err = store.load().await.expect_err("Should fail");

        assert!(matches!(
            err,
            StoreError::TransportError {
                status: Some(401),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_load_retries_on_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(contents_body(r#"{"Thai": {"ok": "ตกลง"}}"#, "sha-2")),
            )
            .mount(&mock_server)
            .await;

        let store = create_store(&mock_server.uri())
            .with_read_retry(RetryConfig::new(3, Duration::from_millis(1)));
        let (memory, version) = store.load().await.expect("Should succeed after retry");

        assert_eq!(version.as_str(), "sha-2");
        assert_eq!(memory.get("Thai", "ok"), Some("ตกลง"));
    }

    #[tokio::test]
    async fn test_load_large_file_reads_blob() {
        let mock_server = MockServer::start().await;

        // Contents API response for a file between 1 MB and 100 MB
        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .and(query_param("ref", "main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "file",
                "encoding": "none",
                "size": 2_500_000,
                "content": "",
                "sha": "sha-big"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let blob = contents_body(r#"{"German": {"greet": "Hallo"}}"#, "sha-big");
        Mock::given(method("GET"))
            .and(path("/repos/acme/strings/git/blobs/sha-big"))
            .and(header("Authorization", "Bearer test-github-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sha": "sha-big",
                "size": 2_500_000,
                "encoding": "base64",
                "content": blob["content"]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = create_store(&mock_server.uri());
        let (memory, version) = store.load().await.expect("Should load from blob");

        assert_eq!(version.as_str(), "sha-big");
        assert_eq!(memory.get("German", "greet"), Some("Hallo"));
    }

    #[tokio::test]
    async fn test_load_unknown_encoding_is_decode_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "encoding": "utf-16",
                "content": "",
                "sha": "sha-1"
            })))
            .mount(&mock_server)
            .await;

        let store = create_store(&mock_server.uri());
        let err = store.load().await.expect_err("Should fail to decode");

        assert!(matches!(err, StoreError::DecodeError(_)));
    }

    // ==================== save Tests ====================

    #[tokio::test]
    async fn test_save_sends_sha_and_branch() {
        let mock_server = MockServer::start().await;
        let memory = hindi_memory();

        Mock::given(method("PUT"))
            .and(path(CONTENTS_PATH))
            .and(body_partial_json(serde_json::json!({
                "sha": "sha-1",
                "branch": "main",
                "content": memory.encode().expect("Should encode"),
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": {"sha": "sha-2"},
                "commit": {"sha": "commit-1"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = create_store(&mock_server.uri());
        store
            .save(&memory, Some(&VersionToken::new("sha-1")))
            .await
            .expect("Should save");
    }

    #[tokio::test]
    async fn test_save_without_version_creates_file() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "content": {"sha": "sha-new"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = create_store(&mock_server.uri());
        store
            .save(&hindi_memory(), None)
            .await
            .expect("Should create");

        let requests = mock_server
            .received_requests()
            .await
            .expect("Should record requests");
        let body: serde_json::Value =
            serde_json::from_slice(&requests[0].body).expect("Should be JSON");
        assert!(body.get("sha").is_none());
    }

    #[tokio::test]
    async fn test_save_stale_sha_is_conflict() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "message": "memory/translations.json does not match sha-old"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = create_store(&mock_server.uri());
        let memory = hindi_memory();
        let before = memory.clone();

        let err = store
            .save(&memory, Some(&VersionToken::new("sha-old")))
            .await
            .expect_err("Should conflict");

        assert_eq!(err, StoreError::Conflict);
        assert_eq!(memory, before);
    }

    #[tokio::test]
    async fn test_save_missing_sha_is_conflict() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "message": "Invalid request.\n\n\"sha\" wasn't supplied."
            })))
            .mount(&mock_server)
            .await;

        let store = create_store(&mock_server.uri());
        let err = store
            .save(&hindi_memory(), None)
            .await
            .expect_err("Should conflict");

        assert_eq!(err, StoreError::Conflict);
    }

    #[tokio::test]
    async fn test_save_server_error_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = create_store(&mock_server.uri())
            .with_read_retry(RetryConfig::new(3, Duration::from_millis(1)));
        let err = store
            .save(&hindi_memory(), Some(&VersionToken::new("sha-1")))
            .await
            .expect_err("Should fail");

        assert!(matches!(
            err,
            StoreError::TransportError {
                status: Some(500),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_save_validation_error_is_not_conflict() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "message": "Invalid request.\n\nNo commit found for the ref no-such-branch"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = create_store(&mock_server.uri());
        let err = store
            .save(&hindi_memory(), Some(&VersionToken::new("sha-1")))
            .await
            .expect_err("Should fail");

        assert!(matches!(
            err,
            StoreError::TransportError {
                status: Some(422),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_save_without_write_access_is_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(CONTENTS_PATH))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({"message": "Not Found"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = create_store(&mock_server.uri());
        let err = store
            .save(&hindi_memory(), Some(&VersionToken::new("sha-1")))
            .await
            .expect_err("Should fail");

        assert!(matches!(
            err,
            StoreError::TransportError {
                status: Some(404),
                ..
            }
        ));
    }

    // ==================== Misc Tests ====================

    #[test]
    fn test_contents_url_normalizes_slashes() {
        let store = create_store("https://api.github.example/");
        assert_eq!(
            store.contents_url(),
            "https://api.github.example/repos/acme/strings/contents/memory/translations.json"
        );
    }

    #[test]
    fn test_blob_url() {
        let store = create_store("https://api.github.example/");
        assert_eq!(
            store.blob_url("abc123"),
            "https://api.github.example/repos/acme/strings/git/blobs/abc123"
        );
    }

    #[test]
    fn test_describe() {
        let store = create_store("https://api.github.com");
        assert_eq!(
            store.describe(),
            "github:acme/strings/memory/translations.json@main"
        );
    }
}
