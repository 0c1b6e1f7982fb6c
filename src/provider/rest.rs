use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Response, Url};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tracing::{debug, info};

use super::{MediaInfo, MediaPlatformProvider, MediaSource, Quality};
use crate::config::RestPlatformConfig;
use crate::error::{PublishError, Result};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

#[derive(Debug, Deserialize)]
struct RemoteFile {
    quality: String,
    link: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// Media platform reached over a JSON REST API
pub struct RestProvider {
    client: Client,
    config: RestPlatformConfig,
    endpoint: String,
}

impl RestProvider {
    pub fn new(config: Option<RestPlatformConfig>) -> Result<Self> {
        let config = config.ok_or_else(|| {
            PublishError::Config("No configuration for the REST media platform".to_string())
        })?;
        Url::parse(&config.endpoint).map_err(|e| {
            PublishError::Config(format!("Invalid REST platform endpoint '{}': {}", config.endpoint, e))
        })?;
        if config.token.trim().is_empty() {
            return Err(PublishError::Config("REST platform token must not be empty".to_string()));
        }

        let client = Client::builder()
            .user_agent("mediapub/0.1.0")
            .timeout(Duration::from_secs(3600))
            .build()
            .map_err(PublishError::Http)?;
        let endpoint = config.endpoint.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    fn media_url(&self, media_id: &str) -> String {
        format!("{}/media/{}", self.endpoint, media_id)
    }

    async fn check_status(response: Response, action: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        Err(PublishError::Platform(format!(
            "{} failed with status {}: {}",
            action, status, error_text
        )))
    }
}

#[async_trait]
impl MediaPlatformProvider for RestProvider {
    async fn upload(&self, media_file_path: &Path) -> Result<String> {
        let file_name = media_file_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let file = File::open(media_file_path)
            .await
            .map_err(|e| PublishError::io(media_file_path, e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| PublishError::io(media_file_path, e))?
            .len();
        let url = format!("{}/media", self.endpoint);

        // Body is streamed from disk, never buffered whole
        info!("Uploading {} ({} bytes) to {}", media_file_path.display(), size, url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.token)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, size)
            .header("X-Filename", file_name)
            .body(Body::from(file))
            .send()
            .await?;
        let response = Self::check_status(response, "Upload").await?;
        let uploaded: UploadResponse = response.json().await?;

        Ok(uploaded.id)
    }

    async fn remove(&self, media_ids: &[String]) -> Result<()> {
        for media_id in media_ids {
            debug!("Removing remote media {}", media_id);
            let response = self
                .client
                .delete(self.media_url(media_id))
                .bearer_auth(&self.config.token)
                .send()
                .await?;
            Self::check_status(response, "Removal").await?;
        }
        Ok(())
    }

    async fn configure(&self, media_id: &str) -> Result<()> {
        let Some(settings) = &self.config.settings else {
            return Ok(());
        };

        debug!("Configuring remote media {}", media_id);
        let response = self
            .client
            .patch(self.media_url(media_id))
            .bearer_auth(&self.config.token)
            .json(settings)
            .send()
            .await?;
        Self::check_status(response, "Configuration").await?;
        Ok(())
    }

    async fn get_media_info(&self, media_id: &str, expected_quality: Quality) -> Result<MediaInfo> {
        let response = self
            .client
            .get(self.media_url(media_id))
            .bearer_auth(&self.config.token)
            .send()
            .await?;
        let response = Self::check_status(response, "Media lookup").await?;
        let media: MediaResponse = response.json().await?;

        let sources = media
            .files
            .into_iter()
            .filter_map(|file| {
                Quality::from_label(&file.quality).map(|quality| MediaSource {
                    quality,
                    link: file.link,
                    width: file.width,
                    height: file.height,
                })
            })
            .collect();

        Ok(MediaInfo::from_sources(sources, expected_quality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_bytes, body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str, settings: Option<serde_json::Value>) -> RestPlatformConfig {
        RestPlatformConfig {
            endpoint: endpoint.to_string(),
            token: "secret".to_string(),
            settings: settings.and_then(|value| value.as_object().cloned()),
        }
    }

    #[test]
    fn test_construction_validates_configuration() {
        assert!(matches!(RestProvider::new(None), Err(PublishError::Config(_))));
        assert!(matches!(
            RestProvider::new(Some(config("not a url", None))),
            Err(PublishError::Config(_))
        ));
        let mut no_token = config("https://media.example.com", None);
        no_token.token = " ".to_string();
        assert!(matches!(RestProvider::new(Some(no_token)), Err(PublishError::Config(_))));
    }

    #[tokio::test]
    async fn test_upload_returns_platform_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/media"))
            .and(header("authorization", "Bearer secret"))
            .and(header("x-filename", "video.mp4"))
            .and(header("content-length", "6"))
            .and(body_bytes(b"frames".to_vec()))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "remote-7" })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("video.mp4");
        std::fs::write(&media, b"frames").unwrap();

        let provider = RestProvider::new(Some(config(&server.uri(), None))).unwrap();
        assert_eq!(provider.upload(&media).await.unwrap(), "remote-7");
    }

    #[tokio::test]
    async fn test_upload_failure_is_platform_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/media"))
            .respond_with(ResponseTemplate::new(500).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("video.mp4");
        std::fs::write(&media, b"frames").unwrap();

        let provider = RestProvider::new(Some(config(&server.uri(), None))).unwrap();
        let err = provider.upload(&media).await.unwrap_err();
        assert!(matches!(err, PublishError::Platform(message) if message.contains("quota exceeded")));
    }

    #[tokio::test]
    async fn test_upload_of_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = RestProvider::new(Some(config("https://media.example.com", None))).unwrap();
        let err = provider.upload(&dir.path().join("gone.mp4")).await.unwrap_err();
        assert!(matches!(err, PublishError::Io { .. }));
    }

    #[tokio::test]
    async fn test_configure_sends_settings() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/media/remote-7"))
            .and(body_json(json!({ "privacy": "unlisted" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let provider =
            RestProvider::new(Some(config(&server.uri(), Some(json!({ "privacy": "unlisted" }))))).unwrap();
        provider.configure("remote-7").await.unwrap();
    }

    #[tokio::test]
    async fn test_configure_without_settings_is_noop() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let provider = RestProvider::new(Some(config(&server.uri(), None))).unwrap();
        provider.configure("remote-7").await.unwrap();
    }

    #[tokio::test]
    async fn test_media_info_maps_qualities() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/remote-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [
                    { "quality": "sd", "link": "https://cdn.example.com/sd.mp4", "width": 640, "height": 360 },
                    { "quality": "mobile", "link": "https://cdn.example.com/m.mp4" },
                    { "quality": "source", "link": "https://cdn.example.com/raw.mov" }
                ]
            })))
            .mount(&server)
            .await;

        let provider = RestProvider::new(Some(config(&server.uri(), None))).unwrap();
        let info = provider.get_media_info("remote-7", Quality::Hd).await.unwrap();

        assert_eq!(info.sources.len(), 2);
        assert_eq!(info.qualities, vec![Quality::Mobile, Quality::Sd]);
        assert!(!info.available);
        assert_eq!(info.sources[0].width, Some(640));
    }

    #[tokio::test]
    async fn test_remove_deletes_each_media() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        let provider = RestProvider::new(Some(config(&server.uri(), None))).unwrap();
        provider
            .remove(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
    }
}
