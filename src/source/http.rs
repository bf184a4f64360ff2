use super::models::{AudioChunk, Track, TrackMetaResponse};
use super::{ContentSource, TrackCatalog};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, RANGE};
use reqwest::StatusCode;
use url::Url;

/// Content API client. Audio is served as byte ranges of
/// `GET {base}/tracks/{id}/audio`; metadata as JSON from `GET {base}/tracks/{id}`.
pub struct HttpLibrary {
    http: reqwest::Client,
    base_url: String,
}

impl HttpLibrary {
    pub fn new(base_url: &str) -> AppResult<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid API base URL {:?}: {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "Unsupported API scheme: {}",
                parsed.scheme()
            )));
        }

        let http = reqwest::Client::builder()
            .user_agent("OrpheonPlayer/0.1.0")
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn track_url(&self, track_id: &str) -> String {
        format!("{}/tracks/{}", self.base_url, urlencoding::encode(track_id))
    }

    fn audio_url(&self, track_id: &str) -> String {
        format!("{}/audio", self.track_url(track_id))
    }
}

/// The server reads `end - start` bytes, so the range end is sent exclusive.
fn range_header(request: &AudioChunk) -> String {
    format!("bytes={}-{}", request.start, request.end)
}

#[async_trait]
impl ContentSource for HttpLibrary {
    async fn fetch_chunk(&self, request: &AudioChunk) -> AppResult<AudioChunk> {
        if !request.is_valid_range() {
            return Err(AppError::Source(format!(
                "Invalid chunk range: start={}, end={}",
                request.start, request.end
            )));
        }

        let url = self.audio_url(&request.track_id);
        let range = HeaderValue::from_str(&range_header(request))
            .map_err(|e| AppError::Source(e.to_string()))?;
        let response = self.http.get(&url).header(RANGE, range).send().await?;

        match response.status() {
            StatusCode::OK | StatusCode::PARTIAL_CONTENT => {
                let data = response.bytes().await?;
                Ok(AudioChunk::response(request, data.to_vec()))
            }
            StatusCode::RANGE_NOT_SATISFIABLE => Ok(AudioChunk::response(request, Vec::new())),
            StatusCode::NOT_FOUND => Err(AppError::NotFound(format!(
                "Audio for track {}",
                request.track_id
            ))),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AppError::Source(format!(
                    "HTTP {} for {}: {}",
                    status,
                    url,
                    body.chars().take(200).collect::<String>()
                )))
            }
        }
    }
}

#[async_trait]
impl TrackCatalog for HttpLibrary {
    async fn resolve_track(&self, track_id: &str) -> AppResult<Track> {
        let response = self
            .http
            .get(self.track_url(track_id))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let meta: TrackMetaResponse = response.json().await?;
                Ok(meta.into())
            }
            StatusCode::NOT_FOUND => Err(AppError::NotFound(format!("Track {}", track_id))),
            status => Err(AppError::Source(format!(
                "HTTP {} resolving track {}",
                status, track_id
            ))),
        }
    }
}
