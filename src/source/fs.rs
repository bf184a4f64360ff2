use super::models::{AudioChunk, Track};
use super::{ContentSource, TrackCatalog};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const AUDIO_EXTENSION: &str = "mp3";

/// Upper bound on the buffer reserved up front for a single chunk read.
const MAX_PREALLOC: u64 = 1024 * 1024;

/// Local media library. Each track is stored as `<root>/<track_id>.mp3`.
pub struct FileLibrary {
    root: PathBuf,
}

impl FileLibrary {
    pub fn new(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(AppError::Config(format!(
                "Media directory does not exist: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    fn track_path(&self, track_id: &str) -> AppResult<PathBuf> {
        if track_id.is_empty()
            || track_id.contains(['/', '\\'])
            || track_id == "."
            || track_id == ".."
        {
            return Err(AppError::Source(format!("Invalid track id: {:?}", track_id)));
        }
        Ok(self.root.join(format!("{}.{}", track_id, AUDIO_EXTENSION)))
    }

    /// Track ids of every audio file in the library, sorted.
    pub async fn list_tracks(&self) -> AppResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(AUDIO_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl ContentSource for FileLibrary {
    async fn fetch_chunk(&self, request: &AudioChunk) -> AppResult<AudioChunk> {
        if !request.is_valid_range() {
            return Err(AppError::Source(format!(
                "Invalid chunk range: start={}, end={}",
                request.start, request.end
            )));
        }

        let path = self.track_path(&request.track_id)?;
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!(
                    "Audio for track {}",
                    request.track_id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        file.seek(SeekFrom::Start(request.start)).await?;
        let mut data = Vec::with_capacity(request.len().min(MAX_PREALLOC) as usize);
        file.take(request.len()).read_to_end(&mut data).await?;

        Ok(AudioChunk::response(request, data))
    }
}

#[async_trait]
impl TrackCatalog for FileLibrary {
    async fn resolve_track(&self, track_id: &str) -> AppResult<Track> {
        let path = self.track_path(track_id)?;
        if !path.exists() {
            return Err(AppError::NotFound(format!("Track {}", track_id)));
        }
        let id = track_id.to_string();
        tokio::task::spawn_blocking(move || probe_track(&path, &id))
            .await
            .map_err(|e| AppError::Audio(format!("Probe task failed: {}", e)))?
    }
}

fn title_tag(revision: &MetadataRevision) -> Option<String> {
    revision
        .tags()
        .iter()
        .find(|tag| tag.std_key == Some(StandardTagKey::TrackTitle))
        .map(|tag| tag.value.to_string())
}

/// Reads the title and duration of an encoded file from its container headers.
fn probe_track(path: &Path, track_id: &str) -> AppResult<Track> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(AUDIO_EXTENSION);

    let mut probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AppError::Decode(format!("Failed to probe {}: {}", path.display(), e)))?;

    let title = probed
        .metadata
        .get()
        .as_ref()
        .and_then(|m| m.current())
        .and_then(title_tag)
        .or_else(|| probed.format.metadata().current().and_then(title_tag))
        .unwrap_or_else(|| track_id.to_string());

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AppError::Decode("No supported audio track found".into()))?;

    let params = &track.codec_params;
    let seconds = match (params.n_frames, params.time_base, params.sample_rate) {
        (Some(frames), Some(time_base), _) => time_base.calc_time(frames).seconds,
        (Some(frames), None, Some(rate)) if rate > 0 => frames / rate as u64,
        _ => {
            return Err(AppError::Decode(format!(
                "Unknown duration for {}",
                path.display()
            )))
        }
    };

    log::debug!("Probed track {}: {:?}, {}s", track_id, title, seconds);

    Ok(Track {
        id: track_id.to_string(),
        title,
        duration: seconds.min(u32::MAX as u64) as u32,
    })
}
