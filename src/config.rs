use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Bytes requested from the content source per fetch.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Number of chunks buffered before the decoder is started.
    #[serde(default = "default_initial_buffer_chunks")]
    pub initial_buffer_chunks: u64,
    /// Sample rate assumed when estimating a byte offset from a start second.
    #[serde(default = "default_estimate_sample_rate")]
    pub estimate_sample_rate: u64,
    /// Frame size assumed when estimating a byte offset from a start second.
    #[serde(default = "default_estimate_bytes_per_frame")]
    pub estimate_bytes_per_frame: u64,
    #[serde(default = "default_read_poll_interval_ms")]
    pub read_poll_interval_ms: u64,
    #[serde(default = "default_progress_tick_ms")]
    pub progress_tick_ms: u64,
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Start the next queued track when the current one finishes.
    #[serde(default)]
    pub auto_advance: bool,
    #[serde(default)]
    pub media_dir: Option<PathBuf>,
    #[serde(default)]
    pub api_base_url: Option<String>,
}

fn default_chunk_size() -> u64 {
    64 * 1024
}

fn default_initial_buffer_chunks() -> u64 {
    10
}

fn default_estimate_sample_rate() -> u64 {
    44100
}

fn default_estimate_bytes_per_frame() -> u64 {
    4
}

fn default_read_poll_interval_ms() -> u64 {
    10
}

fn default_progress_tick_ms() -> u64 {
    1000
}

fn default_volume() -> f32 {
    1.0
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            initial_buffer_chunks: default_initial_buffer_chunks(),
            estimate_sample_rate: default_estimate_sample_rate(),
            estimate_bytes_per_frame: default_estimate_bytes_per_frame(),
            read_poll_interval_ms: default_read_poll_interval_ms(),
            progress_tick_ms: default_progress_tick_ms(),
            volume: default_volume(),
            auto_advance: false,
            media_dir: None,
            api_base_url: None,
        }
    }
}

impl PlayerConfig {
    pub fn config_dir() -> AppResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::Config("Cannot find home directory".into()))?;
        Ok(home.join(".orpheon"))
    }

    pub fn config_path() -> AppResult<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config at `path` (or the default location), falling back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let loaded = match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        };
        loaded.unwrap_or_else(|e| {
            log::warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self) -> AppResult<()> {
        let dir = Self::config_dir()?;
        std::fs::create_dir_all(&dir)?;
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be positive".into()));
        }
        if self.progress_tick_ms == 0 || self.read_poll_interval_ms == 0 {
            return Err(AppError::Config("intervals must be positive".into()));
        }
        Ok(())
    }

    /// Bytes that must be fetched before the decoder is started.
    pub fn initial_buffer_bytes(&self) -> u64 {
        self.chunk_size * self.initial_buffer_chunks
    }

    /// Estimated byte offset of `second` into an encoded stream. This deliberately ignores
    /// container metadata, so seeking lands near, not exactly on, the requested time.
    pub fn estimate_byte_offset(&self, second: u32) -> u64 {
        second as u64 * self.estimate_sample_rate * self.estimate_bytes_per_frame
    }

    pub fn read_poll_interval(&self) -> Duration {
        Duration::from_millis(self.read_poll_interval_ms)
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_streaming_constants() {
        let config = PlayerConfig::default();
        assert_eq!(config.chunk_size, 65536);
        assert_eq!(config.initial_buffer_bytes(), 655360);
        assert_eq!(config.progress_tick(), Duration::from_secs(1));
        assert!(!config.auto_advance);
    }

    #[test]
    fn byte_offset_uses_fixed_frame_estimate() {
        let config = PlayerConfig::default();
        assert_eq!(config.estimate_byte_offset(0), 0);
        assert_eq!(config.estimate_byte_offset(50), 50 * 44100 * 4);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: PlayerConfig = serde_json::from_str(r#"{"chunk_size": 1024}"#).unwrap();
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.initial_buffer_chunks, 10);
        assert_eq!(config.volume, 1.0);
        assert!(config.media_dir.is_none());
    }

    #[test]
    fn save_and_load_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = PlayerConfig {
            auto_advance: true,
            media_dir: Some(PathBuf::from("/srv/music")),
            ..PlayerConfig::default()
        };
        config.save_to(&path).unwrap();

        let loaded = PlayerConfig::load_from(&path).unwrap();
        assert!(loaded.auto_advance);
        assert_eq!(loaded.media_dir, Some(PathBuf::from("/srv/music")));
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let config = PlayerConfig {
            chunk_size: 0,
            ..PlayerConfig::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn load_or_default_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlayerConfig::load_or_default(Some(&dir.path().join("absent.json")));
        assert_eq!(config.chunk_size, 65536);
    }
}
