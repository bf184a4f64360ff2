pub mod audio;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod source;

pub use audio::output::{AudioBackend, CpalBackend, OutputHandle};
pub use audio::player::{PendingStart, PlaybackSnapshot, Player};
pub use config::PlayerConfig;
pub use error::{AppError, AppResult};
pub use events::{PlayerEvent, PlayerStatus};
pub use source::models::{AudioChunk, Track};
pub use source::{ContentSource, TrackCatalog};

/// Installs the `env_logger` backend. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("orpheon_player=info"),
    )
    .try_init();
}
