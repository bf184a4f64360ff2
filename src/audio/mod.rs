pub mod decoder;
pub mod fetcher;
pub mod output;
pub mod player;
pub mod progress;
pub mod queue;
pub mod stream_buffer;
