use crate::audio::stream_buffer::StreamReader;
use crate::error::{AppError, AppResult};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Pull decoder over a session's stream buffer. The stream is forward-only; seeking is done
/// by restarting the fetch at an estimated byte offset, so the reader resyncs on the next
/// frame header.
pub struct AudioDecoder {
    format_reader: Box<dyn symphonia::core::formats::FormatReader>,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
}

fn hint_extension(codec: &str) -> Option<&'static str> {
    match codec.to_lowercase().as_str() {
        "mp3" | "mpeg" | "audio/mpeg" => Some("mp3"),
        "flac" => Some("flac"),
        "aac" | "m4a" | "mp4a" => Some("m4a"),
        "ogg" | "vorbis" => Some("ogg"),
        "wav" => Some("wav"),
        _ => None,
    }
}

impl AudioDecoder {
    /// Probes the stream. Blocks until the reader has supplied enough bytes to identify
    /// the format, so it must not run on an async worker thread.
    pub fn new(source: StreamReader, codec_hint: Option<&str>) -> AppResult<Self> {
        let mss = MediaSourceStream::new(Box::new(ReadOnlySource::new(source)), Default::default());

        let mut hint = Hint::new();
        if let Some(codec) = codec_hint {
            match hint_extension(codec) {
                Some(ext) => {
                    hint.with_extension(ext);
                }
                None => log::warn!("Unknown codec hint: {}", codec),
            }
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AppError::Decode(format!("Failed to probe format: {}", e)))?;

        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AppError::Decode("No supported audio track found".into()))?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AppError::Decode(format!("Failed to create decoder: {}", e)))?;

        log::info!(
            "Decoder ready: sample_rate={}, channels={}",
            sample_rate,
            channels
        );

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Decode the next batch of interleaved samples. Returns `None` at end of stream.
    ///
    /// Samples keep the layout reported by [`AudioDecoder::sample_rate`] and
    /// [`AudioDecoder::channels`].
    pub fn decode_next(&mut self) -> AppResult<Option<Vec<f32>>> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(AppError::Decode(format!("Failed to read packet: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(symphonia::core::errors::Error::DecodeError(msg)) => {
                    log::warn!("Decode error (skipping): {}", msg);
                    continue;
                }
                Err(e) => return Err(AppError::Decode(format!("Failed to decode: {}", e))),
            };

            let spec = *decoded.spec();
            let num_frames = decoded.frames();

            let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            return Ok(Some(sample_buf.samples().to_vec()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::stream_buffer::StreamBuffer;
    use std::time::Duration;

    #[test]
    fn maps_codec_hints() {
        assert_eq!(hint_extension("MP3"), Some("mp3"));
        assert_eq!(hint_extension("audio/mpeg"), Some("mp3"));
        assert_eq!(hint_extension("flac"), Some("flac"));
        assert_eq!(hint_extension("opus-ish"), None);
    }

    #[test]
    fn rejects_non_audio_stream() {
        let (reader, writer) = StreamBuffer::new(Duration::from_millis(5));
        writer.write(&[0u8; 4096]);
        writer.close();

        assert!(matches!(
            AudioDecoder::new(reader, Some("mp3")),
            Err(AppError::Decode(_))
        ));
    }
}
