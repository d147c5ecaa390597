//! Audio playback capability: `play_file(path, opts) / play_stream(stream, format, opts) / stop()`.

use super::provider::Provider;
use async_trait::async_trait;
use futures::Stream;
use std::path::Path;
use std::pin::Pin;

#[derive(Debug, Clone, Default)]
pub struct PlaybackOptions {
    pub volume: Option<f32>,
}

#[async_trait]
pub trait AudioPlayer: Provider {
    async fn play_file(&self, path: &Path, opts: &PlaybackOptions) -> crate::error::Result<()>;

    async fn play_stream(
        &self,
        stream: Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>,
        format: &str,
        opts: &PlaybackOptions,
    ) -> crate::error::Result<()>;

    async fn stop(&self) -> crate::error::Result<()>;
}
